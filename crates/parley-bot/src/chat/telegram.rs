use std::sync::Arc;

use crate::chat::{ChatFuture, Mode};
use crate::telegram::{ApiClient, InlineKeyboardButton, InlineKeyboardMarkup};

/// `Telegram`-backed outbound surface bound to a single chat.
///
/// HTML sends and edits fall back to plain text when the Bot API rejects
/// the markup.
pub struct Chat {
    api: Arc<ApiClient>,
    chat_id: i64,
}

impl Chat {
    #[must_use]
    pub fn new(api: Arc<ApiClient>, chat_id: i64) -> Self {
        Self { api, chat_id }
    }

    const fn parse_mode(mode: Mode) -> Option<&'static str> {
        match mode {
            Mode::Plain => None,
            Mode::Html => Some("HTML"),
        }
    }
}

impl crate::chat::Chat for Chat {
    fn typing(&self) -> ChatFuture<'_, ()> {
        Box::pin(async move { self.api.send_chat_action(self.chat_id, "typing").await })
    }

    fn send<'a>(&'a self, text: &'a str, mode: Mode) -> ChatFuture<'a, i64> {
        Box::pin(async move {
            let first = self
                .api
                .send_message(self.chat_id, text, Self::parse_mode(mode), None)
                .await;
            let sent = match first {
                Ok(sent) => sent,
                Err(e) if mode == Mode::Html => {
                    tracing::warn!("Telegram sendMessage HTML error, retrying plain: {e}");
                    self.api.send_message(self.chat_id, text, None, None).await?
                }
                Err(e) => return Err(e),
            };
            Ok(sent.message_id)
        })
    }

    fn edit<'a>(&'a self, message_id: i64, text: &'a str, mode: Mode) -> ChatFuture<'a, ()> {
        Box::pin(async move {
            let first = self
                .api
                .edit_message_text(self.chat_id, message_id, text, Self::parse_mode(mode))
                .await;
            match first {
                Ok(()) => Ok(()),
                Err(e) if mode == Mode::Html => {
                    tracing::warn!("Telegram editMessageText HTML error, retrying plain: {e}");
                    self.api
                        .edit_message_text(self.chat_id, message_id, text, None)
                        .await
                }
                Err(e) => Err(e),
            }
        })
    }

    fn delete(&self, message_id: i64) -> ChatFuture<'_, ()> {
        Box::pin(async move { self.api.delete_message(self.chat_id, message_id).await })
    }

    fn send_keyboard<'a>(
        &'a self,
        text: &'a str,
        buttons: &'a [(String, String)],
    ) -> ChatFuture<'a, i64> {
        Box::pin(async move {
            let markup = InlineKeyboardMarkup {
                inline_keyboard: buttons
                    .iter()
                    .map(|(label, token)| {
                        vec![InlineKeyboardButton {
                            text: label.clone(),
                            callback_data: token.clone(),
                        }]
                    })
                    .collect(),
            };
            let sent = self
                .api
                .send_message(self.chat_id, text, None, Some(&markup))
                .await?;
            Ok(sent.message_id)
        })
    }
}
