pub mod markup;

use std::time::Duration;

use isahc::config::Configurable;
use isahc::AsyncReadResponseExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `Telegram` Bot API limits messages to 4096 characters.
const MAX_MESSAGE_LEN: usize = 4096;

/// Long-poll timeout sent to `Telegram` (seconds, server-side).
pub const POLL_TIMEOUT: u64 = 30;

/// HTTP request timeout for `getUpdates` (must exceed [`POLL_TIMEOUT`]).
const HTTP_TIMEOUT: Duration = Duration::from_secs(45);

/// Backoff duration after a `getUpdates` error.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Telegram Bot API wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Deserialize)]
pub struct TgMessage {
    #[allow(dead_code)]
    pub message_id: i64,
    pub chat: TgChat,
    pub text: Option<String>,
    pub from: Option<TgUser>,
}

#[derive(Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Deserialize)]
pub struct TgUser {
    pub id: i64,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<TgMessage>,
    pub data: Option<String>,
}

#[derive(Deserialize)]
pub struct BotUser {
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Serialize)]
struct GetUpdatesBody {
    offset: i64,
    timeout: u64,
    allowed_updates: Vec<String>,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageBody<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteMessageBody {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct SendChatActionBody<'a> {
    chat_id: i64,
    action: &'a str,
}

#[derive(Serialize)]
struct AnswerCallbackBody<'a> {
    callback_query_id: &'a str,
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

pub struct ApiClient {
    http: isahc::HttpClient,
    base_url: String,
}

impl ApiClient {
    pub fn new(bot_token: &str) -> Self {
        Self {
            http: isahc::HttpClient::new().expect("create HTTP client"),
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }

    /// Invoke a Bot API method, unwrapping the `ok`/`result` envelope.
    async fn invoke<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, String> {
        let url = format!("{}/{method}", self.base_url);
        let json = serde_json::to_vec(body).map_err(|e| e.to_string())?;

        let mut builder = isahc::Request::post(&url).header("Content-Type", "application/json");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let request = builder
            .body(json)
            .map_err(|e: isahc::http::Error| e.to_string())?;

        let mut response = self
            .http
            .send_async(request)
            .await
            .map_err(|e| e.to_string())?;
        let text = response.text().await.map_err(|e| e.to_string())?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| e.to_string())?;

        if parsed.ok {
            parsed.result.ok_or_else(|| "no result".into())
        } else {
            Err(parsed.description.unwrap_or_else(|| "unknown error".into()))
        }
    }

    pub async fn get_me(&self) -> Result<BotUser, String> {
        self.invoke("getMe", &serde_json::json!({}), None).await
    }

    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, String> {
        let body = GetUpdatesBody {
            offset,
            timeout,
            allowed_updates: vec!["message".into(), "callback_query".into()],
        };
        self.invoke("getUpdates", &body, Some(HTTP_TIMEOUT)).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, String> {
        let truncated = truncate(text);
        let body = SendMessageBody {
            chat_id,
            text: &truncated,
            parse_mode,
            reply_markup,
        };
        self.invoke("sendMessage", &body, None).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), String> {
        let truncated = truncate(text);
        let body = EditMessageBody {
            chat_id,
            message_id,
            text: &truncated,
            parse_mode,
        };
        // editMessageText returns either the edited message or `true`.
        self.invoke::<serde_json::Value, _>("editMessageText", &body, None)
            .await
            .map(|_| ())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String> {
        let body = DeleteMessageBody {
            chat_id,
            message_id,
        };
        self.invoke::<bool, _>("deleteMessage", &body, None)
            .await
            .map(|_| ())
    }

    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), String> {
        let body = SendChatActionBody { chat_id, action };
        self.invoke::<bool, _>("sendChatAction", &body, None)
            .await
            .map(|_| ())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), String> {
        let body = AnswerCallbackBody { callback_query_id };
        self.invoke::<bool, _>("answerCallbackQuery", &body, None)
            .await
            .map(|_| ())
    }
}

/// Clip outbound text to the Bot API message limit, char-boundary safe.
#[must_use]
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LEN {
        text.to_owned()
    } else {
        let mut s: String = text.chars().take(MAX_MESSAGE_LEN - 3).collect();
        s.push_str("...");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate("hello"), "hello");
    }

    #[test]
    fn truncate_clips_with_ellipsis() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 10);
        let clipped = truncate(&long);
        assert_eq!(clipped.chars().count(), MAX_MESSAGE_LEN);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "▰".repeat(MAX_MESSAGE_LEN + 10);
        let clipped = truncate(&long);
        assert_eq!(clipped.chars().count(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn keyboard_serializes_to_bot_api_shape() {
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "What is X?".into(),
                callback_data: "ab12cd34".into(),
            }]],
        };
        let json = serde_json::to_value(&markup).unwrap();
        assert_eq!(json["inline_keyboard"][0][0]["text"], "What is X?");
        assert_eq!(json["inline_keyboard"][0][0]["callback_data"], "ab12cd34");
    }

    #[test]
    fn send_body_omits_empty_options() {
        let body = SendMessageBody {
            chat_id: 7,
            text: "hi",
            parse_mode: None,
            reply_markup: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("parse_mode").is_none());
        assert!(json.get("reply_markup").is_none());
    }
}
