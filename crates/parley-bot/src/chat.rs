pub mod telegram;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::telegram::ApiClient;

/// How outbound text should be interpreted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Plain,
    Html,
}

/// A pending outbound operation.
pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Outbound surface of one conversation.
///
/// The orchestrator drives a turn entirely through this trait, so the relay
/// logic stays independent of the transport and testable with a recorder.
pub trait Chat: Send + Sync {
    /// Show a "typing" indicator. Best effort.
    fn typing(&self) -> ChatFuture<'_, ()>;

    /// Send a message, returning its id for later edits.
    fn send<'a>(&'a self, text: &'a str, mode: Mode) -> ChatFuture<'a, i64>;

    /// Replace the text of a previously sent message.
    fn edit<'a>(&'a self, message_id: i64, text: &'a str, mode: Mode) -> ChatFuture<'a, ()>;

    /// Delete a previously sent message.
    fn delete(&self, message_id: i64) -> ChatFuture<'_, ()>;

    /// Send a message with one interactive button per `(label, token)` pair.
    fn send_keyboard<'a>(
        &'a self,
        text: &'a str,
        buttons: &'a [(String, String)],
    ) -> ChatFuture<'a, i64>;
}

#[must_use]
pub fn telegram(api: Arc<ApiClient>, chat_id: i64) -> telegram::Chat {
    telegram::Chat::new(api, chat_id)
}
