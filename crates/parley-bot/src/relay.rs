//! Drives one conversation turn: memory, progress animation, completion,
//! progressive reveal, follow-up suggestions.

use std::sync::Arc;
use std::time::Duration;

use parley_llm::{GenOptions, LlmError, Message, Provider};

use crate::chat::{Chat, Mode};
use crate::memory::{Memory, Tokens};
use crate::progress;
use crate::suggest;
use crate::telegram::markup;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed assistant persona supplied as the system message of every request.
const SYSTEM_PROMPT: &str =
    "You are a helpful and intelligent English assistant. Always reply in English.";

/// Instruction for the follow-up suggestion completion.
const SUGGESTION_PROMPT: &str = "Based on the previous answer, create 2 follow-up questions \
    the user might ask next. Format each suggestion starting with ➥, put the question in \
    monospace using backticks like `example?` and include a website link or source for \
    learning more.";

/// Greeting sent by the start command.
const GREETING: &str = "👋 Welcome! I'm your English AI assistant.\n\n\
    🌐 Commands:\n/reset → Reset chat\n/status → Show memory info";

/// Sentinel emitted to mark turn completion.
const TURN_SENTINEL: &str = "◌";

/// Placeholder text of a fresh reveal message before its first edit.
const REVEAL_PLACEHOLDER: &str = "100%";

/// Timeout for the primary completion.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for the suggestion completion.
const SUGGESTION_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

/// Delays driving the cosmetic animation. Purely presentational; zeroed in
/// tests so turns run instantly.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Jitter range between progress animation frames.
    pub frame_min: Duration,
    pub frame_max: Duration,
    /// Delay after revealing a sentence.
    pub sentence: Duration,
    /// Delay after revealing a sentence that ends in pausing punctuation.
    pub sentence_pause: Duration,
}

impl Pacing {
    #[must_use]
    pub const fn live() -> Self {
        Self {
            frame_min: Duration::from_millis(300),
            frame_max: Duration::from_millis(600),
            sentence: Duration::from_millis(500),
            sentence_pause: Duration::from_millis(800),
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self {
            frame_min: Duration::ZERO,
            frame_max: Duration::ZERO,
            sentence: Duration::ZERO,
            sentence_pause: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// The turn orchestrator: one instance serves all conversations.
pub struct Relay<P> {
    llm: P,
    memory: Arc<Memory>,
    tokens: Arc<Tokens>,
    pacing: Pacing,
}

impl<P: Provider> Relay<P> {
    pub fn new(llm: P, memory: Arc<Memory>, tokens: Arc<Tokens>, pacing: Pacing) -> Self {
        Self {
            llm,
            memory,
            tokens,
            pacing,
        }
    }

    /// Run one full turn for an inbound message. Both the text handler and
    /// the button handler enter here.
    pub async fn run_turn<C: Chat + ?Sized>(&self, chat: &C, user_id: i64, text: &str) {
        tracing::info!(user_id, "turn started");
        self.memory.append(user_id, Message::user(text));
        let _ = chat.typing().await;

        self.animate(chat).await;

        let reply = match self.complete_primary(user_id).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(user_id, "primary completion failed: {e:?}");
                let _ = chat.send(&format!("⚠️ Error: {e:?}"), Mode::Plain).await;
                return;
            }
        };

        self.memory.append(user_id, Message::assistant(&reply));

        if let Err(e) = self.reveal(chat, &reply).await {
            tracing::warn!(user_id, "reveal failed: {e}");
            let _ = chat.send(&format!("⚠️ Error: {e}"), Mode::Plain).await;
            return;
        }

        self.suggestions(chat, &reply).await;

        let _ = chat.send(TURN_SENTINEL, Mode::Plain).await;
        tracing::info!(user_id, "turn done");
    }

    /// Resolve a suggestion token and replay its question as a new turn.
    pub async fn on_callback<C: Chat + ?Sized>(&self, chat: &C, user_id: i64, token: &str) {
        let Some(question) = self.tokens.resolve(token) else {
            tracing::debug!(token, "unknown suggestion token");
            return;
        };
        self.run_turn(chat, user_id, &question).await;
    }

    /// Handle a bot command (name without the leading slash).
    pub async fn on_command<C: Chat + ?Sized>(&self, chat: &C, user_id: i64, command: &str) {
        match command {
            "start" => {
                self.memory.reset(user_id);
                let _ = chat.send(GREETING, Mode::Plain).await;
            }
            "reset" => {
                self.memory.reset(user_id);
                let _ = chat.send("✅ Chat history cleared!", Mode::Plain).await;
            }
            "status" => {
                let count = self.memory.len(user_id);
                let _ = chat
                    .send(&format!("📊 Messages remembered: {count}"), Mode::Plain)
                    .await;
            }
            other => {
                tracing::debug!(command = other, "ignoring unknown command");
            }
        }
    }

    /// Play the fixed "thinking" animation, then remove it.
    async fn animate<C: Chat + ?Sized>(&self, chat: &C) {
        let Ok(message_id) = chat.send(progress::OPENING, Mode::Plain).await else {
            return;
        };
        for (phrase, percent) in progress::steps() {
            self.frame_delay().await;
            let _ = chat
                .edit(message_id, &progress::render(phrase, percent), Mode::Plain)
                .await;
        }
        let _ = chat.delete(message_id).await;
    }

    async fn complete_primary(&self, user_id: i64) -> exn::Result<String, LlmError> {
        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        messages.extend(self.memory.get(user_id));
        let options = GenOptions {
            temperature: Some(0.7),
            max_tokens: Some(1000),
            timeout: Some(COMPLETION_TIMEOUT),
        };
        tracing::debug!(messages = messages.len(), "requesting completion");
        self.llm.complete(&messages, &options).await
    }

    /// Reveal the reply sentence by sentence, rolling over to fresh messages
    /// at the chunk limit.
    async fn reveal<C: Chat + ?Sized>(&self, chat: &C, reply: &str) -> Result<(), String> {
        let mut message_id = chat.send(REVEAL_PLACEHOLDER, Mode::Plain).await?;
        let mut acc = markup::Accumulator::new(markup::CHUNK_LIMIT);
        for sentence in markup::sentences(reply) {
            let decorated = markup::decorate(&sentence);
            for piece in markup::clamp(&decorated, markup::CHUNK_LIMIT) {
                match acc.push(&piece) {
                    markup::Emit::Update(text) => {
                        let _ = chat.edit(message_id, &text, Mode::Html).await;
                    }
                    markup::Emit::Rollover(text) => {
                        message_id = chat.send(REVEAL_PLACEHOLDER, Mode::Plain).await?;
                        let _ = chat.edit(message_id, &text, Mode::Html).await;
                    }
                    markup::Emit::Skip => {}
                }
            }
            self.sentence_delay(&sentence).await;
        }
        Ok(())
    }

    /// Ask for follow-up questions and render them as buttons and links.
    /// Any failure downgrades to "no suggestions".
    async fn suggestions<C: Chat + ?Sized>(&self, chat: &C, reply: &str) {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::assistant(reply),
            Message::user(SUGGESTION_PROMPT),
        ];
        let options = GenOptions {
            temperature: Some(0.7),
            max_tokens: Some(1000),
            timeout: Some(SUGGESTION_TIMEOUT),
        };
        let raw = match self.llm.complete(&messages, &options).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("suggestion completion failed, skipping: {e:?}");
                return;
            }
        };

        let extracted = suggest::extract(&raw);
        if !extracted.questions.is_empty() {
            let buttons: Vec<(String, String)> = extracted
                .questions
                .into_iter()
                .map(|question| (question, suggest::mint_token()))
                .collect();
            for (question, token) in &buttons {
                self.tokens.insert(token, question);
            }
            if let Err(e) = chat
                .send_keyboard("Here are more questions you could ask:", &buttons)
                .await
            {
                tracing::warn!("failed to send suggestions: {e}");
            }
        }
        if !extracted.links.is_empty() {
            let links_html = extracted
                .links
                .iter()
                .map(|link| format!("<a href=\"{link}\">source</a>"))
                .collect::<Vec<_>>()
                .join("\n");
            let _ = chat.send(&links_html, Mode::Html).await;
        }
    }

    async fn frame_delay(&self) {
        let max = self.pacing.frame_max;
        if max.is_zero() {
            return;
        }
        let min = self.pacing.frame_min.min(max);
        let span = u64::try_from((max - min).as_millis()).unwrap_or(u64::MAX);
        let jitter = if span == 0 { 0 } else { fastrand::u64(0..=span) };
        async_io::Timer::after(min + Duration::from_millis(jitter)).await;
    }

    async fn sentence_delay(&self, sentence: &str) {
        // A sentence with no characters at all falls back to the short delay.
        let pause = sentence
            .trim_end()
            .chars()
            .last()
            .is_some_and(|c| matches!(c, '.' | '!' | '?' | ','));
        let delay = if pause {
            self.pacing.sentence_pause
        } else {
            self.pacing.sentence
        };
        if !delay.is_zero() {
            async_io::Timer::after(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::chat::ChatFuture;

    /// Provider replaying a fixed script of completion results.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl Provider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model_id(&self) -> &str {
            "scripted"
        }

        fn complete<'a>(
            &'a self,
            _messages: &'a [Message],
            _options: &'a GenOptions,
        ) -> parley_llm::CompletionFuture<'a> {
            Box::pin(async move {
                match self.replies.lock().unwrap().pop_front() {
                    Some(Ok(text)) => Ok(text),
                    Some(Err(e)) => Err(e.into()),
                    None => Err(LlmError::Network("script exhausted".into()).into()),
                }
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Typing,
        Sent { id: i64, text: String },
        Edited { id: i64, text: String },
        Deleted { id: i64 },
        Keyboard { text: String, buttons: Vec<(String, String)> },
    }

    /// Chat double recording every outbound operation.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
        next_id: Mutex<i64>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn sent_texts(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Sent { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    impl Chat for Recorder {
        fn typing(&self) -> ChatFuture<'_, ()> {
            Box::pin(async move {
                self.events.lock().unwrap().push(Event::Typing);
                Ok(())
            })
        }

        fn send<'a>(&'a self, text: &'a str, _mode: Mode) -> ChatFuture<'a, i64> {
            Box::pin(async move {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                let id = *next;
                drop(next);
                self.events.lock().unwrap().push(Event::Sent {
                    id,
                    text: text.to_owned(),
                });
                Ok(id)
            })
        }

        fn edit<'a>(&'a self, message_id: i64, text: &'a str, _mode: Mode) -> ChatFuture<'a, ()> {
            Box::pin(async move {
                self.events.lock().unwrap().push(Event::Edited {
                    id: message_id,
                    text: text.to_owned(),
                });
                Ok(())
            })
        }

        fn delete(&self, message_id: i64) -> ChatFuture<'_, ()> {
            Box::pin(async move {
                self.events
                    .lock()
                    .unwrap()
                    .push(Event::Deleted { id: message_id });
                Ok(())
            })
        }

        fn send_keyboard<'a>(
            &'a self,
            text: &'a str,
            buttons: &'a [(String, String)],
        ) -> ChatFuture<'a, i64> {
            Box::pin(async move {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                let id = *next;
                drop(next);
                self.events.lock().unwrap().push(Event::Keyboard {
                    text: text.to_owned(),
                    buttons: buttons.to_vec(),
                });
                Ok(id)
            })
        }
    }

    fn relay_with(replies: Vec<Result<String, LlmError>>) -> Relay<Scripted> {
        Relay::new(
            Scripted::new(replies),
            Arc::new(Memory::new()),
            Arc::new(Tokens::new()),
            Pacing::none(),
        )
    }

    #[test]
    fn successful_turn_reveals_reply_and_sentinel() {
        let relay = relay_with(vec![
            Ok("Hello there! All good.".into()),
            Ok("➥ `More?` [source: https://a.example.com]".into()),
        ]);
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.run_turn(&chat, 7, "hi"));

        let history = relay.memory.get(7);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hello there! All good.");

        let events = chat.events();
        assert_eq!(events[0], Event::Typing);
        // Progress message is animated then deleted.
        assert!(matches!(events[1], Event::Sent { ref text, .. } if text == progress::OPENING));
        assert!(events.contains(&Event::Deleted { id: 1 }));
        // The reveal edits carry the decorated sentences.
        let last_edit = events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::Edited { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_edit, "<b>Hello</b> there! <b>All</b> good.");
        // Keyboard, link message, and sentinel close the turn.
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Keyboard { text, buttons }
                if text == "Here are more questions you could ask:"
                    && buttons.len() == 1
                    && buttons[0].0 == "`More?`"
        )));
        let sent = chat.sent_texts();
        assert!(sent.iter().any(|t| t.contains("https://a.example.com")));
        assert_eq!(sent.last().unwrap(), "◌");
    }

    #[test]
    fn primary_failure_reports_once_and_keeps_history_clean() {
        let relay = relay_with(vec![Err(LlmError::Network("timed out".into()))]);
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.run_turn(&chat, 7, "hi"));

        let errors: Vec<_> = chat
            .sent_texts()
            .into_iter()
            .filter(|t| t.starts_with("⚠️ Error:"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("timed out"));
        // No sentinel, and no assistant message was appended.
        assert!(!chat.sent_texts().iter().any(|t| t == "◌"));
        let history = relay.memory.get(7);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], Message::user("hi"));
    }

    #[test]
    fn suggestion_failure_still_completes_turn() {
        let relay = relay_with(vec![
            Ok("Fine.".into()),
            Err(LlmError::Api {
                status: 500,
                body: "oops".into(),
            }),
        ]);
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.run_turn(&chat, 7, "hi"));

        assert!(!chat
            .events()
            .iter()
            .any(|e| matches!(e, Event::Keyboard { .. })));
        assert_eq!(chat.sent_texts().last().unwrap(), "◌");
        assert_eq!(relay.memory.len(7), 2);
    }

    #[test]
    fn suggestions_register_resolvable_tokens() {
        let relay = relay_with(vec![
            Ok("Fine.".into()),
            Ok("➥ `First?`\n➥ `Second?`".into()),
        ]);
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.run_turn(&chat, 7, "hi"));

        let buttons = chat
            .events()
            .into_iter()
            .find_map(|e| match e {
                Event::Keyboard { buttons, .. } => Some(buttons),
                _ => None,
            })
            .unwrap();
        assert_eq!(buttons.len(), 2);
        for (question, token) in &buttons {
            assert_eq!(relay.tokens.resolve(token).as_deref(), Some(question.as_str()));
        }
    }

    #[test]
    fn callback_replays_question_as_new_turn() {
        let relay = relay_with(vec![Ok("Replayed.".into()), Ok(String::new())]);
        relay.tokens.insert("tok12345", "What next?");
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.on_callback(&chat, 7, "tok12345"));

        let history = relay.memory.get(7);
        assert_eq!(history[0], Message::user("What next?"));
        assert_eq!(history[1], Message::assistant("Replayed."));
    }

    #[test]
    fn unknown_callback_token_is_ignored() {
        let relay = relay_with(vec![]);
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.on_callback(&chat, 7, "missing1"));

        assert!(chat.events().is_empty());
        assert_eq!(relay.memory.len(7), 0);
    }

    #[test]
    fn commands_manage_memory() {
        let relay = relay_with(vec![]);
        let chat = Recorder::default();

        relay.memory.append(7, Message::user("hi"));
        futures_lite::future::block_on(relay.on_command(&chat, 7, "status"));
        assert_eq!(chat.sent_texts().last().unwrap(), "📊 Messages remembered: 1");

        futures_lite::future::block_on(relay.on_command(&chat, 7, "reset"));
        assert_eq!(relay.memory.len(7), 0);
        assert_eq!(chat.sent_texts().last().unwrap(), "✅ Chat history cleared!");

        futures_lite::future::block_on(relay.on_command(&chat, 7, "start"));
        assert!(chat.sent_texts().last().unwrap().starts_with("👋 Welcome!"));
    }

    #[test]
    fn long_replies_roll_over_to_fresh_messages() {
        let first = format!("{}.", "a".repeat(2500));
        let second = format!("{}.", "b".repeat(2500));
        let relay = relay_with(vec![
            Ok(format!("{first} {second}")),
            Ok(String::new()),
        ]);
        let chat = Recorder::default();

        futures_lite::future::block_on(relay.run_turn(&chat, 7, "hi"));

        // Two separate reveal messages: ids differ between the edits.
        let edited_ids: Vec<i64> = chat
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Edited { id, text } if !text.contains('▰') && !text.contains('▱') => {
                    Some(id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(edited_ids.len(), 2);
        assert_ne!(edited_ids[0], edited_ids[1]);
    }
}
