//! Process-wide conversation memory and the suggestion-token table.
//!
//! Both are bounded: per-user history drops its oldest messages, the user
//! table evicts the least-recently-seen user, and the token table is a FIFO
//! with a fixed cap.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use parley_llm::Message;

/// Most messages remembered per user.
const MAX_HISTORY_MESSAGES: usize = 64;

/// Most users tracked at once.
const MAX_USERS: usize = 1024;

/// Most outstanding suggestion tokens.
const MAX_TOKENS: usize = 64;

struct History {
    messages: VecDeque<Message>,
    touched: Instant,
}

impl History {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            touched: Instant::now(),
        }
    }
}

/// Mapping from user id to ordered conversation history.
pub struct Memory {
    inner: Mutex<HashMap<i64, History>>,
    history_cap: usize,
    user_cap: usize,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_caps(MAX_HISTORY_MESSAGES, MAX_USERS)
    }

    #[must_use]
    pub fn with_caps(history_cap: usize, user_cap: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            history_cap,
            user_cap,
        }
    }

    /// Wipe the history for a user.
    pub fn reset(&self, user_id: i64) {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.insert(user_id, History::new());
    }

    /// Append a message, initializing the history on first contact.
    pub fn append(&self, user_id: i64, message: Message) {
        let mut inner = self.inner.lock().expect("poisoned");
        if !inner.contains_key(&user_id) && inner.len() >= self.user_cap {
            // Evict the least-recently-seen user to stay within the cap.
            if let Some(oldest) = inner
                .iter()
                .min_by_key(|(_, h)| h.touched)
                .map(|(id, _)| *id)
            {
                tracing::debug!(user_id = oldest, "evicting idle conversation");
                inner.remove(&oldest);
            }
        }
        let history = inner.entry(user_id).or_insert_with(History::new);
        history.touched = Instant::now();
        history.messages.push_back(message);
        while history.messages.len() > self.history_cap {
            history.messages.pop_front();
        }
    }

    /// Snapshot of the ordered history, possibly empty.
    #[must_use]
    pub fn get(&self, user_id: i64) -> Vec<Message> {
        let mut inner = self.inner.lock().expect("poisoned");
        match inner.get_mut(&user_id) {
            Some(history) => {
                history.touched = Instant::now();
                history.messages.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Number of remembered messages for a user.
    #[must_use]
    pub fn len(&self, user_id: i64) -> usize {
        let inner = self.inner.lock().expect("poisoned");
        inner.get(&user_id).map_or(0, |h| h.messages.len())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// FIFO-bounded table resolving suggestion tokens back to question text.
pub struct Tokens {
    inner: Mutex<VecDeque<(String, String)>>,
    cap: usize,
}

impl Tokens {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cap(MAX_TOKENS)
    }

    #[must_use]
    pub fn with_cap(cap: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            cap,
        }
    }

    pub fn insert(&self, token: &str, question: &str) {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.push_back((token.to_owned(), question.to_owned()));
        while inner.len() > self.cap {
            inner.pop_front();
        }
    }

    /// Look up the question text for a token. The token stays valid until
    /// evicted, so a button can be activated more than once.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<String> {
        let inner = self.inner.lock().expect("poisoned");
        inner
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, q)| q.clone())
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Self::new()
    }
}
