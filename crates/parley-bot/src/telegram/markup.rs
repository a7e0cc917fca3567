//! Decorates raw completion text with `Telegram` HTML and slices it into
//! message-sized chunks for the progressive reveal.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of one outbound chunk. Below the Bot API's 4096-char
/// message limit to leave headroom for injected tags.
pub const CHUNK_LIMIT: usize = 4000;

// ---------------------------------------------------------------------------
// Sentence splitting
// ---------------------------------------------------------------------------

/// Split raw text into sentences: break after `.`, `!`, or `?` followed by
/// whitespace. The whitespace run between sentences is consumed.
#[must_use]
pub fn sentences(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

// ---------------------------------------------------------------------------
// Decoration
// ---------------------------------------------------------------------------

/// A whitespace-delimited token split into non-alphanumeric fringes and an
/// alphanumeric core.
struct Word<'a> {
    prefix: &'a str,
    core: &'a str,
    suffix: &'a str,
}

fn split_word(token: &str) -> Word<'_> {
    let Some(start) = token.find(|c: char| c.is_alphanumeric()) else {
        return Word {
            prefix: token,
            core: "",
            suffix: "",
        };
    };
    let last = token
        .rfind(|c: char| c.is_alphanumeric())
        .expect("core exists");
    let end = last
        + token[last..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
    Word {
        prefix: &token[..start],
        core: &token[start..end],
        suffix: &token[end..],
    }
}

/// A capitalized word: one uppercase ASCII letter followed by one or more
/// lowercase ASCII letters, matched whole-word.
fn is_capitalized(core: &str) -> bool {
    let mut chars = core.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_uppercase() {
        return false;
    }
    let mut rest = 0usize;
    for c in chars {
        if !c.is_ascii_lowercase() {
            return false;
        }
        rest += 1;
    }
    rest > 0
}

fn is_number(core: &str) -> bool {
    !core.is_empty() && core.chars().all(|c| c.is_ascii_digit())
}

/// Escape `&`, `<`, and `>` for safe inclusion in `Telegram` HTML.
fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// HTML-escape one sentence and inject emphasis markup: runs of consecutive
/// capitalized words become `<b>…</b>`, standalone numbers and `#`-prefixed
/// numbers become `<code>…</code>`. Inner whitespace is preserved.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn decorate(sentence: &str) -> String {
    // Split into (leading gap, token) pairs, keeping original whitespace.
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    let mut trailing = "";
    let mut idx = 0;
    while idx < sentence.len() {
        let Some(word_start) = sentence[idx..]
            .find(|c: char| !c.is_whitespace())
            .map(|o| idx + o)
        else {
            trailing = &sentence[idx..];
            break;
        };
        let word_end = sentence[word_start..]
            .find(char::is_whitespace)
            .map_or(sentence.len(), |o| word_start + o);
        pairs.push((&sentence[idx..word_start], &sentence[word_start..word_end]));
        idx = word_end;
    }

    let mut out = String::with_capacity(sentence.len() + 16);
    let mut in_run = false;
    for i in 0..pairs.len() {
        let (gap, token) = pairs[i];
        let word = split_word(token);

        if in_run {
            // Continuation was validated when the previous word was emitted.
            out.push(' ');
            escape_into(word.core, &mut out);
        } else {
            escape_into(gap, &mut out);
            if is_capitalized(word.core) {
                escape_into(word.prefix, &mut out);
                out.push_str("<b>");
                escape_into(word.core, &mut out);
                in_run = true;
            } else if is_number(word.core) {
                if let Some(stripped) = word.prefix.strip_suffix('#') {
                    escape_into(stripped, &mut out);
                    out.push_str("<code>#");
                } else {
                    escape_into(word.prefix, &mut out);
                    out.push_str("<code>");
                }
                escape_into(word.core, &mut out);
                out.push_str("</code>");
                escape_into(word.suffix, &mut out);
                continue;
            } else {
                escape_into(token, &mut out);
                continue;
            }
        }

        // A run survives to the next word only across a bare single space.
        let next_continues = word.suffix.is_empty()
            && pairs.get(i + 1).is_some_and(|(next_gap, next_token)| {
                let next = split_word(next_token);
                *next_gap == " " && next.prefix.is_empty() && is_capitalized(next.core)
            });
        if !next_continues {
            out.push_str("</b>");
            escape_into(word.suffix, &mut out);
            in_run = false;
        }
    }
    escape_into(trailing, &mut out);
    out
}

// ---------------------------------------------------------------------------
// Chunk accumulation
// ---------------------------------------------------------------------------

/// What the caller should do with the outbound message after a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit {
    /// Update the current outbound message to this text.
    Update(String),
    /// The buffer would overflow: start a new outbound message with this text.
    Rollover(String),
    /// Nothing to display (identical to the last emitted text).
    Skip,
}

/// Running buffer of decorated sentences, flushed in chunk-sized pieces.
///
/// Tracks the last emitted text so an identical snapshot is never emitted
/// twice in a row.
pub struct Accumulator {
    limit: usize,
    current: String,
    last: String,
}

impl Accumulator {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            current: String::new(),
            last: String::new(),
        }
    }

    pub fn push(&mut self, sentence: &str) -> Emit {
        if sentence.is_empty() {
            return Emit::Skip;
        }
        if !self.current.is_empty() && self.current.len() + sentence.len() + 1 > self.limit {
            self.current.clear();
            self.current.push_str(sentence);
            self.current.push(' ');
            let snapshot = self.current.trim().to_owned();
            self.last = snapshot.clone();
            return Emit::Rollover(snapshot);
        }
        self.current.push_str(sentence);
        self.current.push(' ');
        let snapshot = self.current.trim().to_owned();
        if snapshot == self.last {
            Emit::Skip
        } else {
            self.last = snapshot.clone();
            Emit::Update(snapshot)
        }
    }
}

/// Hard-split a sentence that alone exceeds the chunk limit. Normal
/// sentences come back as a single piece.
#[must_use]
pub fn clamp(sentence: &str, limit: usize) -> Vec<String> {
    if sentence.len() <= limit {
        return vec![sentence.to_owned()];
    }
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in sentence.chars() {
        if piece.len() + c.len_utf8() > limit {
            pieces.push(std::mem::take(&mut piece));
        }
        piece.push(c);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Post-process a raw reply into outbound chunks: split into sentences,
/// decorate each, and accumulate into chunks of at most `limit` characters.
/// Consecutive duplicate chunks are dropped.
#[must_use]
pub fn chunks(raw: &str, limit: usize) -> Vec<String> {
    let mut acc = Accumulator::new(limit);
    let mut out: Vec<String> = Vec::new();
    for sentence in sentences(raw) {
        let decorated = decorate(&sentence);
        for piece in clamp(&decorated, limit) {
            match acc.push(&piece) {
                Emit::Update(text) => match out.last_mut() {
                    Some(last) => *last = text,
                    None => out.push(text),
                },
                Emit::Rollover(text) => out.push(text),
                Emit::Skip => {}
            }
        }
    }
    out.retain(|chunk| !chunk.is_empty());
    out.dedup();
    out
}
