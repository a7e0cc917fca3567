//! Parses the follow-up-suggestion completion into a bounded list of
//! questions and source links.

/// Marker glyph prefixing suggestion lines in provider output.
pub const MARKER: char = '➥';

/// Most questions and, independently, most links surfaced per round.
const MAX_SUGGESTIONS: usize = 2;

/// Length of a callback-data token.
const TOKEN_LEN: usize = 8;

/// Questions and links pulled out of one suggestion completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extracted {
    pub questions: Vec<String>,
    pub links: Vec<String>,
}

/// Extract suggestions from a completion: only lines starting with the
/// marker glyph count. Zero matches is not an error.
#[must_use]
pub fn extract(text: &str) -> Extracted {
    let mut extracted = Extracted::default();
    for line in text.lines() {
        let Some(rest) = line.strip_prefix(MARKER) else {
            continue;
        };
        if extracted.links.len() < MAX_SUGGESTIONS {
            if let Some(link) = first_url(rest) {
                extracted.links.push(link.to_owned());
            }
        }
        if extracted.questions.len() < MAX_SUGGESTIONS {
            let question = strip_source(rest.trim());
            if !question.is_empty() {
                extracted.questions.push(question);
            }
        }
    }
    extracted
}

/// Mint a short opaque token used as callback data for one suggestion.
#[must_use]
pub fn mint_token() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(TOKEN_LEN)
        .collect()
}

/// First HTTP(S) URL in the line, trailing punctuation trimmed.
fn first_url(line: &str) -> Option<&str> {
    let http = line.find("http://");
    let https = line.find("https://");
    let start = match (http, https) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    let url = &line[start..];
    let end = url.find(char::is_whitespace).unwrap_or(url.len());
    let url = url[..end].trim_end_matches(|c| matches!(c, ']' | ')' | '.' | ',' | '`' | '"' | '\''));
    (!url.is_empty()).then_some(url)
}

/// Drop a trailing `[source: …]` annotation from the question text.
fn strip_source(text: &str) -> String {
    match text.find("[source:") {
        Some(pos) => text[..pos].trim_end().to_owned(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_line_with_source_annotation() {
        let block = "➥ `What is X?` [source: https://example.com]\njust a plain line";
        let extracted = extract(block);
        assert_eq!(extracted.questions, vec!["`What is X?`"]);
        assert_eq!(extracted.links, vec!["https://example.com"]);
    }

    #[test]
    fn lines_without_marker_are_ignored() {
        let block = "1. suggestion without marker\nhttps://ignored.example.com";
        assert_eq!(extract(block), Extracted::default());
    }

    #[test]
    fn caps_questions_and_links_at_two() {
        let block = "\
➥ `One?` [source: https://a.example.com]
➥ `Two?` [source: https://b.example.com]
➥ `Three?` [source: https://c.example.com]";
        let extracted = extract(block);
        assert_eq!(extracted.questions, vec!["`One?`", "`Two?`"]);
        assert_eq!(
            extracted.links,
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }

    #[test]
    fn question_without_link_keeps_order() {
        let block = "➥ `No source here?`\n➥ `With source?` [source: http://x.example.com]";
        let extracted = extract(block);
        assert_eq!(extracted.questions, vec!["`No source here?`", "`With source?`"]);
        assert_eq!(extracted.links, vec!["http://x.example.com"]);
    }

    #[test]
    fn empty_input_yields_empty_lists() {
        assert_eq!(extract(""), Extracted::default());
    }

    #[test]
    fn url_trailing_bracket_is_trimmed() {
        assert_eq!(
            first_url("see [source: https://example.com/page]"),
            Some("https://example.com/page")
        );
    }

    #[test]
    fn plain_http_url_is_found() {
        assert_eq!(
            first_url("more at http://example.org/info here"),
            Some("http://example.org/info")
        );
    }

    #[test]
    fn no_url_in_line() {
        assert_eq!(first_url("nothing to see"), None);
    }

    #[test]
    fn minted_tokens_are_short_and_distinct() {
        let a = mint_token();
        let b = mint_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        // Collisions are astronomically unlikely at this length.
        assert_ne!(a, b);
    }
}
