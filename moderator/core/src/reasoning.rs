//! Reasoning Splitter
//!
//! Some models emit an internal thought passage wrapped in `<think>` …
//! `</think>` before their answer. The moderator shows that passage separately
//! and never quotes it back to the other participant.
//!
//! Marker detection is ASCII case-insensitive. An opening marker with no
//! closing marker still classifies the response as reasoning-bearing: all text
//! after the opening marker is thought, and only the text before it is content.

use serde::{Deserialize, Serialize};

/// Opening thought marker
pub const THOUGHT_OPEN: &str = "<think>";

/// Closing thought marker
pub const THOUGHT_CLOSE: &str = "</think>";

/// A raw response separated into its visible and thought parts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResponse {
    /// User-facing answer
    pub content: String,
    /// Thought text, when the response carried a non-empty thought segment
    pub thought_process: Option<String>,
    /// Whether an opening thought marker was present
    pub is_reasoning: bool,
}

impl SplitResponse {
    fn plain(raw: &str) -> Self {
        Self {
            content: raw.to_string(),
            thought_process: None,
            is_reasoning: false,
        }
    }
}

/// Whether the text contains an opening thought marker
#[must_use]
pub fn has_thought_marker(raw: &str) -> bool {
    has_thought_marker_from(raw, 0)
}

/// Whether an opening thought marker starts at or after byte offset `from`
///
/// `from` need not fall on a char boundary. An offset past the end finds
/// nothing.
#[must_use]
pub fn has_thought_marker_from(raw: &str, from: usize) -> bool {
    find_ignore_case(raw, THOUGHT_OPEN, from).is_some()
}

/// Separate thought segments from the visible answer
///
/// Without an opening marker the text is returned unchanged as content.
/// Otherwise every marked segment is removed from the content, the content is
/// trimmed, and the trimmed segment bodies are joined with a blank line.
/// The returned content never contains an opening marker.
#[must_use]
pub fn split_reasoning(raw: &str) -> SplitResponse {
    if !has_thought_marker(raw) {
        return SplitResponse::plain(raw);
    }

    let mut content = raw.to_string();
    let mut thoughts = Vec::new();
    // Text joined across a removed segment can spell a new opening marker
    while let Some(first) = find_ignore_case(&content, THOUGHT_OPEN, 0) {
        content = strip_segments(&content, first, &mut thoughts);
    }

    let thought = thoughts
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    SplitResponse {
        content: content.trim().to_string(),
        thought_process: (!thought.is_empty()).then_some(thought),
        is_reasoning: true,
    }
}

/// One left-to-right pass removing every segment that starts at or after `first`
fn strip_segments(raw: &str, first: usize, thoughts: &mut Vec<String>) -> String {
    let mut content = String::with_capacity(raw.len());
    let mut cursor = 0;
    let mut next_open = Some(first);

    while let Some(open) = next_open {
        content.push_str(&raw[cursor..open]);
        let body_start = open + THOUGHT_OPEN.len();

        if let Some(close) = find_ignore_case(raw, THOUGHT_CLOSE, body_start) {
            thoughts.push(raw[body_start..close].trim().to_string());
            cursor = close + THOUGHT_CLOSE.len();
            next_open = find_ignore_case(raw, THOUGHT_OPEN, cursor);
        } else {
            // Unterminated: the thought consumes the rest of the response
            thoughts.push(raw[body_start..].trim().to_string());
            cursor = raw.len();
            next_open = None;
        }
    }
    content.push_str(&raw[cursor..]);
    content
}

/// Byte offset of an ASCII needle, ignoring ASCII case
///
/// ASCII bytes never occur inside a multi-byte UTF-8 sequence, so any match
/// lands on a char boundary.
fn find_ignore_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes().get(from..)?;
    let needle = needle.as_bytes();
    hay.windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_unchanged() {
        let split = split_reasoning("  Just an answer.\n");
        assert_eq!(split.content, "  Just an answer.\n");
        assert_eq!(split.thought_process, None);
        assert!(!split.is_reasoning);
    }

    #[test]
    fn test_round_trip() {
        let split = split_reasoning("<think>T</think>C");
        assert_eq!(split.content, "C");
        assert_eq!(split.thought_process.as_deref(), Some("T"));
        assert!(split.is_reasoning);
    }

    #[test]
    fn test_multiline_thought_is_trimmed() {
        let raw = "<think>\nFirst I consider X.\nThen Y.\n</think>\n\nMy answer is Z.";
        let split = split_reasoning(raw);
        assert_eq!(
            split.thought_process.as_deref(),
            Some("First I consider X.\nThen Y.")
        );
        assert_eq!(split.content, "My answer is Z.");
    }

    #[test]
    fn test_case_insensitive_markers() {
        let split = split_reasoning("<THINK>hmm</Think> ok");
        assert_eq!(split.thought_process.as_deref(), Some("hmm"));
        assert_eq!(split.content, "ok");
        assert!(has_thought_marker("prefix <Think>"));
    }

    #[test]
    fn test_unterminated_thought_consumes_rest() {
        let split = split_reasoning("<think>still pondering when the stream ended");
        assert!(split.is_reasoning);
        assert_eq!(
            split.thought_process.as_deref(),
            Some("still pondering when the stream ended")
        );
        assert_eq!(split.content, "");
    }

    #[test]
    fn test_text_before_unterminated_marker_is_content() {
        let split = split_reasoning("Intro. <think>trailing");
        assert_eq!(split.content, "Intro.");
        assert_eq!(split.thought_process.as_deref(), Some("trailing"));
    }

    #[test]
    fn test_multiple_segments() {
        let split = split_reasoning("<think>a</think>One <think>b</think>two");
        assert_eq!(split.thought_process.as_deref(), Some("a\n\nb"));
        assert_eq!(split.content, "One two");
    }

    #[test]
    fn test_empty_thought_is_absent_but_reasoning() {
        let split = split_reasoning("<think>\n\n</think>Answer");
        assert!(split.is_reasoning);
        assert_eq!(split.thought_process, None);
        assert_eq!(split.content, "Answer");
    }

    #[test]
    fn test_split_is_idempotent_on_content() {
        for raw in [
            "<think>T</think>C",
            "<think>x</think> stray </think> close",
            "no markers at all",
            "<think>unterminated",
            "<thi<think>x</think>nk>y",
            "<THI<think></think>nK>a</think>b",
        ] {
            let once = split_reasoning(raw);
            let twice = split_reasoning(&once.content);
            assert_eq!(twice.content, once.content, "input: {raw:?}");
            assert_eq!(twice.thought_process, None, "input: {raw:?}");
        }
    }

    #[test]
    fn test_marker_formed_by_removal_is_split_too() {
        let split = split_reasoning("<thi<think>x</think>nk>y");
        assert_eq!(split.content, "");
        assert_eq!(split.thought_process.as_deref(), Some("x\n\ny"));

        let split = split_reasoning("A <th<think>1</think>ink>2</think> B");
        assert_eq!(split.content, "A  B");
        assert_eq!(split.thought_process.as_deref(), Some("1\n\n2"));
    }

    #[test]
    fn test_marker_search_from_offset() {
        let text = "answer <thi";
        let joined = format!("{text}nk>more");
        let from = text.len() - (THOUGHT_OPEN.len() - 1);
        assert!(has_thought_marker_from(&joined, from));
        assert!(!has_thought_marker_from(&joined, text.len()));
        assert!(!has_thought_marker_from("<think>", 100));
        // Offsets inside a multi-byte character are fine
        assert!(has_thought_marker_from("é<think>", 1));
    }

    #[test]
    fn test_multibyte_text_around_markers() {
        let split = split_reasoning("¿Qué? <think>pensando…</think> ¡Sí!");
        assert_eq!(split.content, "¿Qué?  ¡Sí!");
        assert_eq!(split.thought_process.as_deref(), Some("pensando…"));
    }
}
