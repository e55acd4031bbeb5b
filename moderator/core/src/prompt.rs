//! Prompt Templates
//!
//! Every prompt starts with a style instruction looked up by key, followed by
//! either the opening request (first turn) or the partner's last answer.
//!
//! Keys match exactly and case-sensitively. An unknown key falls back to
//! [`DEFAULT_STYLE_PROMPT`] rather than failing.

/// Style key used when none is configured
pub const DEFAULT_STYLE: &str = "formal";

/// Instruction used for unrecognized style keys
pub const DEFAULT_STYLE_PROMPT: &str =
    "Hold a thoughtful, balanced conversation and keep each reply concise.";

/// Known style keys and their instructions
pub const STYLES: &[(&str, &str)] = &[
    (
        "formal",
        "Use a formal, professional tone with precise language and well-structured arguments.",
    ),
    (
        "casual",
        "Keep it casual and friendly, as if chatting with a colleague over coffee.",
    ),
    (
        "debate",
        "Treat this as a structured debate: take a clear position, challenge your partner's claims and defend your own.",
    ),
    (
        "humorous",
        "Keep the tone light and witty. Jokes are welcome as long as the point still comes across.",
    ),
    (
        "philosophical",
        "Approach the subject philosophically, questioning assumptions and exploring underlying principles.",
    ),
];

/// Resolve a style key to its instruction
#[must_use]
pub fn style_prompt(key: &str) -> &'static str {
    STYLES
        .iter()
        .find(|(name, _)| *name == key)
        .map_or(DEFAULT_STYLE_PROMPT, |(_, prompt)| prompt)
}

/// Whether the key names a known style
#[must_use]
pub fn is_known_style(key: &str) -> bool {
    STYLES.iter().any(|(name, _)| *name == key)
}

/// First-turn prompt asking the opening participant for a statement
#[must_use]
pub fn opening_prompt(style: &str, topic: &str) -> String {
    format!(
        "{} Start a discussion about the following topic: \"{topic}\". \
         Please provide a concise opening statement.",
        style_prompt(style)
    )
}

/// Prompt handing `current`'s answer to `next`
///
/// `quote` must be the visible answer only; thought text is never forwarded.
#[must_use]
pub fn reply_prompt(style: &str, next: &str, current: &str, quote: &str) -> String {
    format!(
        "{} You are {next}. Your partner, {current}, said: \"{quote}\". \
         Respond directly, keeping the discussion going.",
        style_prompt(style)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_known_styles_resolve() {
        for (key, prompt) in STYLES {
            assert_eq!(style_prompt(key), *prompt);
            assert!(is_known_style(key));
        }
        assert!(is_known_style(DEFAULT_STYLE));
    }

    #[test]
    fn test_style_lookup_is_case_sensitive() {
        assert_eq!(style_prompt("Formal"), DEFAULT_STYLE_PROMPT);
        assert!(!is_known_style("DEBATE"));
    }

    #[test]
    fn test_unknown_style_falls_back() {
        assert_eq!(style_prompt("zany"), DEFAULT_STYLE_PROMPT);
        assert!(opening_prompt("zany", "X").starts_with(DEFAULT_STYLE_PROMPT));
    }

    #[test]
    fn test_opening_prompt() {
        let prompt = opening_prompt("debate", "X");
        assert!(prompt.starts_with(style_prompt("debate")));
        assert!(prompt.ends_with(
            " Start a discussion about the following topic: \"X\". \
             Please provide a concise opening statement."
        ));
    }

    #[test]
    fn test_reply_prompt() {
        let prompt = reply_prompt("casual", "b", "a", "P");
        assert_eq!(
            prompt,
            format!(
                "{} You are b. Your partner, a, said: \"P\". \
                 Respond directly, keeping the discussion going.",
                style_prompt("casual")
            )
        );
    }
}
