//! Prepares reply text for speaking.
//!
//! Model replies arrive as markdown and sometimes carry a `<think>` block.
//! None of that should be read aloud.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // An unterminated block runs to the end of the reply (truncated output).
    static ref REASONING: Regex = Regex::new(r"(?s)<think>.*?(?:</think>|$)").unwrap();
    static ref CODE_FENCE: Regex = Regex::new(r"(?m)^\s*```[^\n]*$").unwrap();
    static ref LINK: Regex = Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap();
    static ref HEADING: Regex = Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").unwrap();
    static ref LIST_MARKER: Regex = Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+").unwrap();
    static ref EMPHASIS: Regex = Regex::new(r"\*{1,3}|_{2,3}|~~|`").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Strip markup from `text`, falling back to the trimmed original when
/// nothing speakable is left.
pub fn prepare(text: &str) -> String {
    let cleaned = REASONING.replace_all(text, " ");
    let cleaned = CODE_FENCE.replace_all(&cleaned, " ");
    let cleaned = LINK.replace_all(&cleaned, "$1");
    let cleaned = HEADING.replace_all(&cleaned, "");
    let cleaned = LIST_MARKER.replace_all(&cleaned, "");
    let cleaned = EMPHASIS.replace_all(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        text.trim().to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(prepare("Plain text here."), "Plain text here.");
    }

    #[test]
    fn drops_reasoning_blocks() {
        assert_eq!(
            prepare("<think>user wants a greeting</think>\nHi there!"),
            "Hi there!"
        );
    }

    #[test]
    fn drops_unterminated_reasoning() {
        assert_eq!(prepare("Answer first. <think>and then it got cut"), "Answer first.");
    }

    #[test]
    fn strips_markdown() {
        assert_eq!(
            prepare("## Tunneling\n\n**Quantum** tunneling lets a *particle* cross a `barrier`."),
            "Tunneling Quantum tunneling lets a particle cross a barrier."
        );
    }

    #[test]
    fn links_keep_their_label() {
        assert_eq!(
            prepare("See [the docs](https://example.com/docs) for more."),
            "See the docs for more."
        );
    }

    #[test]
    fn lists_and_fences_flatten() {
        let text = "Steps:\n- one\n- two\n1. three\n```rust\nlet x = 1;\n```";
        assert_eq!(prepare(text), "Steps: one two three let x = 1;");
    }

    #[test]
    fn keeps_snake_case_words() {
        assert_eq!(prepare("call my_function now"), "call my_function now");
    }

    #[test]
    fn falls_back_when_nothing_is_left() {
        assert_eq!(prepare("  ***  "), "***");
        assert_eq!(prepare(""), "");
    }
}
