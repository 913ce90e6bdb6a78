//! Normalisation of raw dictionary glosses into insertable text.
//!
//! Glosses are rendered as a single upper-case hyphenated word so a
//! substituted gloss reads as one token inside the surrounding text.

use std::sync::LazyLock;

use regex::Regex;

static GLOSS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(TO-)?(?P<word>.+?)(-\(.*\))?$").expect("gloss pattern is valid")
});

/// `"knock down"` → `"KNOCK-DOWN"`.
pub fn format_english(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase()
}

/// Format a dictionary gloss, dropping a leading infinitive `to` and a
/// trailing parenthetical note.
///
/// Returns `None` for glosses with no word left after formatting.
pub fn format_dictionary_gloss(text: &str) -> Option<String> {
    let text = format_english(text);
    let Some(caps) = GLOSS_RE.captures(&text) else {
        tracing::error!(gloss = %text, "failed to parse dictionary gloss");
        return None;
    };
    caps.name("word").map(|m| m.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_english() {
        assert_eq!(format_english("  knock   down "), "KNOCK-DOWN");
        assert_eq!(format_english("lord"), "LORD");
    }

    #[test]
    fn test_strips_infinitive() {
        assert_eq!(format_dictionary_gloss("to defeat").as_deref(), Some("DEFEAT"));
    }

    #[test]
    fn test_strips_parenthetical() {
        assert_eq!(
            format_dictionary_gloss("to knock down (an enemy)").as_deref(),
            Some("KNOCK-DOWN")
        );
    }

    #[test]
    fn test_plain_gloss() {
        assert_eq!(
            format_dictionary_gloss("demon king").as_deref(),
            Some("DEMON-KING")
        );
    }

    #[test]
    fn test_empty_gloss() {
        assert_eq!(format_dictionary_gloss("   "), None);
    }
}
