//! Utterance classification tables
//!
//! Pattern lists are public so callers can inspect or extend them; the
//! classifier functions are pure.

use std::sync::LazyLock;

use regex::Regex;

/// Interrogative openers, contracted interrogatives, or a trailing `?`
pub static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(what|who|where|when|why|how|is|are|can|could|would|should|do|does|did)\b",
        r"(?i)\b(what's|who's|where's|when's|how's|isn't|aren't|can't)\b",
        r"\?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// One or two capitalized words
pub static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?i)^[A-Z][a-z]+$", r"(?i)^[A-Z][a-z]+\s[A-Z][a-z]+$"]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});

/// Auxiliary or copula verbs anywhere in the text
pub static VERB_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(are|is|were|was|have|has|had|do|does|did)\b").expect("valid regex")
});

/// Phrases that end the conversation
///
/// Matched against the trimmed, lowercased utterance with trailing
/// punctuation removed.
pub static END_COMMAND_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^i'?m done(,? (rtc|r3))?$",
        r"^done$",
        r"^end (the )?conversation$",
        r"^(good ?bye|bye)(,? (rtc|r3))?$",
        r"^exit$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// How a first substantive utterance is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTurn {
    Question,
    Name,
}

/// Whether `text` asks to end the conversation
#[must_use]
pub fn is_end_command(text: &str) -> bool {
    let cleaned = text
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'))
        .trim()
        .to_lowercase()
        .replace('\u{2019}', "'");

    !cleaned.is_empty() && END_COMMAND_PATTERNS.iter().any(|p| p.is_match(&cleaned))
}

/// Classify the first utterance of a session as a question or a name
///
/// Explicit question patterns win, then name shapes, then the verb
/// heuristic (a verb means question-like).
#[must_use]
pub fn classify_first_turn(text: &str) -> FirstTurn {
    let text = text.trim();

    if QUESTION_PATTERNS.iter().any(|p| p.is_match(text)) {
        return FirstTurn::Question;
    }

    if NAME_PATTERNS.iter().any(|p| p.is_match(text)) {
        return FirstTurn::Name;
    }

    if VERB_STRUCTURE.is_match(text) {
        FirstTurn::Question
    } else {
        FirstTurn::Name
    }
}

/// Shorthand for `classify_first_turn(text) == FirstTurn::Question`
#[must_use]
pub fn is_question(text: &str) -> bool {
    classify_first_turn(text) == FirstTurn::Question
}

/// Tidy a spoken name for storage and greetings
///
/// Trailing punctuation is dropped and each word capitalized.
#[must_use]
pub fn clean_name(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
