//! Text normalization for recognized speech and generated replies
//!
//! Input cleanup fixes known mis-transcriptions of the wake phrase. Output
//! cleanup removes markdown and boilerplate openers so replies read well
//! when spoken aloud.

use std::sync::LazyLock;

use regex::Regex;

/// Reply used when there is nothing left to say
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response.";

/// Canonical wake phrase
pub const WAKE_PHRASE: &str = "hey R3";

/// Ordered wake-phrase corrections, applied to the start of the input
pub static INPUT_CORRECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^hey artie\b",
        r"(?i)^hey r3c\b",
        r"(?i)^hey artist\b",
        r"(?i)^hey our tc\b",
        r"(?i)^hey our dc\b",
        r"(?i)^hey are three\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Self-referential openers stripped from the start of replies
pub static LEADING_BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^the multiverse is\b",
        r"(?i)^multiverse refers to\b",
        r"(?i)^in physics,",
        r"(?i)^according to\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static CODE_FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-z]*\n").expect("valid regex"));

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"));

static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("valid regex"));

/// Clean up a recognized utterance
///
/// Trims whitespace and rewrites phonetic near-misses of the wake phrase.
#[must_use]
pub fn normalize_input(raw: &str) -> String {
    let mut cleaned = raw.trim().to_string();

    for pattern in INPUT_CORRECTIONS.iter() {
        if let std::borrow::Cow::Owned(replaced) = pattern.replace(&cleaned, WAKE_PHRASE) {
            cleaned = replaced;
        }
    }

    cleaned
}

/// Clean up a generated reply before it is shown and spoken
///
/// Cleanup runs until the text stops changing, so the result is stable
/// under repeated application.
#[must_use]
pub fn normalize_output(raw: &str) -> String {
    let mut current = raw.trim().to_string();

    loop {
        let next = output_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        current
    }
}

/// One cleanup pass: markdown, then leading boilerplate
fn output_pass(text: &str) -> String {
    let without_fences = CODE_FENCE_OPEN.replace_all(text, "").replace("```", "");
    let without_bold = BOLD.replace_all(&without_fences, "$1");
    let without_italic = ITALIC.replace_all(&without_bold, "$1");

    let mut cleaned = without_italic.trim().to_string();
    let mut stripped = false;

    for pattern in LEADING_BOILERPLATE.iter() {
        if let std::borrow::Cow::Owned(replaced) = pattern.replace(&cleaned, "") {
            cleaned = replaced.trim().to_string();
            stripped = true;
        }
    }

    if stripped {
        capitalize_first(&cleaned)
    } else {
        cleaned
    }
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
