//! Strips formatting artifacts from raw model output before it is parsed.
//!
//! The sanitizer is a fixed, ordered list of [`SanitizeRule`]s. Rules are applied in order
//! and the whole list is re-applied until the text stops changing, then the result is
//! trimmed. Running [`sanitize`] on its own output returns it unchanged.

use regex::Regex;
use std::sync::LazyLock;

/// A named removal/replacement pattern.
#[derive(Debug)]
pub struct SanitizeRule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl SanitizeRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("sanitizer patterns are literals"),
            replacement,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, self.replacement).into_owned()
    }
}

static RULES: LazyLock<Vec<SanitizeRule>> = LazyLock::new(|| {
    vec![
        // Leading ``` or ```json / ```JSON / ```jsonc, plus whatever whitespace follows.
        // Backticks inside the text are left alone.
        SanitizeRule::new("fence_open", r"^```[A-Za-z0-9_-]*\s*", ""),
        SanitizeRule::new("fence_close", r"\s*```$", ""),
        SanitizeRule::new("line_breaks", r"\r\n|\r|\n", " "),
    ]
});

/// The rules in application order.
pub fn rules() -> &'static [SanitizeRule] {
    &RULES
}

/// Cleans raw model text so it can be handed to the JSON parser.
pub fn sanitize(raw: &str) -> String {
    let mut current = raw.trim().to_string();

    // After the first pass no line breaks remain, so every further change shrinks the text.
    loop {
        let next = RULES
            .iter()
            .fold(current.clone(), |text, rule| rule.apply(&text))
            .trim()
            .to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}
