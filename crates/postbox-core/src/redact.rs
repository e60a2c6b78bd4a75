//! Masks credential-like substrings before text reaches a terminal or a log.

use regex::Regex;
use std::sync::OnceLock;

const MASK: &str = "[REDACTED]";

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let specs: [(&str, &'static str); 6] = [
            // "access_token": "..." and friends inside JSON bodies
            (
                r#"(?i)("(?:access_token|refresh_token|id_token|client_secret|clientSecret|code)"\s*:\s*")[^"]*(")"#,
                "${1}[REDACTED]${2}",
            ),
            // access_token=... in query strings and form bodies
            (
                r"(?i)\b((?:access_token|refresh_token|id_token|client_secret|code)=)[^&\s]+",
                "${1}[REDACTED]",
            ),
            (r"(?i)\b(bearer\s+)[A-Za-z0-9._~+/=-]+", "${1}[REDACTED]"),
            (r"ya29\.[A-Za-z0-9._-]+", MASK),
            (r"1//[A-Za-z0-9._-]+", MASK),
            (r"GOCSPX-[A-Za-z0-9_-]+", MASK),
        ];
        specs
            .into_iter()
            .filter_map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .ok()
                    .map(|pattern| Rule { pattern, replacement })
            })
            .collect()
    })
}

/// Returns `text` with bearer tokens, OAuth tokens and client secrets masked.
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    let mut output = text.to_string();
    for rule in rules() {
        output = rule
            .pattern
            .replace_all(&output, rule.replacement)
            .into_owned();
    }
    output
}
