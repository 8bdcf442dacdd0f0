//! Template variable substitution for composed messages/comments
//! (`send_followup`, `comment_post`): `{{first_name}}`, `{{last_name}}`,
//! `{{company}}`, matched case-insensitively, with unresolved placeholders
//! dropped and resulting whitespace collapsed.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").unwrap())
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]+").unwrap())
}

/// Substitutes `{{var}}` placeholders (case-insensitive on `var`) using
/// `vars`; placeholders with no matching key are dropped entirely, and the
/// resulting whitespace runs are collapsed to a single space. Idempotent:
/// running this twice on its own output is a no-op.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    let lowered: HashMap<String, &String> =
        vars.iter().map(|(k, v)| (k.to_lowercase(), v)).collect();

    let substituted = placeholder_pattern().replace_all(template, |caps: &regex::Captures| {
        let key = caps[1].to_lowercase();
        lowered.get(&key).map(|v| v.as_str()).unwrap_or("").to_string()
    });

    let collapsed = whitespace_pattern().replace_all(substituted.trim(), " ");
    collapsed.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variables_case_insensitively() {
        let mut vars = HashMap::new();
        vars.insert("first_name", "Dana".to_string());
        vars.insert("company", "Acme".to_string());
        let out = render("Hi {{FIRST_NAME}}, loved what {{Company}} is building.", &vars);
        assert_eq!(out, "Hi Dana, loved what Acme is building.");
    }

    #[test]
    fn drops_unresolved_placeholders_and_collapses_whitespace() {
        let vars = HashMap::new();
        let out = render("Hi {{first_name}}   {{last_name}}, welcome", &vars);
        assert_eq!(out, "Hi , welcome");
    }

    #[test]
    fn is_idempotent() {
        let mut vars = HashMap::new();
        vars.insert("first_name", "Dana".to_string());
        let once = render("Hi {{first_name}}!", &vars);
        let twice = render(&once, &vars);
        assert_eq!(once, twice);
    }
}
