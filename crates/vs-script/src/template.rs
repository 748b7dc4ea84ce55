//! `{name}` placeholder substitution

use std::collections::HashMap;
use tracing::debug;

/// Replace every `{name}` in `template` with its captured value
///
/// Names with no captured value render as `default`. A `{` with no closing
/// `}` is plain text.
pub fn render(template: &str, entities: &HashMap<String, String>, default: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let inner = &after[..close];

        // `{a {b}`: only the innermost brace opens a placeholder
        if let Some(nested) = inner.rfind('{') {
            out.push_str(&rest[..open + 1 + nested]);
            rest = &rest[open + 1 + nested..];
            continue;
        }

        out.push_str(&rest[..open]);
        let name = inner.trim();
        match entities.get(name) {
            Some(value) => out.push_str(value),
            None => {
                debug!(placeholder = name, "No value captured, using default");
                out.push_str(default);
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_values() {
        let values = entities(&[("room", "kitchen"), ("level", "50")]);
        assert_eq!(
            render("set {room} lights to {level} percent", &values, ""),
            "set kitchen lights to 50 percent"
        );
    }

    #[test]
    fn test_missing_value_uses_default() {
        assert_eq!(render("play {artist}", &HashMap::new(), ""), "play ");
        assert_eq!(render("play {artist}", &HashMap::new(), "something"), "play something");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let values = entities(&[("room", "hall")]);
        assert_eq!(render("{ room }", &values, ""), "hall");
    }

    #[test]
    fn test_unterminated_brace_is_text() {
        let values = entities(&[("a", "x")]);
        assert_eq!(render("say {a} and {b", &values, ""), "say x and {b");
        assert_eq!(render("only } here", &values, ""), "only } here");
    }

    #[test]
    fn test_nested_open_brace() {
        let values = entities(&[("b", "x")]);
        assert_eq!(render("{a {b}", &values, ""), "{a x");
    }

    #[test]
    fn test_values_are_not_rendered_again() {
        let values = entities(&[("a", "{b}"), ("b", "nope")]);
        assert_eq!(render("{a}", &values, ""), "{b}");
    }
}
