//! `LIKE` pattern translation.

use regex::Regex;

use crate::error::{DataError, Result};

/// Compiles a `LIKE` pattern to an anchored regular expression.
///
/// `*` and `%` match any run of characters; `[x]` matches `x` literally,
/// which is how wildcards are escaped. Everything else matches itself.
pub(crate) fn like_regex(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    if !case_sensitive {
        source.push_str("(?i)");
    }
    source.push_str("(?s)^");

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' | '%' => source.push_str(".*"),
            '[' => {
                let mut literal = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    literal.push(inner);
                }
                if !closed {
                    return Err(DataError::expression(format!(
                        "unterminated '[' in LIKE pattern '{pattern}'"
                    )));
                }
                source.push_str(&regex::escape(&literal));
            }
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source)
        .map_err(|e| DataError::expression(format!("invalid LIKE pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        let re = like_regex("Jo%", true).unwrap();
        assert!(re.is_match("John"));
        assert!(re.is_match("Jo"));
        assert!(!re.is_match("joe"));

        let re = like_regex("*son", false).unwrap();
        assert!(re.is_match("JACKSON"));
        assert!(!re.is_match("sonny"));
    }

    #[test]
    fn test_escaped_wildcards() {
        let re = like_regex("100[%]", true).unwrap();
        assert!(re.is_match("100%"));
        assert!(!re.is_match("1000"));

        let re = like_regex("a[*]b", true).unwrap();
        assert!(re.is_match("a*b"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let re = like_regex("a.b(c)", true).unwrap();
        assert!(re.is_match("a.b(c)"));
        assert!(!re.is_match("axb(c)"));
    }

    #[test]
    fn test_unterminated_bracket() {
        assert!(like_regex("a[b", true).is_err());
    }
}
