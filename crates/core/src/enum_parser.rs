//! Parses inline `ENUM('a','b')`-style type strings into their ordered
//! value list (spec §4.2). A stateful scan rather than a regex split:
//! values can contain commas, and both doubled-quote (`''`) and backslash
//! (`\'`) escapes need to collapse to a literal quote.

/// Parses the parenthesised value list of an inline enum type declaration,
/// e.g. `ENUM('a','b,c','it''s')` -> `["a", "b,c", "it's"]`. Returns an
/// empty vector if `raw` carries no parenthesised value list.
#[must_use]
pub fn parse_enum_literal_values(raw: &str) -> Vec<String> {
    let Some(start) = raw.find('(') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind(')') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    let mut values = Vec::new();
    let mut chars = raw[start + 1..end].chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\'' {
            continue;
        }
        let mut value = String::new();
        loop {
            match chars.next() {
                None => break,
                Some('\\') => {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                }
                Some('\'') => {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(other) => value.push(other),
            }
        }
        values.push(value);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_values() {
        assert_eq!(
            parse_enum_literal_values("ENUM('active','inactive')"),
            vec!["active".to_string(), "inactive".to_string()]
        );
    }

    #[test]
    fn handles_doubled_quote_escapes() {
        assert_eq!(parse_enum_literal_values("ENUM('it''s fine')"), vec!["it's fine".to_string()]);
    }

    #[test]
    fn handles_backslash_escapes() {
        assert_eq!(parse_enum_literal_values(r"ENUM('can\'t')"), vec!["can't".to_string()]);
    }

    #[test]
    fn preserves_commas_inside_a_value() {
        assert_eq!(parse_enum_literal_values("ENUM('a,b','c')"), vec!["a,b".to_string(), "c".to_string()]);
    }

    #[test]
    fn non_enum_type_yields_nothing() {
        assert!(parse_enum_literal_values("VARCHAR(255)").is_empty());
    }
}
