//! Comparison-only normalisation rules (spec §4.3). Normalised forms are
//! never emitted in generated DDL — they exist purely so the differ can
//! decide "same or different" without being fooled by dialect spelling.

/// Normalises a type string for equality comparison: lowercase, then collapse
/// known dialect aliases onto one canonical spelling.
#[must_use]
pub fn normalize_type(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "int4" => "integer".to_string(),
        "int8" => "bigint".to_string(),
        "float4" => "real".to_string(),
        "float8" => "double precision".to_string(),
        "bool" => "boolean".to_string(),
        "timestamptz" => "timestamp with time zone".to_string(),
        "timetz" => "time with time zone".to_string(),
        other => other.to_string(),
    }
}

#[must_use]
pub fn types_equal(left: &str, right: &str) -> bool {
    normalize_type(left) == normalize_type(right)
}

/// Normalises a default expression for equality comparison.
#[must_use]
pub fn normalize_default(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    match trimmed.as_str() {
        "null" => "null".to_string(),
        "true" | "'t'" | "1" => "true".to_string(),
        "false" | "'f'" | "0" => "false".to_string(),
        other => other.to_string(),
    }
}

#[must_use]
pub fn defaults_equal(left: Option<&str>, right: Option<&str>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => normalize_default(left) == normalize_default(right),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_aliases_collapse() {
        assert!(types_equal("int4", "INTEGER"));
        assert!(types_equal("int8", "BigInt"));
        assert!(types_equal("float8", "Double Precision"));
        assert!(!types_equal("integer", "bigint"));
    }

    #[test]
    fn boolean_defaults_collapse() {
        assert!(defaults_equal(Some("1"), Some("TRUE")));
        assert!(defaults_equal(Some("'f'"), Some("false")));
        assert!(!defaults_equal(Some("true"), Some("false")));
    }

    #[test]
    fn null_defaults_match_only_each_other() {
        assert!(defaults_equal(None, None));
        assert!(!defaults_equal(None, Some("null")));
        assert!(defaults_equal(Some("NULL"), Some("null")));
    }
}
