//! Field coercion helpers for raw CSV rows.
//!
//! Transformation never fails: a value that cannot be coerced degrades to
//! "field absent" so that validation, not coercion, decides whether a row is
//! acceptable. Entity-specific transforms (see [`crate::entity`]) compose
//! these helpers.

/// Delimiter for multi-valued fields, in both CSV and stored representation.
pub const LIST_DELIMITER: char = '|';

/// Split a delimiter-joined string into trimmed, non-empty tokens.
///
/// # Example
/// ```ignore
/// assert_eq!(split_list("a| b |"), vec!["a", "b"]);
/// ```
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_DELIMITER)
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Rejoin tokens into the wire format produced by [`split_list`].
pub fn join_list(tokens: &[String]) -> String {
    tokens.join(&LIST_DELIMITER.to_string())
}

/// Coerce a numeric string to an integer, or `None` when it does not parse.
///
/// Dropping rather than rejecting is deliberate: a non-numeric score in the
/// CSV leaves the field absent and the row otherwise importable.
pub fn coerce_integer(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Trim a string value, returning `None` when nothing remains.
pub fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_tokens() {
        assert_eq!(split_list("alpha| beta |gamma"), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_split_list_discards_empty_tokens() {
        assert_eq!(split_list("a||b|  |"), vec!["a", "b"]);
    }

    #[test]
    fn test_split_list_empty_input() {
        assert!(split_list("").is_empty());
        assert!(split_list("   ").is_empty());
    }

    #[test]
    fn test_round_trip() {
        let tokens = split_list("alpha|beta");
        assert_eq!(join_list(&tokens), "alpha|beta");
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer("42"), Some(42));
        assert_eq!(coerce_integer(" 7 "), Some(7));
        assert_eq!(coerce_integer("oops"), None);
        assert_eq!(coerce_integer("4.5"), None);
        assert_eq!(coerce_integer(""), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  x "), Some("x"));
        assert_eq!(non_empty("   "), None);
    }
}
