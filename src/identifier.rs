//! Shared validation for names that double as file names.

/// Maximum identifier length in characters.
pub(crate) const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Reason an identifier was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentifierViolation {
    Empty,
    TooLong,
    InvalidCharacters,
}

/// Trims and lowercases `value`, then checks it against `[a-z0-9_-]`.
///
/// The first character must be alphanumeric so that identifiers never
/// resolve to hidden or relative paths.
pub(crate) fn normalize_identifier(value: &str) -> Result<String, (IdentifierViolation, String)> {
    let normalized = value.trim().to_ascii_lowercase();

    if normalized.is_empty() {
        return Err((IdentifierViolation::Empty, normalized));
    }

    let starts_alphanumeric = normalized
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphanumeric());
    let is_valid = starts_alphanumeric
        && normalized.chars().all(|character| {
            character.is_ascii_lowercase()
                || character.is_ascii_digit()
                || character == '_'
                || character == '-'
        });
    if !is_valid {
        return Err((IdentifierViolation::InvalidCharacters, normalized));
    }

    if normalized.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err((IdentifierViolation::TooLong, normalized));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::{IdentifierViolation, normalize_identifier};
    use rstest::rstest;

    #[rstest]
    #[case("cat", "cat")]
    #[case("  Claude-Code ", "claude-code")]
    #[case("tool_2", "tool_2")]
    fn accepts_and_normalizes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_identifier(raw).expect("valid"), expected);
    }

    #[rstest]
    #[case("", IdentifierViolation::Empty)]
    #[case("   ", IdentifierViolation::Empty)]
    #[case("-leading", IdentifierViolation::InvalidCharacters)]
    #[case("../escape", IdentifierViolation::InvalidCharacters)]
    #[case("has space", IdentifierViolation::InvalidCharacters)]
    fn rejects_invalid(#[case] raw: &str, #[case] expected: IdentifierViolation) {
        let (violation, _) = normalize_identifier(raw).expect_err("invalid");
        assert_eq!(violation, expected);
    }

    #[rstest]
    fn rejects_overlong() {
        let raw = "a".repeat(65);
        let (violation, _) = normalize_identifier(&raw).expect_err("too long");
        assert_eq!(violation, IdentifierViolation::TooLong);
    }
}
