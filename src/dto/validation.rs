//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::ALLOWED_TOURNAMENT_SIZES;

/// Validates that a username is 3 to 20 characters of ASCII letters, digits,
/// underscores or hyphens.
///
/// # Examples
///
/// ```ignore
/// validate_username("pixel_witch") // Ok
/// validate_username("ab")          // Err - too short
/// validate_username("not a name")  // Err - space
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if !(3..=20).contains(&length) {
        let mut err = ValidationError::new("username_length");
        err.message =
            Some(format!("Username must be 3 to 20 characters (got {length})").into());
        return Err(err);
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username may only contain letters, digits, underscores and hyphens".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a requested bracket size is one of the supported powers of
/// two.
pub fn validate_tournament_size(size: u32) -> Result<(), ValidationError> {
    if ALLOWED_TOURNAMENT_SIZES.contains(&size) {
        return Ok(());
    }

    let mut err = ValidationError::new("tournament_size");
    err.message = Some(
        format!("Tournament size must be one of {ALLOWED_TOURNAMENT_SIZES:?} (got {size})").into(),
    );
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("pixel_witch").is_ok());
        assert!(validate_username("Bot-17").is_ok());
        assert!(validate_username("a2345678901234567890").is_ok());
    }

    #[test]
    fn test_validate_username_invalid_length() {
        assert!(validate_username("ab").is_err()); // too short
        assert!(validate_username("a23456789012345678901").is_err()); // too long
        assert!(validate_username("").is_err()); // empty
    }

    #[test]
    fn test_validate_username_invalid_format() {
        assert!(validate_username("not a name").is_err()); // space
        assert!(validate_username("émile_42").is_err()); // non-ascii
        assert!(validate_username("who?!").is_err()); // punctuation
    }

    #[test]
    fn test_validate_tournament_size() {
        for size in ALLOWED_TOURNAMENT_SIZES {
            assert!(validate_tournament_size(size).is_ok());
        }
        assert!(validate_tournament_size(0).is_err());
        assert!(validate_tournament_size(3).is_err());
        assert!(validate_tournament_size(64).is_err());
    }
}
