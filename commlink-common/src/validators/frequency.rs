//! Frequency (channel code) validation
//!
//! A frequency is the shared numeric code two or more clients must enter to
//! become eligible roster members of each other. It is always exactly six
//! ASCII digits; there is no ownership or reservation.

use crate::FREQUENCY_LENGTH;

/// Validation error for frequency codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrequencyError {
    /// Frequency is empty
    Empty,
    /// Frequency is not exactly [`FREQUENCY_LENGTH`] characters
    WrongLength,
    /// Frequency contains non-digit characters
    InvalidCharacters,
}

/// Validate a frequency code
///
/// Checks:
/// - Not empty
/// - Exactly six characters
/// - ASCII digits only
///
/// # Errors
///
/// Returns a `FrequencyError` variant describing the validation failure.
pub fn validate_frequency(frequency: &str) -> Result<(), FrequencyError> {
    if frequency.is_empty() {
        return Err(FrequencyError::Empty);
    }

    if frequency.chars().count() != FREQUENCY_LENGTH {
        return Err(FrequencyError::WrongLength);
    }

    if !frequency.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(FrequencyError::InvalidCharacters);
    }

    Ok(())
}

/// Generate a random six-digit frequency code
///
/// Used by the settings panel's "new frequency" action. The first digit is
/// never zero, so the code always displays at full width.
pub fn random_frequency() -> String {
    use rand::RngExt;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_frequencies() {
        assert!(validate_frequency("144200").is_ok());
        assert!(validate_frequency("000000").is_ok());
        assert!(validate_frequency("999999").is_ok());
        assert!(validate_frequency("444222").is_ok());
    }

    #[test]
    fn test_empty() {
        assert_eq!(validate_frequency(""), Err(FrequencyError::Empty));
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(validate_frequency("12345"), Err(FrequencyError::WrongLength));
        assert_eq!(
            validate_frequency("1234567"),
            Err(FrequencyError::WrongLength)
        );
        assert_eq!(validate_frequency("1"), Err(FrequencyError::WrongLength));
    }

    #[test]
    fn test_invalid_characters() {
        assert_eq!(
            validate_frequency("12a456"),
            Err(FrequencyError::InvalidCharacters)
        );
        assert_eq!(
            validate_frequency("144 20"),
            Err(FrequencyError::InvalidCharacters)
        );
        // Non-ASCII digits are rejected even though they satisfy is_numeric
        assert_eq!(
            validate_frequency("１４４２００"),
            Err(FrequencyError::InvalidCharacters)
        );
    }

    #[test]
    fn test_random_frequency_is_valid() {
        for _ in 0..100 {
            let freq = random_frequency();
            assert!(validate_frequency(&freq).is_ok(), "bad code: {}", freq);
            assert_ne!(freq.as_bytes()[0], b'0');
        }
    }
}
