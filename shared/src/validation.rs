//! Input validation functions
//!
//! Each function takes the raw (optional) field from a request body and
//! returns the normalized value, or the detail message of the failure.
//! Messages follow the `"<field> <problem>"` convention; the backend prefixes
//! them with `"Validation Error: "`.

use validator::ValidateEmail;

/// Maximum accepted length for usernames, e-mails and resource names
const MAX_FIELD_LEN: usize = 255;

fn required(field: &str, value: Option<String>) -> Result<String, String> {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        return Err(format!("{} is a required field", field));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(format!(
            "{} must be at most {} characters",
            field, MAX_FIELD_LEN
        ));
    }
    Ok(value)
}

/// Validate a username: required, trimmed, case preserved
pub fn validate_username(username: Option<String>) -> Result<String, String> {
    required("username", username)
}

/// Validate an e-mail address: required, trimmed, lowercased, well-formed
pub fn validate_email(email: Option<String>) -> Result<String, String> {
    let email = required("email", email)?.to_lowercase();
    if !email.validate_email() {
        return Err("email must be a valid email".to_string());
    }
    Ok(email)
}

/// Validate a password against the configured minimum length.
///
/// The length rule applies to the trimmed value; the password itself is
/// returned unmodified.
pub fn validate_password(password: Option<String>, min_length: usize) -> Result<String, String> {
    let password = password.unwrap_or_default();
    let effective = password.trim().chars().count();
    if effective == 0 {
        return Err("password is a required field".to_string());
    }
    if effective < min_length {
        return Err(format!(
            "password must be at least {} characters",
            min_length
        ));
    }
    Ok(password)
}

/// Validate the name of a dashboard or source
pub fn validate_name(name: Option<String>) -> Result<String, String> {
    required("name", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::{SafeEmail, Username};
    use fake::Fake;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, "username is a required field")]
    #[case(Some(""), "username is a required field")]
    #[case(Some("   "), "username is a required field")]
    fn test_username_required(#[case] input: Option<&str>, #[case] expected: &str) {
        let err = validate_username(input.map(str::to_string)).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn test_username_is_trimmed_but_keeps_case() {
        let name = validate_username(Some("  Alice ".to_string())).unwrap();
        assert_eq!(name, "Alice");
    }

    #[rstest]
    #[case("a@x.com", "a@x.com")]
    #[case("  Alice@Example.COM ", "alice@example.com")]
    fn test_email_normalized(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_email(Some(input.to_string())).unwrap(), expected);
    }

    #[rstest]
    #[case("not-an-email")]
    #[case("@x.com")]
    #[case("alice@")]
    fn test_email_rejects_malformed(#[case] input: &str) {
        let err = validate_email(Some(input.to_string())).unwrap_err();
        assert_eq!(err, "email must be a valid email");
    }

    #[rstest]
    #[case(None, 5, "password is a required field")]
    #[case(Some("    "), 5, "password is a required field")]
    #[case(Some("abc"), 5, "password must be at least 5 characters")]
    #[case(Some("  abcd  "), 5, "password must be at least 5 characters")]
    fn test_password_rules(
        #[case] input: Option<&str>,
        #[case] min: usize,
        #[case] expected: &str,
    ) {
        let err = validate_password(input.map(str::to_string), min).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn test_password_returned_unmodified() {
        let password = validate_password(Some(" secret1 ".to_string()), 5).unwrap();
        assert_eq!(password, " secret1 ");
    }

    #[test]
    fn test_generated_identities_validate() {
        for _ in 0..20 {
            let username: String = Username().fake();
            let email: String = SafeEmail().fake();
            assert!(validate_username(Some(username)).is_ok());
            assert!(validate_email(Some(email)).is_ok());
        }
    }

    proptest! {
        #[test]
        fn prop_password_at_min_length_accepted(password in "[a-zA-Z0-9]{5,64}") {
            prop_assert!(validate_password(Some(password), 5).is_ok());
        }

        #[test]
        fn prop_overlong_names_rejected(name in "[a-z]{256,300}") {
            prop_assert!(validate_name(Some(name)).is_err());
        }
    }
}
