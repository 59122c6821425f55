//! Credential validation

use common::validation::is_email;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_USERNAME_LENGTH: usize = 254;

/// Usernames are email addresses
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at most {} characters long",
            MAX_USERNAME_LENGTH
        ));
    }

    if !is_email(username) {
        return Err("Username must be a valid email address".to_string());
    }

    Ok(())
}

/// Passwords need upper and lower case letters, a digit and a symbol
pub fn validate_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }

    let missing = [
        (password.chars().any(|c| c.is_uppercase()), "an uppercase letter"),
        (password.chars().any(|c| c.is_lowercase()), "a lowercase letter"),
        (password.chars().any(|c| c.is_ascii_digit()), "a digit"),
        (
            password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            "a special character",
        ),
    ]
    .into_iter()
    .find(|(present, _)| !present);

    match missing {
        Some((_, requirement)) => Err(format!("Password must contain {}", requirement)),
        None => Ok(()),
    }
}

/// Normalised form used for storage and lookups
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
