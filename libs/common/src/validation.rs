//! Field formats shared by both services

use regex::Regex;
use std::sync::OnceLock;

/// Whether `value` looks like an email address
pub fn is_email(value: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });
    regex.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_addresses() {
        assert!(is_email("nurse.jane@clinic.example.com"));
        assert!(is_email("a+tag@b.co"));
        assert!(!is_email("jane"));
        assert!(!is_email("jane@clinic"));
        assert!(!is_email("jane doe@clinic.com"));
        assert!(!is_email(""));
    }
}
