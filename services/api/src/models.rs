//! API models for request and response payloads

pub mod address;
pub mod assignment;
pub mod patient;
pub mod user;
pub mod visit;

/// Implements the `i16` conversions for an enum stored and serialised by code
macro_rules! numeric_code {
    ($name:ident, $label:literal, { $($variant:ident = $code:literal),+ $(,)? }) => {
        impl From<$name> for i16 {
            fn from(value: $name) -> Self {
                value as i16
            }
        }

        impl TryFrom<i16> for $name {
            type Error = String;

            fn try_from(value: i16) -> Result<Self, Self::Error> {
                match value {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("unknown {} {}", $label, other)),
                }
            }
        }
    };
}

pub(crate) use numeric_code;

/// Lenient timestamp parsing for visit times
///
/// Accepts `YYYY-MM-DDTHH:MM[:SS[.fff]]`, the same with a space instead of
/// `T`, or RFC 3339 with an offset (converted to UTC).
pub mod datetime {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, de::Error};

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    pub fn parse(value: &str) -> Result<NaiveDateTime, String> {
        let value = value.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Ok(parsed.naive_utc());
        }

        FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .ok_or_else(|| format!("Invalid date/time '{}', expected YYYY-MM-DDTHH:MM", value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.trim().is_empty() => {
                    super::parse(&raw).map(Some).map_err(D::Error::custom)
                }
                _ => Ok(None),
            }
        }
    }

}

/// Shared field validators
pub mod checks {
    use common::validation::is_email;

    pub fn required(field: &str, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err(format!("{} is required", field))
        } else {
            Ok(())
        }
    }

    pub fn email(value: &str) -> Result<(), String> {
        if is_email(value) {
            Ok(())
        } else {
            Err("Email must be a valid email address".to_string())
        }
    }

    /// Ten to fifteen digits once common separators are stripped
    pub fn phone(value: &str) -> Result<(), String> {
        let mut digits = 0;
        for c in value.chars() {
            match c {
                '0'..='9' => digits += 1,
                ' ' | '-' | '(' | ')' | '.' | '+' => {}
                _ => return Err("Phone may only contain digits and separators".to_string()),
            }
        }
        if (10..=15).contains(&digits) {
            Ok(())
        } else {
            Err("Phone must contain 10 to 15 digits".to_string())
        }
    }

}
