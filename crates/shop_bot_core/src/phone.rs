//! crates/shop_bot_core/src/phone.rs
//!
//! Contact phone validation. Numbers without a country code are read as Russian ones,
//! which is where the shop operates.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid phone number")]
pub struct InvalidPhone(pub String);

/// A phone number normalised to E.164 (`+79123456789`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[\s\-().]").expect("separator pattern is valid"))
}

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, InvalidPhone> {
        let invalid = || InvalidPhone(raw.trim().to_string());
        let compact = separators().replace_all(raw.trim(), "");
        let (has_plus, digits) = match compact.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, compact.as_ref()),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let national = match (has_plus, digits.len(), digits.as_bytes()[0]) {
            (true, 11, b'7') | (false, 11, b'7') | (false, 11, b'8') => Some(&digits[1..]),
            (false, 10, _) => Some(digits),
            _ => None,
        };

        if let Some(national) = national {
            // Russian geographic and mobile ranges start with 3, 4, 8 or 9.
            return match national.as_bytes()[0] {
                b'3' | b'4' | b'8' | b'9' => Ok(Self(format!("+7{}", national))),
                _ => Err(invalid()),
            };
        }

        if has_plus && digits.starts_with('7') {
            return Err(invalid());
        }
        if has_plus && (8..=15).contains(&digits.len()) && !digits.starts_with('0') {
            return Ok(Self(format!("+{}", digits)));
        }
        Err(invalid())
    }

    pub fn e164(&self) -> &str {
        &self.0
    }

    /// Human-friendly international form, e.g. `+7 912 345-67-89`.
    pub fn international(&self) -> String {
        match self.0.strip_prefix("+7") {
            Some(n) if n.len() == 10 => {
                format!("+7 {} {}-{}-{}", &n[..3], &n[3..6], &n[6..8], &n[8..])
            }
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
