//! Phone number normalization to a canonical dialing form.
//!
//! Remote address books carry phone numbers as free text. Before they are
//! stored, every number is reduced to `+<digits>` (international) or plain
//! digits (national, when no default country code is configured).

use serde::{Deserialize, Serialize};

const MIN_DIGITS: usize = 3;
const MAX_DIGITS: usize = 15;

/// Why a raw phone number was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number contains unsupported character `{0}`")]
    InvalidCharacter(char),
    #[error("phone number has {0} digits, expected {MIN_DIGITS}..={MAX_DIGITS}")]
    InvalidLength(usize),
}

/// Normalizes free-form phone numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNormalizer {
    /// Country calling code without `+`, used to rewrite a leading trunk `0`
    default_country_code: Option<String>,
}

impl PhoneNormalizer {
    #[must_use]
    pub fn new(default_country_code: Option<&str>) -> Self {
        let default_country_code = default_country_code
            .map(|code| code.trim().trim_start_matches('+'))
            .filter(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string);
        Self {
            default_country_code,
        }
    }

    pub fn default_country_code(&self) -> Option<&str> {
        self.default_country_code.as_deref()
    }

    /// Normalize one raw number.
    ///
    /// # Examples
    ///
    /// ```
    /// use rolodex_core::phone::PhoneNormalizer;
    ///
    /// let normalizer = PhoneNormalizer::new(Some("41"));
    /// assert_eq!(normalizer.normalize("044 668 18 00").unwrap(), "+41446681800");
    /// assert_eq!(normalizer.normalize("0041 (44) 668-1800").unwrap(), "+41446681800");
    /// ```
    pub fn normalize(&self, raw: &str) -> Result<String, PhoneError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut international = false;
        let mut digits = String::with_capacity(raw.len());
        for (index, ch) in raw.chars().enumerate() {
            match ch {
                '0'..='9' => digits.push(ch),
                '+' if index == 0 => international = true,
                ' ' | '-' | '.' | '(' | ')' | '/' | '\u{a0}' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        if !international {
            if let Some(rest) = digits.strip_prefix("00") {
                international = true;
                digits = rest.to_string();
            }
        }

        if !international {
            if let Some(code) = &self.default_country_code {
                if let Some(national) = digits.strip_prefix('0') {
                    international = true;
                    digits = format!("{code}{national}");
                }
            }
        }

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength(digits.len()));
        }

        Ok(if international {
            format!("+{digits}")
        } else {
            digits
        })
    }
}

/// Digits of a query, if it looks like a phone number rather than a name.
pub fn phone_query_digits(query: &str) -> Option<String> {
    let query = query.trim();
    let is_dialable = !query.is_empty()
        && query
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')' | '/'));
    if !is_dialable {
        return None;
    }

    let digits: String = query.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.strip_prefix("00").map_or(digits.clone(), str::to_string);
    (digits.len() >= MIN_DIGITS).then_some(digits)
}
