//! Search query classification.
//!
//! A query is either phone-like (dialing characters only, at least three
//! digits) and matched against normalized phone digits, or free text matched
//! against names and organization. The SQL lives in the repository layer.

use crate::phone::phone_query_digits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Blank input; behaves like a plain listing
    All,
    /// Digits to look for inside stored phone numbers
    Phone(String),
    /// Trimmed free text
    Text(String),
}

impl SearchQuery {
    pub fn parse(query: &str) -> Self {
        let query = query.trim();
        if query.is_empty() {
            return Self::All;
        }
        phone_query_digits(query).map_or_else(|| Self::Text(query.to_string()), Self::Phone)
    }

    /// `LIKE` pattern with user wildcards escaped (use `ESCAPE '\'`)
    pub fn like_pattern(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::Phone(digits) => Some(format!("%{digits}%")),
            Self::Text(text) => Some(format!("%{}%", escape_like(text))),
        }
    }
}

/// Escape `LIKE` wildcards so user input matches literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
