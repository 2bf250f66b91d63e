//! Dot-separated subject patterns
//!
//! `*` matches exactly one token and `>` as the final token matches one or more
//! remaining tokens, so `market.*` matches `market.candles` but not
//! `market.candles.dlq`, while `market.>` matches both.

use crate::BusError;

pub fn validate(subject: &str) -> Result<(), BusError> {
    if subject.is_empty() || subject.split('.').any(str::is_empty) {
        return Err(BusError::InvalidSubject(subject.to_string()));
    }
    let tokens: Vec<&str> = subject.split('.').collect();
    if let Some(pos) = tokens.iter().position(|t| *t == ">") {
        if pos != tokens.len() - 1 {
            return Err(BusError::InvalidSubject(subject.to_string()));
        }
    }
    Ok(())
}

/// True when a concrete `subject` matches `pattern`
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
