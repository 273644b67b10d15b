//! Typed environment variable lookups
//!
//! Unset variables fall back to the supplied default. A variable that is set
//! but does not parse is an error rather than a silent fallback.

use std::str::FromStr;

use crate::error::{GutenloadError, Result};

/// Read `key` and parse it, or return `default` when the variable is unset
pub fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var_opt(key)? {
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

/// Read `key` and parse it when present
pub fn var_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = match std::env::var(key) {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|e| GutenloadError::InvalidEnv {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

/// Read a string variable, falling back to `default`
pub fn string_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
