//! Process-wide overrides for configured values.
//!
//! Operators can override selected settings through environment variables
//! without touching the configuration file. An override that is unset, empty
//! or unparsable leaves the configured value in place.

use std::{fmt::Display, str::FromStr};

/// Resolve `key` from the environment, falling back to `configured`.
pub fn system_value<T>(key: &str, configured: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    resolve(key, std::env::var(key).ok().as_deref(), configured)
}

fn resolve<T>(key: &str, raw: Option<&str>, configured: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match raw.map(str::trim) {
        None | Some("") => configured,
        Some(value) => value.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value, error = %e, "Ignoring unparsable override");
            configured
        }),
    }
}
