//! Environment variable utilities
//!
//! Every tunable in thunking can be overridden from the environment
//! (`THUNK_*`). These helpers parse with a default and never fail.
//!
//! ```ignore
//! use thunk_core::env::{env_get, env_get_micros};
//!
//! let capacity: usize = env_get("THUNK_QUEUE_CAPACITY", 1024);
//! let park = env_get_micros("THUNK_IDLE_PARK_US", Duration::from_millis(100));
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Get environment variable parsed as type T, or return default
///
/// Unset and unparsable values both yield the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a duration given in whole microseconds, or return default
#[inline]
pub fn env_get_micros(key: &str, default: Duration) -> Duration {
    env_get_opt::<u64>(key)
        .map(Duration::from_micros)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns its variable names; tests run in parallel.

    #[test]
    fn test_unset_returns_defaults() {
        let key = "__THUNK_TEST_UNSET__";
        assert_eq!(env_get::<usize>(key, 42), 42);
        assert!(env_get_bool(key, true));
        assert_eq!(env_get_opt::<usize>(key), None);
        assert_eq!(env_get_str(key, "hello"), "hello");
        assert_eq!(env_get_micros(key, Duration::from_millis(3)), Duration::from_millis(3));
    }

    #[test]
    fn test_parse_with_whitespace() {
        std::env::set_var("__THUNK_TEST_NUM__", " 123 ");
        assert_eq!(env_get::<usize>("__THUNK_TEST_NUM__", 0), 123);
        std::env::remove_var("__THUNK_TEST_NUM__");
    }

    #[test]
    fn test_invalid_parse_falls_back() {
        std::env::set_var("__THUNK_TEST_BAD__", "not_a_number");
        assert_eq!(env_get::<usize>("__THUNK_TEST_BAD__", 99), 99);
        assert_eq!(
            env_get_micros("__THUNK_TEST_BAD__", Duration::from_micros(5)),
            Duration::from_micros(5)
        );
        std::env::remove_var("__THUNK_TEST_BAD__");
    }

    #[test]
    fn test_micros() {
        std::env::set_var("__THUNK_TEST_US__", "2500");
        assert_eq!(
            env_get_micros("__THUNK_TEST_US__", Duration::ZERO),
            Duration::from_micros(2500)
        );
        std::env::remove_var("__THUNK_TEST_US__");
    }

    #[test]
    fn test_bool_variants() {
        let key = "__THUNK_TEST_BOOL__";
        for yes in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var(key, yes);
            assert!(env_get_bool(key, false), "{} should be true", yes);
        }
        for no in ["0", "false", "garbage"] {
            std::env::set_var(key, no);
            assert!(!env_get_bool(key, true), "{} should be false", no);
        }
        std::env::remove_var(key);
    }
}
