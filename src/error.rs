//! Error types for the slabcache library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Recoverable operation failures returned to callers
//!   (allocation pressure, absent keys, oversized items). These never mutate
//!   cache state.
//! - [`ConfigError`]: Returned when cache configuration parameters are
//!   invalid (e.g. zero memory budget, growth factor <= 1.0).
//!
//! Invariant violations (reference-count underflow, double free, unlinking an
//! item from a list it does not belong to) are *not* errors: they indicate
//! corrupted internal state and abort via `assert!`/`panic!` rather than
//! propagate.

use std::fmt;

use crate::item::MAX_KEY_LEN;

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Recoverable failure of a cache operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No free chunk exists in the required slab class, the memory budget is
    /// exhausted, and the eviction scan produced nothing reclaimable.
    OutOfMemory,
    /// Lookup or removal of a key that is not in the index.
    KeyNotFound,
    /// The key exceeds the maximum inline key length.
    KeyTooLong {
        /// Length of the rejected key.
        len: usize,
    },
    /// The item (header + key + value) exceeds the largest chunk class.
    ValueTooLarge {
        /// Total accounted size of the rejected item.
        size: usize,
        /// Chunk size of the largest slab class.
        max: usize,
    },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::OutOfMemory => {
                f.write_str("no free chunk available and the memory budget is exhausted")
            }
            CacheError::KeyNotFound => f.write_str("key not found"),
            CacheError::KeyTooLong { len } => {
                write!(f, "key length {len} exceeds the {MAX_KEY_LEN} byte limit")
            }
            CacheError::ValueTooLarge { size, max } => {
                write!(f, "item of {size} bytes exceeds the largest chunk class ({max} bytes)")
            }
        }
    }
}

impl std::error::Error for CacheError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheConfig::validate`](crate::config::CacheConfig::validate)
/// and by [`Cache::new`](crate::Cache::new). Carries a human-readable
/// description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_error_display_names_the_limit() {
        let err = CacheError::KeyTooLong { len: 300 };
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("255"));
    }

    #[test]
    fn value_too_large_display_names_both_sizes() {
        let err = CacheError::ValueTooLarge { size: 4096, max: 1024 };
        let msg = err.to_string();
        assert!(msg.contains("4096"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn cache_error_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<CacheError>();
    }

    #[test]
    fn config_error_display_shows_message() {
        let err = ConfigError::new("growth_factor must be > 1.0");
        assert_eq!(err.to_string(), "growth_factor must be > 1.0");
        assert_eq!(err.message(), "growth_factor must be > 1.0");
    }

    #[test]
    fn config_error_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }
}
