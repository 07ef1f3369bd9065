//! Type-safe identifiers.
//!
//! Newtype wrappers keep correlation ids from being confused with command
//! names or cache keys.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Correlation token pairing an outbound streaming request with its reply.
///
/// Locally generated ids are UUID v4 strings. Inbound frames may carry any
/// string, so the inner value is not required to be a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh random request id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
