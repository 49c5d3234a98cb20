//! Domain newtypes
//!
//! Strongly-typed wrappers for operation identifiers and priorities.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// OperationId
// ============================================================================

/// Unique identifier of a submitted sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Create a new random OperationId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an OperationId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Scheduling priority of an operation, 0 (lowest) to 10 (highest)
///
/// Out-of-range inputs are clamped rather than rejected; a caller asking for
/// priority 50 gets the highest priority available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority
    pub const MIN: Priority = Priority(0);
    /// Highest priority
    pub const MAX: Priority = Priority(10);

    /// Creates a priority, clamping into `0..=10`
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX.0))
    }

    /// Returns the numeric value
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(5)
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
