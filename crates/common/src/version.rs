use serde::{Deserialize, Serialize};

/// Row version used for optimistic concurrency control.
///
/// A freshly inserted record is at version 1. Every accepted update must name
/// the version it was derived from; the store rejects the write if the stored
/// version moved on in the meantime and otherwise stores `version.next()`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a record that has not been stored yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version a record has right after its insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_follows_initial() {
        assert_eq!(Version::initial().next(), Version::first());
        assert!(Version::first() > Version::initial());
    }

    #[test]
    fn next_increments_by_one() {
        assert_eq!(Version::new(41).next().as_i64(), 42);
    }
}
