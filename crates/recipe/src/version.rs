// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use derive_more::Display;

/// A totally-ordered revision on some branch/label.
///
/// Ordering is `(upstream, release)` lexicographic-then-numeric, which is
/// enough for the driver's purposes (it never needs to compare across
/// branches/labels, only to pick "first match wins" during prebuilt lookup
/// and to sort for deterministic tie-breaking).
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{upstream}-{release}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub upstream: String,
    pub release: u32,
}

impl Version {
    pub fn new(upstream: impl Into<String>, release: u32) -> Self {
        Self {
            upstream: upstream.into(),
            release,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_upstream_then_release() {
        let a = Version::new("1.0", 1);
        let b = Version::new("1.0", 2);
        let c = Version::new("1.1", 1);

        assert!(a < b);
        assert!(b < c);
    }
}
