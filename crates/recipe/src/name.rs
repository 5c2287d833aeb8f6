// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use derive_more::{Debug, Display};

/// Textual package name, e.g. `glibc` or `group-core`.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("{_0:?}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Component packages carry a `:` in their name (e.g. `glibc:devel`);
    /// the prebuilt-reuse logic in [`crate`] treats the part before the
    /// colon as the "main" binary.
    pub fn is_component(&self) -> bool {
        self.0.contains(':')
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
