// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeSet;
use std::fmt;

/// A set of architecture/option atoms disambiguating multiple simultaneous
/// builds of the same `(name, version)`, e.g. `{x86_64, !emul32}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Flavor(BTreeSet<String>);

impl Flavor {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(atoms: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(atoms.into_iter().map(Into::into).collect())
    }

    pub fn atoms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, "[{}]", self.0.iter().cloned().collect::<Vec<_>>().join(" "))
    }
}
