// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::fmt;

use crate::{Flavor, Name, Version};

/// The `(name, version, flavor)` triple. All three together uniquely
/// identify a build input, and the same shape identifies the binaries it
/// produces (see GLOSSARY: "Trove").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Nvf {
    pub name: Name,
    pub version: Version,
    pub flavor: Flavor,
}

impl Nvf {
    pub fn new(name: impl Into<Name>, version: Version, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            version,
            flavor,
        }
    }
}

impl fmt::Display for Nvf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}{}", self.name, self.version, self.flavor)
    }
}
