// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::fmt;

use crate::Nvf;

/// A build-requirement, either as declared in the recipe (a textual spec,
/// e.g. `pkgconfig(zlib)`) or as resolved to a concrete trove by the
/// package client / an intra-job build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Requirement {
    Unresolved(String),
    Resolved(Nvf),
}

impl Requirement {
    pub fn unresolved(spec: impl Into<String>) -> Self {
        Self::Unresolved(spec.into())
    }

    /// The recipe name this requirement would be satisfied by, if it
    /// resolves to an intra-job output. Used by the dependency handler to
    /// match a pending requirement against another recipe's binaries.
    pub fn matches(&self, produced: &Nvf) -> bool {
        match self {
            Requirement::Resolved(nvf) => nvf == produced,
            Requirement::Unresolved(spec) => spec == produced.name.as_str(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Unresolved(spec) => write!(f, "{spec}"),
            Requirement::Resolved(nvf) => write!(f, "{nvf}"),
        }
    }
}
