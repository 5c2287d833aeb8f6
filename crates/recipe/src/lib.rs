// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! Recipe identity: the `(name, version, flavor)` triple that uniquely
//! identifies a build input, plus the bits of a loaded recipe the build
//! driver needs (declared build-requirements, classification flags).
//!
//! Parsing an actual recipe file is the package client's job; this crate
//! only models the data the driver operates on once a recipe is loaded.

mod classification;
mod flavor;
mod id;
mod name;
mod requirement;
mod version;

pub use classification::Classification;
pub use flavor::Flavor;
pub use id::Nvf;
pub use name::Name;
pub use requirement::Requirement;
pub use version::Version;

use std::path::PathBuf;

/// A recipe as loaded by the package client, before any build-requirement
/// resolution has happened.
#[derive(Debug, Clone)]
pub struct RecipeSpec {
    pub id: Nvf,
    /// Location of the recipe source on disk (diagnostic only; the core
    /// never parses it).
    pub source_path: PathBuf,
    /// Build-requirements as declared in the recipe, unresolved.
    pub declared_build_requirements: Vec<Requirement>,
    pub classification: Classification,
}

impl RecipeSpec {
    pub fn new(id: Nvf, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source_path: source_path.into(),
            declared_build_requirements: Vec::new(),
            classification: Classification::default(),
        }
    }

    pub fn with_build_requirements(mut self, reqs: impl IntoIterator<Item = Requirement>) -> Self {
        self.declared_build_requirements = reqs.into_iter().collect();
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }
}
