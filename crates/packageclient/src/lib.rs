// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! Interfaces the driver needs from the package-management client and the
//! repository it talks to. Both are external collaborators out of scope
//! for this workspace: the repository protocol, changeset cache, and the
//! client's own recipe-compilation logic live elsewhere. Only the shape of
//! the calls the driver makes against them is specified here.

use std::path::PathBuf;

use recipe::{Nvf, Requirement, Version};

/// Loads recipe sources and declared build requirements. Grounded on the
/// `conary` client calls `Builder.initializeBuild` makes before a job's
/// troves are ever touched by the dependency handler.
pub trait RecipeLoader {
    fn load(&self, name: &str, version: Option<&Version>) -> Result<LoadedRecipe, Error>;
}

pub struct LoadedRecipe {
    pub id: Nvf,
    pub source_path: PathBuf,
    pub declared_build_requirements: Vec<Requirement>,
    pub classification: recipe::Classification,
}

/// Queries the binary repository for troves that could satisfy a
/// requirement without rebuilding, and for prior job contexts a new job
/// can reuse prebuilt output from. Grounded on `_matchTrovesToJobContext`'s
/// use of the conary repository client.
pub trait RepositoryClient {
    /// All binary troves currently satisfying `requirement`, newest first.
    fn find(&self, requirement: &Requirement) -> Result<Vec<Nvf>, Error>;

    /// The binaries a previous job produced for `recipe`, if any job context
    /// is being reused for this build.
    fn prebuilt(&self, recipe: &Nvf) -> Result<Option<Vec<Nvf>>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("recipe not found: {0}")]
    NotFound(String),
    #[error("repository request failed: {0}")]
    Request(String),
}
