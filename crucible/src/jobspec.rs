// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! The `(jobId, [recipeSpec], buildConfig, jobContext)` shape from §6,
//! expressed as a YAML file the `build` subcommand reads. Real recipe
//! loading and repository queries are delegated to `packageclient`'s
//! traits; this is the on-disk shape a CLI invocation needs in the
//! absence of a live package client, the way `boulder build <recipe.yml>`
//! takes its recipe from a file rather than a running service.

use std::path::Path;

use fs_err as fs;
use recipe::{Classification, Flavor, Nvf, Requirement, Version};

#[derive(Debug, serde::Deserialize)]
pub struct JobSpec {
    pub job_id: u64,
    pub recipes: Vec<RecipeSpec>,
    /// Prior jobs' built troves, consulted for prebuilt reuse (§4.1 step 4).
    #[serde(default)]
    pub job_context: Vec<PriorJob>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RecipeSpec {
    pub name: String,
    pub version: String,
    pub release: u32,
    #[serde(default)]
    pub flavor: Vec<String>,
    #[serde(default)]
    pub build_requirements: Vec<String>,
    /// Names of other recipes in this job whose binaries this one requires.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub classification: ClassificationSpec,
}

impl RecipeSpec {
    pub fn id(&self) -> Nvf {
        Nvf::new(
            self.name.as_str(),
            Version::new(self.version.as_str(), self.release),
            Flavor::with(self.flavor.clone()),
        )
    }

    pub fn requirements(&self) -> Vec<Requirement> {
        self.build_requirements.iter().map(|spec| Requirement::unresolved(spec.clone())).collect()
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ClassificationSpec {
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_redirect: bool,
    #[serde(default)]
    pub is_fileset: bool,
    #[serde(default)]
    pub is_delayed: bool,
}

impl From<ClassificationSpec> for Classification {
    fn from(spec: ClassificationSpec) -> Self {
        Classification {
            is_group: spec.is_group,
            is_redirect: spec.is_redirect,
            is_fileset: spec.is_fileset,
            is_delayed: spec.is_delayed,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct PriorJob {
    pub recipes: Vec<PriorRecipe>,
}

#[derive(Debug, serde::Deserialize)]
pub struct PriorRecipe {
    pub name: String,
    pub version: String,
    pub release: u32,
    #[serde(default)]
    pub flavor: Vec<String>,
    pub build_requirements: Vec<String>,
    pub binaries: Vec<String>,
}

impl PriorRecipe {
    pub fn id(&self) -> Nvf {
        Nvf::new(
            self.name.as_str(),
            Version::new(self.version.as_str(), self.release),
            Flavor::with(self.flavor.clone()),
        )
    }
}

pub fn load(path: &Path) -> Result<JobSpec, Error> {
    let bytes = fs::read(path).map_err(|source| Error::Io { path: path.to_owned(), source })?;
    serde_yaml::from_slice(&bytes).map_err(Error::Yaml)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io { path: std::path::PathBuf, source: std::io::Error },
    #[error("parse job spec")]
    Yaml(#[source] serde_yaml::Error),
}
