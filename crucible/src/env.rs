// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use crate::settings::Settings;

/// Resolved runtime locations and merged config, handed to every
/// subcommand. Mirrors `boulder::Env`'s role: CLI overrides win over
/// `dirs`-derived defaults, which win over compiled-in fallbacks.
#[derive(Debug, Clone)]
pub struct Env {
    pub cache_dir: PathBuf,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl Env {
    pub fn new(
        cache_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, Error> {
        let cache_dir = cache_dir
            .or_else(|| dirs::cache_dir().map(|d| d.join("crucible")))
            .ok_or(Error::NoHome)?;
        let config_dir = config_dir
            .or_else(|| dirs::config_dir().map(|d| d.join("crucible")))
            .ok_or(Error::NoHome)?;
        let data_dir = data_dir
            .or_else(|| dirs::data_dir().map(|d| d.join("crucible")))
            .ok_or(Error::NoHome)?;

        let manager = config::Manager::custom(&config_dir);
        let settings = manager.load::<Settings>().into_iter().next().unwrap_or_default();

        Ok(Self {
            cache_dir,
            config_dir,
            data_dir,
            settings,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not determine home directory")]
    NoHome,
}
