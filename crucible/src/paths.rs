// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use recipe::Nvf;

/// Per-trove host/guest path mapping, grounded on `boulder::paths::Paths`:
/// each trove under build gets its own root, artefact, and log directory
/// under the configured chroot base, addressed by its `(name, version,
/// flavor)` identity.
#[derive(Debug, Clone)]
pub struct Paths {
    id: String,
    chroot_base: PathBuf,
    log_dir: PathBuf,
}

impl Paths {
    pub fn new(trove: &Nvf, chroot_base: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: trove_dir_name(trove),
            chroot_base: chroot_base.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.chroot_base.join(&self.id)
    }

    pub fn log_path(&self, job_id: u64) -> PathBuf {
        self.log_dir.join(format!("{job_id}")).join(format!("{}.log", self.id))
    }

    pub fn guest_host_path(&self, guest: &str) -> PathBuf {
        let relative = guest.strip_prefix('/').unwrap_or(guest);
        self.root().join(relative)
    }
}

fn trove_dir_name(trove: &Nvf) -> String {
    format!("{}-{}", trove.name, trove.version)
}
