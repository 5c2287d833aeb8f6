// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

/// Policy knobs the original left to `serverCfg`: where chroots and job
/// logs live, and the timeouts the chroot factory and build driver use.
/// Loaded/merged the way every other AerynOS tool loads its config, via
/// [`config::Manager`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    #[serde(default = "default_chroot_dir")]
    pub chroot_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub build_log_dir: PathBuf,
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chroot_dir: default_chroot_dir(),
            build_log_dir: default_log_dir(),
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

impl config::Config for Settings {
    fn domain() -> String {
        "crucible".into()
    }
}

fn default_chroot_dir() -> PathBuf {
    PathBuf::from("/var/cache/crucible/root")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/cache/crucible/logs")
}

/// The driver loop's idle-sleep bound from §4.1: the maximum latency
/// between a worker event arriving and the driver responding when nothing
/// else is runnable.
const fn default_idle_sleep_ms() -> u64 {
    100
}
