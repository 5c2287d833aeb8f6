// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;

use fs_err as fs;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup, dup2};

/// Redirects the process's stdout (fd 1) to a job-specific log file for the
/// duration of a build, per §4.1 step 2: build-time output from the
/// package client isn't otherwise controllable and must be captured.
/// Restores the original fd 1 and closes the log file on drop.
pub struct CapturedStdout {
    saved_fd: RawFd,
    log_fd: RawFd,
}

impl CapturedStdout {
    pub fn redirect_to(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_owned(),
                source,
            })?;
        }

        let saved_fd = dup(std::io::stdout().as_raw_fd()).map_err(Error::Nix)?;

        let log_fd = open(path, OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND, Mode::from_bits_truncate(0o644))
            .map_err(Error::Nix)?;

        dup2(log_fd, std::io::stdout().as_raw_fd()).map_err(Error::Nix)?;

        Ok(Self { saved_fd, log_fd })
    }
}

impl Drop for CapturedStdout {
    fn drop(&mut self) {
        let _ = dup2(self.saved_fd, std::io::stdout().as_raw_fd());
        let _ = close(self.saved_fd);
        let _ = close(self.log_fd);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io { path: std::path::PathBuf, source: std::io::Error },
    #[error("nix")]
    Nix(#[source] nix::Error),
}
