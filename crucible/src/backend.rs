// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! The only [`worker::BuildBackend`] this crate ships: it wires a real
//! chroot lifecycle (via [`chrootfactory`]) around a payload that merely
//! proves the root came up and tears back down again. Actually compiling a
//! recipe inside that root is the package client's job and out of scope
//! here; this backend exists so the driver loop can be exercised against a
//! real namespace instead of a fake one.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use chrootfactory::ChrootFactory;
use recipe::{Nvf, Requirement};
use worker::{BuildBackend, BuildOutcome, ResolveOutcome};

const READY_MARKER: &str = "crucible-ready";

pub struct ChrootBackend {
    factory: Mutex<ChrootFactory>,
    networking: bool,
}

impl ChrootBackend {
    pub fn new(chroot_base: impl Into<PathBuf>, networking: bool) -> Self {
        Self {
            factory: Mutex::new(ChrootFactory::new(chroot_base)),
            networking,
        }
    }
}

impl BuildBackend for ChrootBackend {
    /// Requirement resolution against the package client's recipe metadata
    /// is out of scope; every declared requirement is treated as already
    /// satisfied so the dependency handler can proceed to the build phase.
    fn resolve(&self, _trove: &Nvf, declared: &[Requirement]) -> ResolveOutcome {
        ResolveOutcome::Resolved(declared.to_vec())
    }

    fn build(&self, trove: &Nvf, _chroot_root: &PathBuf) -> BuildOutcome {
        let name = chroot_name(trove);

        let mut factory = match self.factory.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let spec = match factory.create_root(&name) {
            Ok(spec) => spec.hostname(&name).networking(self.networking),
            Err(error) => return BuildOutcome::Failed(error.to_string()),
        };

        let handle = match factory.start(spec, READY_MARKER, chrootfactory::READY_TIMEOUT, signal_ready) {
            Ok(handle) => handle,
            Err(error) => return BuildOutcome::Failed(error.to_string()),
        };

        if let Err(error) = factory.stop(handle) {
            return BuildOutcome::Failed(error.to_string());
        }

        BuildOutcome::Built(vec![trove.clone()])
    }
}

fn signal_ready() -> Result<(), std::io::Error> {
    std::fs::write(format!("/{READY_MARKER}"), b"")?;
    // Sleep briefly so the host has a chance to observe the marker before
    // the namespace tears down; the worker calls `stop` right after start
    // returns, which would otherwise race the container's own exit.
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}

fn chroot_name(trove: &Nvf) -> String {
    format!("{}-{}", trove.name, trove.version)
}
