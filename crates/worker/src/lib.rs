// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! The driver-facing worker interface.
//!
//! Grounded on how `Builder` talks to its `WorkerServer` in the original:
//! `resolve`/`buildTrove` dispatch commands and return immediately,
//! `handleRequestIfReady` drains whatever came back since the last poll and
//! folds it into the job. The wire format a real worker pool would use
//! (sockets, a message bus) is out of scope here -- [`LocalWorker`] is an
//! in-process stand-in, driving real threads so the driver loop above it
//! can be exercised without a network.

mod backend;
mod error;
mod local;

pub use backend::{BuildBackend, BuildOutcome, ResolveOutcome};
pub use error::Error;
pub use local::LocalWorker;

use recipe::{Nvf, Requirement};
use trove::{Job, JobId};

/// What the driver sees of a worker pool: dispatch a resolve or build for a
/// trove, and periodically drain whatever results have come back.
pub trait WorkerFacade {
    /// Dispatch a resolve request for `trove`. Non-blocking: the result
    /// arrives later through [`Self::handle_request_if_ready`].
    fn resolve(&mut self, job_id: JobId, trove: Nvf, declared: Vec<Requirement>) -> Result<(), Error>;

    /// Dispatch a build request for `trove`, inside the chroot at
    /// `chroot_root`.
    fn build(&mut self, job_id: JobId, trove: Nvf, chroot_root: std::path::PathBuf) -> Result<(), Error>;

    /// Apply at most one outstanding result to `job`, returning whether one
    /// was applied. The driver loop calls this unconditionally on every
    /// tick, as the non-blocking drain of inbound worker events ahead of
    /// deciding what to dispatch next.
    fn handle_request_if_ready(&mut self, job: &mut Job) -> bool;

    /// Whether any results are waiting to be drained.
    fn has_results(&self) -> bool;

    /// Abort every outstanding resolve/build dispatch. Called on job
    /// failure or shutdown, mirroring `WorkerServer.stopAllCommands`.
    fn stop_all_commands(&mut self);
}
