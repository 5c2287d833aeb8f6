// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use recipe::Nvf;

use crate::State;

/// An identifier pairing a job with one of its troves; events and
/// transitions are always scoped to this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

/// Events published whenever a [`crate::BuildTrove`] changes. Every
/// state-change publishes [`Event::StateUpdated`] *unless* it's one of the
/// five states that already have a specific variant below, to avoid
/// double-notifying subscribers (persistence, the status bus).
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Event {
    StateUpdated {
        job_id: JobId,
        trove: Nvf,
        state: State,
        status: String,
    },
    Resolving {
        job_id: JobId,
        trove: Nvf,
        chroot_host: String,
    },
    Resolved {
        job_id: JobId,
        trove: Nvf,
    },
    PreparingChroot {
        job_id: JobId,
        trove: Nvf,
        chroot_host: String,
        chroot_path: String,
    },
    Building {
        job_id: JobId,
        trove: Nvf,
        log_path: String,
        pid: u32,
    },
    Built {
        job_id: JobId,
        trove: Nvf,
        binaries: Vec<Nvf>,
    },
    Failed {
        job_id: JobId,
        trove: Nvf,
        reason: String,
    },
    LogUpdated {
        job_id: JobId,
        trove: Nvf,
        text: String,
    },
}

impl Event {
    pub fn trove(&self) -> &Nvf {
        match self {
            Event::StateUpdated { trove, .. }
            | Event::Resolving { trove, .. }
            | Event::Resolved { trove, .. }
            | Event::PreparingChroot { trove, .. }
            | Event::Building { trove, .. }
            | Event::Built { trove, .. }
            | Event::Failed { trove, .. }
            | Event::LogUpdated { trove, .. } => trove,
        }
    }
}
