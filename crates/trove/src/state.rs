// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

/// The finite states a [`crate::BuildTrove`] transits during a job.
///
/// See the module-level diagram in `crate::trove` for the legal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum State {
    Init,
    Loaded,
    Resolving,
    Resolved,
    Preparing,
    Building,
    Built,
    Failed,
    Unbuildable,
    Prebuilt,
    Waiting,
    Queued,
}

impl State {
    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Built | State::Failed | State::Unbuildable)
    }

    /// States in which the trove has been handed off to a worker and must
    /// not be mutated except via an inbound event.
    pub const fn implies_disowned(self) -> bool {
        matches!(self, State::Resolving | State::Preparing | State::Building | State::Queued)
    }
}
