// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeSet;

use recipe::{Classification, Nvf, Requirement};

use crate::event::JobId;
use crate::{Event, Publisher, State};

/// Whether the driver is free to mutate a [`BuildTrove`] right now, or
/// whether it's currently out with a worker (resolve/build in flight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    Owned,
    Disowned,
}

/// In-memory representation of a recipe undergoing build in a job.
///
/// ```text
/// INIT ──load──► LOADED ──enqueueResolve──► RESOLVING ──event──► RESOLVED
///                  │                                         │
///                  └──prebuiltMatch──► PREBUILT ──► BUILT    └──buildable──► QUEUED
///                                                                │
///                                            event:preparing ◄───┘
///                                            event:building
///                                            event:built  ──► BUILT
///                                            event:failed ──► FAILED
/// at any non-terminal state: event:failed ──► FAILED
///                            sanity-cycle  ──► UNBUILDABLE
/// ```
#[derive(Debug, Clone)]
pub struct BuildTrove {
    pub id: Nvf,
    pub job_id: JobId,
    state: State,
    pub build_requirements: BTreeSet<Requirement>,
    pub cross_requirements: Option<BTreeSet<Requirement>>,
    pub binary_troves: BTreeSet<Nvf>,
    pub failure_reason: Option<String>,
    pub log_path: Option<String>,
    pub chroot_host: Option<String>,
    pub pid: Option<u32>,
    pub classification: Classification,
    ownership: Ownership,
}

impl BuildTrove {
    pub fn new(job_id: JobId, id: Nvf, classification: Classification) -> Self {
        Self {
            id,
            job_id,
            state: State::Init,
            build_requirements: BTreeSet::new(),
            cross_requirements: None,
            binary_troves: BTreeSet::new(),
            failure_reason: None,
            log_path: None,
            chroot_host: None,
            pid: None,
            classification,
            ownership: Ownership::Owned,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.ownership, Ownership::Owned)
    }

    /// Hand the trove off to a worker. Must be called right after the
    /// driver dispatches a resolve or build command for it.
    pub fn disown(&mut self) {
        self.ownership = Ownership::Disowned;
    }

    /// Reclaim mutation rights after an inbound event for this trove.
    pub fn own(&mut self) {
        self.ownership = Ownership::Owned;
    }

    fn set_state(&mut self, state: State, status: impl Into<String>, publisher: &mut Publisher, emit_generic: bool) {
        let status = status.into();
        self.state = state;
        if emit_generic {
            publisher.publish(Event::StateUpdated {
                job_id: self.job_id,
                trove: self.id.clone(),
                state,
                status,
            });
        }
    }

    pub fn load(&mut self, publisher: &mut Publisher) {
        self.set_state(State::Loaded, "Loaded", publisher, true);
    }

    pub fn enqueue_resolve(&mut self, publisher: &mut Publisher) {
        self.set_state(State::Resolving, "Resolving build requirements", publisher, false);
    }

    pub fn resolving(&mut self, chroot_host: impl Into<String>, publisher: &mut Publisher) {
        let chroot_host = chroot_host.into();
        self.chroot_host = Some(chroot_host.clone());
        publisher.publish(Event::Resolving {
            job_id: self.job_id,
            trove: self.id.clone(),
            chroot_host,
        });
    }

    pub fn resolved(&mut self, build_requirements: BTreeSet<Requirement>, publisher: &mut Publisher) {
        self.build_requirements = build_requirements;
        self.state = State::Resolved;
        self.own();
        publisher.publish(Event::Resolved {
            job_id: self.job_id,
            trove: self.id.clone(),
        });
    }

    pub fn queued(&mut self, publisher: &mut Publisher) {
        self.set_state(State::Queued, "Waiting to be assigned to chroot", publisher, false);
    }

    pub fn preparing_chroot(&mut self, chroot_host: impl Into<String>, chroot_path: impl Into<String>, publisher: &mut Publisher) {
        let chroot_host = chroot_host.into();
        let chroot_path = chroot_path.into();
        self.chroot_host = Some(chroot_host.clone());
        publisher.publish(Event::PreparingChroot {
            job_id: self.job_id,
            trove: self.id.clone(),
            chroot_host,
            chroot_path,
        });
    }

    pub fn building(&mut self, log_path: impl Into<String>, pid: u32, publisher: &mut Publisher) {
        let log_path = log_path.into();
        self.state = State::Building;
        self.log_path = Some(log_path.clone());
        self.pid = Some(pid);
        publisher.publish(Event::Building {
            job_id: self.job_id,
            trove: self.id.clone(),
            log_path,
            pid,
        });
    }

    pub fn built(&mut self, binaries: Vec<Nvf>, publisher: &mut Publisher) {
        self.state = State::Built;
        self.binary_troves = binaries.iter().cloned().collect();
        self.own();
        publisher.publish(Event::Built {
            job_id: self.job_id,
            trove: self.id.clone(),
            binaries,
        });
    }

    /// Mark the trove prebuilt from a prior job's context. Short-circuits
    /// straight to `BUILT` at job end without ever touching a worker slot.
    pub fn prebuilt(&mut self, build_requirements: BTreeSet<Requirement>, binaries: Vec<Nvf>) {
        self.build_requirements = build_requirements;
        self.binary_troves = binaries.into_iter().collect();
        self.state = State::Prebuilt;
    }

    /// Promote a `PREBUILT` trove to `BUILT` once it's been folded into the
    /// dependency handler's availability set. No-op on any other state.
    pub fn prebuilt_to_built(&mut self, publisher: &mut Publisher) {
        if self.state != State::Prebuilt {
            return;
        }
        let binaries = self.binary_troves.iter().cloned().collect();
        self.built(binaries, publisher);
    }

    pub fn failed(&mut self, reason: impl Into<String>, publisher: &mut Publisher) {
        let reason = reason.into();
        self.state = State::Failed;
        self.failure_reason = Some(reason.clone());
        self.own();
        publisher.publish(Event::Failed {
            job_id: self.job_id,
            trove: self.id.clone(),
            reason,
        });
    }

    pub fn unbuildable(&mut self, reason: impl Into<String>, publisher: &mut Publisher) {
        let reason = reason.into();
        self.state = State::Unbuildable;
        self.failure_reason = Some(reason.clone());
        publisher.publish(Event::StateUpdated {
            job_id: self.job_id,
            trove: self.id.clone(),
            state: State::Unbuildable,
            status: reason,
        });
    }

    pub fn log(&self, text: impl Into<String>, publisher: &mut Publisher) {
        publisher.publish(Event::LogUpdated {
            job_id: self.job_id,
            trove: self.id.clone(),
            text: text.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use recipe::{Flavor, Version};

    use super::*;

    fn trove() -> BuildTrove {
        BuildTrove::new(
            JobId(1),
            Nvf::new("a", Version::new("1.0", 1), Flavor::empty()),
            Classification::default(),
        )
    }

    #[test]
    fn disown_own_round_trips() {
        let mut t = trove();
        assert!(t.is_owned());
        t.disown();
        assert!(!t.is_owned());
        t.own();
        assert!(t.is_owned());
    }

    #[test]
    fn built_requires_binaries_and_owns() {
        let mut t = trove();
        let mut publisher = Publisher::new();
        t.disown();
        t.built(vec![t.id.clone()], &mut publisher);
        assert_eq!(t.state(), State::Built);
        assert!(!t.binary_troves.is_empty());
        assert!(t.is_owned());
    }

    #[test]
    fn failed_records_reason_and_owns() {
        let mut t = trove();
        let mut publisher = Publisher::new();
        t.disown();
        t.failed("boom", &mut publisher);
        assert_eq!(t.state(), State::Failed);
        assert_eq!(t.failure_reason.as_deref(), Some("boom"));
        assert!(t.is_owned());
    }

    #[test]
    fn prebuilt_promotes_to_built_without_disowning() {
        let mut t = trove();
        let mut publisher = Publisher::new();
        t.prebuilt(BTreeSet::new(), vec![t.id.clone()]);
        assert_eq!(t.state(), State::Prebuilt);
        assert!(t.is_owned());
        t.prebuilt_to_built(&mut publisher);
        assert_eq!(t.state(), State::Built);
    }
}
