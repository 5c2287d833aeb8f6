// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::collections::BTreeMap;

use recipe::Nvf;

use crate::error::Error;
use crate::event::JobId;
use crate::{BuildTrove, Publisher, State};

/// Outcome of [`Job::check_sanity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanityCheck {
    /// Nothing unusual about this combination of troves.
    Ok,
    /// Group and non-group recipes mixed in one job. Historically a source
    /// of surprising rebuild cascades; allowed, but flagged so the driver
    /// can warn and pause before dispatching.
    ExperimentalCombination { warning: String },
    /// A redirect or fileset recipe was queued alongside other troves. These
    /// recipes don't produce buildable output on their own and must be
    /// built in isolation.
    SolitaryViolation { reason: String },
}

/// A single invocation of the driver: a set of troves to build together,
/// plus the event bus subscribers watch.
pub struct Job {
    pub id: JobId,
    troves: BTreeMap<Nvf, BuildTrove>,
    publisher: Publisher,
    built: Vec<Nvf>,
    failure_reason: Option<String>,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            troves: BTreeMap::new(),
            publisher: Publisher::new(),
            built: Vec::new(),
            failure_reason: None,
        }
    }

    pub fn insert(&mut self, trove: BuildTrove) {
        self.troves.insert(trove.id.clone(), trove);
    }

    pub fn trove(&self, id: &Nvf) -> Option<&BuildTrove> {
        self.troves.get(id)
    }

    pub fn trove_mut(&mut self, id: &Nvf) -> Result<&mut BuildTrove, Error> {
        self.troves.get_mut(id).ok_or_else(|| Error::UnknownTrove(id.clone()))
    }

    pub fn troves(&self) -> impl Iterator<Item = &BuildTrove> {
        self.troves.values()
    }

    pub fn publisher(&mut self) -> &mut Publisher {
        &mut self.publisher
    }

    /// Borrow a trove and the publisher simultaneously, for callers (worker
    /// result handlers) that need to call a [`BuildTrove`] transition method
    /// and have it emit an event in one step.
    pub fn trove_mut_and_publisher(&mut self, id: &Nvf) -> Result<(&mut BuildTrove, &mut Publisher), Error> {
        let trove = self.troves.get_mut(id).ok_or_else(|| Error::UnknownTrove(id.clone()))?;
        Ok((trove, &mut self.publisher))
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<crate::Event> {
        self.publisher.subscribe()
    }

    /// True once every trove in the job has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.troves.values().all(|t| t.state().is_terminal())
    }

    pub fn is_passed(&self) -> bool {
        self.is_complete() && self.troves.values().all(|t| t.state() == State::Built)
    }

    pub fn record_built(&mut self, id: Nvf) {
        self.built.push(id);
    }

    pub fn built_troves(&self) -> &[Nvf] {
        &self.built
    }

    /// True if any trove currently has a resolve or build dispatched to a
    /// worker that hasn't reported back yet.
    pub fn has_outstanding_work(&self) -> bool {
        self.troves.values().any(|t| t.state().implies_disowned())
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Mirrors `_checkBuildSanity`: a redirect or fileset recipe can never
    /// share a job with anything else, and mixing group recipes with plain
    /// ones is allowed but flagged as experimental.
    pub fn check_sanity(&self) -> SanityCheck {
        let solitary: Vec<&Nvf> = self
            .troves
            .values()
            .filter(|t| t.classification.is_solitary())
            .map(|t| &t.id)
            .collect();

        if !solitary.is_empty() && self.troves.len() > 1 {
            return SanityCheck::SolitaryViolation {
                reason: format!(
                    "redirect/fileset recipe(s) {} cannot be built alongside other troves",
                    solitary.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
                ),
            };
        }

        let has_group = self.troves.values().any(|t| t.classification.is_group);
        let has_non_group = self.troves.values().any(|t| !t.classification.is_group);

        if has_group && has_non_group && self.troves.len() > 1 {
            return SanityCheck::ExperimentalCombination {
                warning: "job mixes group recipes with plain recipes; this combination is experimental".into(),
            };
        }

        SanityCheck::Ok
    }
}

#[cfg(test)]
mod tests {
    use recipe::{Classification, Flavor, Version};

    use super::*;

    fn nvf(name: &str) -> Nvf {
        Nvf::new(name, Version::new("1.0", 1), Flavor::empty())
    }

    #[test]
    fn solitary_redirect_with_others_is_flagged() {
        let mut job = Job::new(JobId(1));
        let mut redirect_class = Classification::default();
        redirect_class.is_redirect = true;
        job.insert(BuildTrove::new(JobId(1), nvf("a"), redirect_class));
        job.insert(BuildTrove::new(JobId(1), nvf("b"), Classification::default()));

        assert!(matches!(job.check_sanity(), SanityCheck::SolitaryViolation { .. }));
    }

    #[test]
    fn group_and_plain_is_experimental_not_rejected() {
        let mut job = Job::new(JobId(1));
        let mut group_class = Classification::default();
        group_class.is_group = true;
        job.insert(BuildTrove::new(JobId(1), nvf("a"), group_class));
        job.insert(BuildTrove::new(JobId(1), nvf("b"), Classification::default()));

        assert!(matches!(job.check_sanity(), SanityCheck::ExperimentalCombination { .. }));
    }

    #[test]
    fn plain_single_trove_job_is_ok() {
        let mut job = Job::new(JobId(1));
        job.insert(BuildTrove::new(JobId(1), nvf("a"), Classification::default()));
        assert_eq!(job.check_sanity(), SanityCheck::Ok);
    }
}
