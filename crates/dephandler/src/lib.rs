// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! Tracks intra-job build requirements as a prerequisite index and decides,
//! at any point in a build, which troves are buildable (all their
//! prerequisites have reached `BUILT`), whether there's more work left to
//! do, and whether the declared dependencies contain a cycle.
//!
//! Grounded on `Builder.moreToDo`/`popBuildableTrove`/
//! `_checkDependencyCycle` from the original build driver: this crate owns
//! exactly the dependency-order bookkeeping those methods did. The
//! prerequisite graph isn't backed by [`dag::Dag`] -- that type refuses any
//! edge that would close a cycle, which makes it acyclic by construction
//! and therefore useless for *detecting* a cycle a caller declared. A
//! cycle has to be recorded faithfully, on both sides, so it can be
//! reported and the troves involved failed, not quietly dropped.

use std::collections::{BTreeMap, BTreeSet};

use recipe::Nvf;
use trove::{Job, State};

/// Dependency index over the troves in a single job: for each trove, the
/// set of troves that must reach `BUILT` before it can start.
#[derive(Debug, Default)]
pub struct DependencyHandler {
    prerequisites: BTreeMap<Nvf, BTreeSet<Nvf>>,
}

impl DependencyHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trove(&mut self, trove: &Nvf) {
        self.prerequisites.entry(trove.clone()).or_default();
    }

    /// Record that `dependent` requires `dependency` to be built first. The
    /// edge is always recorded, even when it closes a cycle back to
    /// `dependency` -- that cycle has to surface through
    /// [`Self::has_cycle`]/[`Self::cycle_members`], not disappear. Returns
    /// `false` when this edge closes a cycle, purely so the caller can log
    /// it; the prerequisite map is mutated either way.
    pub fn add_dependency(&mut self, dependency: &Nvf, dependent: &Nvf) -> bool {
        self.prerequisites.entry(dependency.clone()).or_default();
        let closes_cycle = self.reaches(dependency, dependent);
        self.prerequisites.entry(dependent.clone()).or_default().insert(dependency.clone());
        !closes_cycle
    }

    /// True if `to` is reachable from `from` by following prerequisite
    /// edges, i.e. `from` transitively requires `to` already.
    fn reaches(&self, from: &Nvf, to: &Nvf) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(deps) = self.prerequisites.get(node) {
                stack.extend(deps.iter());
            }
        }
        false
    }

    /// True while any trove in the job has not reached a terminal state.
    pub fn more_to_do(&self, job: &Job) -> bool {
        job.troves().any(|t| !t.state().is_terminal())
    }

    fn prerequisites_met(&self, job: &Job, trove: &Nvf) -> bool {
        self.prerequisites
            .get(trove)
            .map(|deps| {
                deps.iter().all(|dep| job.trove(dep).map(|t| t.state() == State::Built).unwrap_or(false))
            })
            .unwrap_or(true)
    }

    /// All troves ready to be handed to a worker right now: resolved (or
    /// queued), still owned by the driver, and every prerequisite built.
    /// Returned in deterministic `(name, version, flavor)` order so the
    /// driver's dispatch order doesn't depend on hash/graph iteration.
    pub fn buildable(&self, job: &Job) -> Vec<Nvf> {
        let mut ready: Vec<Nvf> = job
            .troves()
            .filter(|t| matches!(t.state(), State::Resolved | State::Queued))
            .filter(|t| t.is_owned())
            .filter(|t| self.prerequisites_met(job, &t.id))
            .map(|t| t.id.clone())
            .collect();
        ready.sort();
        ready
    }

    pub fn has_buildable(&self, job: &Job) -> bool {
        !self.buildable(job).is_empty()
    }

    /// The next trove to dispatch, if any, per [`Self::buildable`]'s
    /// ordering.
    pub fn pop_buildable(&self, job: &Job) -> Option<Nvf> {
        self.buildable(job).into_iter().next()
    }

    /// True if the declared dependencies contain a cycle.
    pub fn has_cycle(&self) -> bool {
        !self.cycle_members().is_empty()
    }

    /// Troves participating in a dependency cycle, if any. A depth-first
    /// search over [`Self::prerequisites`] with an explicit path stack:
    /// revisiting a node still on the stack closes a cycle through every
    /// node from that point on.
    pub fn cycle_members(&self) -> Vec<Nvf> {
        let mut done: BTreeSet<&Nvf> = BTreeSet::new();
        let mut in_cycle: BTreeSet<Nvf> = BTreeSet::new();

        for start in self.prerequisites.keys() {
            if done.contains(start) {
                continue;
            }
            let mut path: Vec<&Nvf> = Vec::new();
            self.visit(start, &mut path, &mut done, &mut in_cycle);
        }

        in_cycle.into_iter().collect()
    }

    fn visit<'a>(&'a self, node: &'a Nvf, path: &mut Vec<&'a Nvf>, done: &mut BTreeSet<&'a Nvf>, in_cycle: &mut BTreeSet<Nvf>) {
        if done.contains(node) {
            return;
        }
        if let Some(pos) = path.iter().position(|n| *n == node) {
            for member in &path[pos..] {
                in_cycle.insert((*member).clone());
            }
            return;
        }

        path.push(node);
        if let Some(deps) = self.prerequisites.get(node) {
            for dep in deps {
                self.visit(dep, path, done, in_cycle);
            }
        }
        path.pop();
        done.insert(node);
    }
}

#[cfg(test)]
mod tests {
    use recipe::{Flavor, Version};
    use trove::{BuildTrove, JobId, Publisher};

    use super::*;

    fn nvf(name: &str) -> Nvf {
        Nvf::new(name, Version::new("1.0", 1), Flavor::empty())
    }

    fn job_with(names: &[&str]) -> (Job, Publisher) {
        let mut job = Job::new(JobId(1));
        let mut publisher = Publisher::new();
        for name in names {
            let mut t = BuildTrove::new(JobId(1), nvf(name), recipe::Classification::default());
            t.load(&mut publisher);
            t.enqueue_resolve(&mut publisher);
            t.resolved(Default::default(), &mut publisher);
            job.insert(t);
        }
        (job, publisher)
    }

    #[test]
    fn linear_chain_dispatches_in_order() {
        let (mut job, mut publisher) = job_with(&["a", "b", "c"]);
        let mut dh = DependencyHandler::new();
        dh.add_trove(&nvf("a"));
        dh.add_trove(&nvf("b"));
        dh.add_trove(&nvf("c"));
        assert!(dh.add_dependency(&nvf("a"), &nvf("b")));
        assert!(dh.add_dependency(&nvf("b"), &nvf("c")));

        assert_eq!(dh.buildable(&job), vec![nvf("a")]);

        job.trove_mut(&nvf("a")).unwrap().built(vec![nvf("a")], &mut publisher);
        assert_eq!(dh.buildable(&job), vec![nvf("b")]);

        job.trove_mut(&nvf("b")).unwrap().built(vec![nvf("b")], &mut publisher);
        assert_eq!(dh.buildable(&job), vec![nvf("c")]);
    }

    #[test]
    fn diamond_waits_for_both_branches() {
        let (mut job, mut publisher) = job_with(&["top", "left", "right", "bottom"]);
        let mut dh = DependencyHandler::new();
        for n in ["top", "left", "right", "bottom"] {
            dh.add_trove(&nvf(n));
        }
        dh.add_dependency(&nvf("top"), &nvf("left"));
        dh.add_dependency(&nvf("top"), &nvf("right"));
        dh.add_dependency(&nvf("left"), &nvf("bottom"));
        dh.add_dependency(&nvf("right"), &nvf("bottom"));

        assert_eq!(dh.buildable(&job), vec![nvf("top")]);
        job.trove_mut(&nvf("top")).unwrap().built(vec![nvf("top")], &mut publisher);

        assert_eq!(dh.buildable(&job), vec![nvf("left"), nvf("right")]);
        job.trove_mut(&nvf("left")).unwrap().built(vec![nvf("left")], &mut publisher);
        assert!(!dh.has_buildable(&job) || dh.buildable(&job) == vec![nvf("right")]);

        job.trove_mut(&nvf("right")).unwrap().built(vec![nvf("right")], &mut publisher);
        assert_eq!(dh.buildable(&job), vec![nvf("bottom")]);
    }

    #[test]
    fn cycle_is_recorded_and_reported() {
        let mut dh = DependencyHandler::new();
        dh.add_trove(&nvf("a"));
        dh.add_trove(&nvf("b"));
        assert!(dh.add_dependency(&nvf("a"), &nvf("b")));
        // b -> a closes the loop; the edge is still recorded rather than
        // dropped, so both troves show up as cycle members.
        assert!(!dh.add_dependency(&nvf("b"), &nvf("a")));

        assert!(dh.has_cycle());
        let mut members = dh.cycle_members();
        members.sort();
        assert_eq!(members, vec![nvf("a"), nvf("b")]);
    }

    #[test]
    fn three_node_cycle_reports_all_members() {
        let mut dh = DependencyHandler::new();
        for n in ["a", "b", "c"] {
            dh.add_trove(&nvf(n));
        }
        dh.add_dependency(&nvf("a"), &nvf("b"));
        dh.add_dependency(&nvf("b"), &nvf("c"));
        dh.add_dependency(&nvf("c"), &nvf("a"));

        let mut members = dh.cycle_members();
        members.sort();
        assert_eq!(members, vec![nvf("a"), nvf("b"), nvf("c")]);
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let mut dh = DependencyHandler::new();
        dh.add_trove(&nvf("a"));
        dh.add_trove(&nvf("b"));
        dh.add_dependency(&nvf("a"), &nvf("b"));
        assert!(!dh.has_cycle());
        assert!(dh.cycle_members().is_empty());
    }

    #[test]
    fn more_to_do_is_false_once_all_terminal() {
        let (mut job, mut publisher) = job_with(&["a"]);
        let dh = DependencyHandler::new();
        assert!(dh.more_to_do(&job));
        job.trove_mut(&nvf("a")).unwrap().built(vec![nvf("a")], &mut publisher);
        assert!(!dh.more_to_do(&job));
    }
}
