// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! The build driver loop itself.
//!
//! Grounded directly on `Builder.build`'s main loop: drain whatever a
//! worker reported since the last tick, then decide between applying a
//! result, dispatching the next buildable trove, or resolving a loaded
//! trove's requirements, falling back to a bounded sleep only when none of
//! those had anything to do. Initialization (loading recipes, matching
//! prior job context for prebuilt reuse, checking the job's sanity) mirrors
//! `Builder.initializeBuild` / `_matchTrovesToJobContext`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use dephandler::DependencyHandler;
use recipe::{Classification, Nvf, Requirement};
use trove::{BuildTrove, Job, JobId, SanityCheck};
use worker::WorkerFacade;

use crate::jobspec::JobSpec;
use crate::paths::Paths;

/// Everything the driver needs from the surrounding environment to run one
/// job: where chroots and logs live, and how long to sleep when idle.
pub struct DriverConfig {
    pub chroot_base: PathBuf,
    pub log_dir: PathBuf,
    pub idle_sleep: Duration,
}

/// §4.1 step 5's "pause briefly" after warning about an experimental
/// group/non-group combination, matched to the original build driver's
/// fixed three-second pause.
const EXPERIMENTAL_COMBINATION_PAUSE: Duration = Duration::from_secs(3);

/// Runs one job to completion (or failure), returning the [`Job`] for the
/// caller to inspect (built troves, failure reason, event history already
/// drained by any subscribers).
pub struct Driver<W> {
    config: DriverConfig,
    dependencies: DependencyHandler,
    worker: W,
}

impl<W: WorkerFacade> Driver<W> {
    pub fn new(config: DriverConfig, worker: W) -> Self {
        Self {
            config,
            dependencies: DependencyHandler::new(),
            worker,
        }
    }

    /// Build the job described by `spec`, per §4.1. Returns once every
    /// trove has reached a terminal state, an unrecoverable condition (a
    /// dependency cycle, a solitary-recipe violation) stops the job before
    /// any work is dispatched, or the loop detects mid-build that no
    /// further progress is possible (§4.2) and fails the job instead of
    /// spinning forever.
    pub fn run(&mut self, spec: &JobSpec) -> Result<Job, Error> {
        let span = tracing::info_span!("job", job_id = spec.job_id);
        let _entered = span.enter();

        let mut job = self.initialize(spec)?;

        match job.check_sanity() {
            SanityCheck::Ok => {}
            SanityCheck::ExperimentalCombination { warning } => {
                tracing::warn!(job_id = job.id.0, %warning, "proceeding with experimental trove combination");
                std::thread::sleep(EXPERIMENTAL_COMBINATION_PAUSE);
            }
            SanityCheck::SolitaryViolation { reason } => {
                job.fail(reason.clone());
                return Err(Error::Unbuildable { reason });
            }
        }

        if self.dependencies.has_cycle() {
            let members = self.dependencies.cycle_members();
            let reason = format!(
                "dependency cycle among: {}",
                members.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            );
            mark_unbuildable(&mut job, &members, &reason);
            job.fail(reason.clone());
            return Err(Error::Unbuildable { reason });
        }

        while self.dependencies.more_to_do(&job) {
            if let Some(signal) = crate::signal::received() {
                tracing::warn!(signal, "driver interrupted, stopping all in-flight work");
                self.worker.stop_all_commands();
                job.fail(format!("interrupted by signal {signal}"));
                break;
            }

            self.worker.handle_request_if_ready(&mut job);

            if self.worker.has_results() {
                self.resolve_if_ready(&mut job)?;
            } else if self.dependencies.has_buildable(&job) {
                let trove = self.dependencies.pop_buildable(&job).expect("has_buildable just confirmed one");
                self.dispatch_build(&mut job, &trove)?;
            } else if self.resolve_if_ready(&mut job)? {
                // dispatched a resolve this tick, keep going
            } else if job.has_outstanding_work() || !self.dependencies.more_to_do(&job) {
                // Either a worker is still thinking, or everything just
                // reached a terminal state this tick -- either way the
                // outer `while` sorts it out on the next check.
                std::thread::sleep(self.config.idle_sleep);
            } else {
                // Nothing buildable, nothing resolvable, no worker dispatch
                // in flight, and troves remain non-terminal: they can never
                // reach BUILT on their own. Per §4.2, mark them UNBUILDABLE
                // and fail the job instead of spinning forever.
                let members = self.dependencies.cycle_members();
                let stuck: Vec<Nvf> = job.troves().filter(|t| !t.state().is_terminal()).map(|t| t.id.clone()).collect();
                let reason = if members.is_empty() {
                    format!(
                        "no recipe is buildable or resolvable and no worker work is outstanding: {}",
                        stuck.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                    )
                } else {
                    format!(
                        "dependency cycle among: {}",
                        members.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                    )
                };
                mark_unbuildable(&mut job, &stuck, &reason);
                job.fail(reason.clone());
                return Err(Error::Unbuildable { reason });
            }
        }

        for trove in job.troves().map(|t| t.id.clone()).collect::<Vec<_>>() {
            if job.trove(&trove).map(|t| t.state()) == Some(trove::State::Built) {
                job.record_built(trove);
            }
        }

        Ok(job)
    }

    /// Seed the job: one [`BuildTrove`] per recipe, prebuilt matches applied
    /// from `job_context`, and every intra-job `depends_on` edge recorded.
    fn initialize(&mut self, spec: &JobSpec) -> Result<Job, Error> {
        let job_id = JobId(spec.job_id);
        let mut job = Job::new(job_id);

        let prebuilt: std::collections::BTreeMap<Nvf, (BTreeSet<Requirement>, Vec<Nvf>)> = spec
            .job_context
            .iter()
            .flat_map(|prior| prior.recipes.iter())
            .map(|r| {
                (
                    r.id(),
                    (
                        r.build_requirements.iter().map(|spec| Requirement::unresolved(spec.clone())).collect(),
                        r.binaries.iter().map(|b| Nvf::new(b.as_str(), r.id().version, r.id().flavor.clone())).collect(),
                    ),
                )
            })
            // First match wins: a recipe appearing in more than one prior
            // job context keeps whichever was folded in first, rather than
            // merging binaries across contexts.
            .fold(std::collections::BTreeMap::new(), |mut acc, (id, value)| {
                acc.entry(id).or_insert(value);
                acc
            });

        for recipe in &spec.recipes {
            let id = recipe.id();
            let classification: Classification = recipe.classification.clone().into();
            let mut trove = BuildTrove::new(job_id, id.clone(), classification);
            // Declared (unresolved) build-requirements, held here until a
            // resolve dispatch overwrites them with the resolved set.
            trove.build_requirements = recipe.requirements().into_iter().collect();

            trove.load(job.publisher());

            if let Some((build_requirements, binaries)) = prebuilt.get(&id) {
                trove.prebuilt(build_requirements.clone(), binaries.clone());
            }
            // Non-prebuilt troves stay `Loaded` (and owned) until
            // `resolve_if_ready` dispatches them -- see invariant 1 in §8.

            self.dependencies.add_trove(&id);
            job.insert(trove);
        }

        for recipe in &spec.recipes {
            let dependent = recipe.id();
            for dep_name in &recipe.depends_on {
                if let Some(dependency) = spec.recipes.iter().find(|r| &r.name == dep_name).map(|r| r.id()) {
                    if !self.dependencies.add_dependency(&dependency, &dependent) {
                        tracing::warn!(%dependency, %dependent, "dependency edge closes a cycle");
                    }
                }
            }
        }

        // Prebuilt troves skip resolve entirely; fold their binaries into
        // availability immediately so dependents see them as built.
        let prebuilt_ids: Vec<Nvf> = job
            .troves()
            .filter(|t| t.state() == trove::State::Prebuilt)
            .map(|t| t.id.clone())
            .collect();
        for id in prebuilt_ids {
            let (trove, publisher) = job.trove_mut_and_publisher(&id).map_err(Error::Trove)?;
            trove.prebuilt_to_built(publisher);
        }

        Ok(job)
    }

    /// §4.1's "Dispatch" subsection: prepare a chroot isn't this crate's
    /// concern beyond path bookkeeping (that's `chrootfactory`'s job, driven
    /// by the `build` CLI subcommand that owns a `ChrootFactory`); the
    /// driver only needs to hand the worker a root path and disown the
    /// trove until its result comes back.
    fn dispatch_build(&mut self, job: &mut Job, trove: &Nvf) -> Result<(), Error> {
        let paths = Paths::new(trove, &self.config.chroot_base, &self.config.log_dir);
        let log_path = paths.log_path(job.id.0);

        let (t, publisher) = job.trove_mut_and_publisher(trove).map_err(Error::Trove)?;
        t.queued(publisher);
        t.preparing_chroot("local", paths.root().display().to_string(), publisher);
        t.building(log_path.display().to_string(), 0, publisher);
        t.disown();

        self.worker
            .build(job.id, trove.clone(), paths.root())
            .map_err(Error::Worker)?;

        Ok(())
    }

    /// §4.1's `resolveIfReady()`: dispatch a resolve for the first loaded,
    /// still-owned trove that hasn't been dispatched yet. `Loaded` is the
    /// owned "ready to resolve" state (invariant 1, §8); the transition to
    /// `Resolving` happens here, at dispatch time, paired with `disown()`,
    /// the same way `dispatch_build` pairs its state transitions with
    /// `disown()`. Returns whether one was dispatched, so the caller knows
    /// whether the tick did any work.
    fn resolve_if_ready(&mut self, job: &mut Job) -> Result<bool, Error> {
        let Some(id) = job
            .troves()
            .find(|t| t.state() == trove::State::Loaded && t.is_owned())
            .map(|t| t.id.clone())
        else {
            return Ok(false);
        };

        let declared = job.trove(&id).map(|t| t.build_requirements.iter().cloned().collect()).unwrap_or_default();

        let (t, publisher) = job.trove_mut_and_publisher(&id).map_err(Error::Trove)?;
        t.enqueue_resolve(publisher);
        t.resolving("local", publisher);
        t.disown();

        self.worker.resolve(job.id, id, declared).map_err(Error::Worker)?;

        Ok(true)
    }
}

/// Mark every non-terminal trove in `ids` `UNBUILDABLE` with `reason`, used
/// when a dependency cycle or a stalled loop means they can never reach a
/// terminal state on their own.
fn mark_unbuildable(job: &mut Job, ids: &[Nvf], reason: &str) {
    for id in ids {
        if let Ok((t, publisher)) = job.trove_mut_and_publisher(id) {
            if !t.state().is_terminal() {
                t.unbuildable(reason.to_string(), publisher);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("job is unbuildable: {reason}")]
    Unbuildable { reason: String },
    #[error("trove bookkeeping")]
    Trove(#[source] trove::Error),
    #[error("worker dispatch")]
    Worker(#[source] worker::Error),
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::jobspec::{ClassificationSpec, JobSpec, PriorJob, PriorRecipe, RecipeSpec};

    use super::*;

    // `crate::signal::received()` is polled by every `Driver::run` call, but
    // backed by one process-global flag. Any test that runs a driver loop
    // while another test raises a real signal would see a spurious
    // interruption, so every test here (not just the one that raises a
    // signal) takes this lock for its whole body.
    static DRIVER_TESTS: Mutex<()> = Mutex::new(());

    fn config() -> DriverConfig {
        DriverConfig {
            chroot_base: PathBuf::from("/tmp/crucible-tests/chroot"),
            log_dir: PathBuf::from("/tmp/crucible-tests/logs"),
            idle_sleep: Duration::from_millis(5),
        }
    }

    fn recipe(name: &str) -> RecipeSpec {
        RecipeSpec {
            name: name.into(),
            version: "1.0".into(),
            release: 1,
            flavor: Vec::new(),
            build_requirements: Vec::new(),
            depends_on: Vec::new(),
            classification: ClassificationSpec::default(),
        }
    }

    enum Outcome {
        Resolved { job_id: JobId, trove: Nvf, requirements: BTreeSet<Requirement> },
        Built { job_id: JobId, trove: Nvf },
        Failed { job_id: JobId, trove: Nvf, reason: String },
    }

    /// A `WorkerFacade` the test drives deterministically: every dispatched
    /// resolve/build is queued as an immediate outcome unless the fixture
    /// says otherwise, so the driver loop can be exercised without threads,
    /// a package client, or a real chroot.
    #[derive(Default)]
    struct ScriptedWorker {
        pending: VecDeque<Outcome>,
        fail_builds: bool,
        hang_builds: bool,
        resolve_calls: AtomicU32,
        build_calls: AtomicU32,
        stopped: AtomicU32,
    }

    impl WorkerFacade for ScriptedWorker {
        fn resolve(&mut self, job_id: JobId, trove: Nvf, declared: Vec<Requirement>) -> Result<(), worker::Error> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            self.pending.push_back(Outcome::Resolved { job_id, trove, requirements: declared.into_iter().collect() });
            Ok(())
        }

        fn build(&mut self, job_id: JobId, trove: Nvf, _chroot_root: PathBuf) -> Result<(), worker::Error> {
            self.build_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_builds {
                return Ok(());
            }
            if self.fail_builds {
                self.pending.push_back(Outcome::Failed { job_id, trove, reason: "build script failed".into() });
            } else {
                self.pending.push_back(Outcome::Built { job_id, trove });
            }
            Ok(())
        }

        fn handle_request_if_ready(&mut self, job: &mut Job) -> bool {
            let Some(outcome) = self.pending.pop_front() else {
                return false;
            };
            match outcome {
                Outcome::Resolved { trove, requirements, .. } => {
                    if let Ok((t, publisher)) = job.trove_mut_and_publisher(&trove) {
                        t.resolving("local", publisher);
                        t.resolved(requirements, publisher);
                    }
                }
                Outcome::Built { trove, .. } => {
                    if let Ok((t, publisher)) = job.trove_mut_and_publisher(&trove) {
                        t.built(vec![trove], publisher);
                    }
                }
                Outcome::Failed { trove, reason, .. } => {
                    if let Ok((t, publisher)) = job.trove_mut_and_publisher(&trove) {
                        t.failed(reason, publisher);
                    }
                }
            }
            true
        }

        fn has_results(&self) -> bool {
            !self.pending.is_empty()
        }

        fn stop_all_commands(&mut self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn linear_dependency_chain_builds_to_completion() {
        let _guard = DRIVER_TESTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let a = recipe("a");
        let mut b = recipe("b");
        b.depends_on = vec!["a".into()];
        let spec = JobSpec { job_id: 1, recipes: vec![a, b], job_context: Vec::new() };

        let mut driver = Driver::new(config(), ScriptedWorker::default());
        let job = driver.run(&spec).expect("job runs to completion");

        assert!(job.is_passed());
        assert_eq!(job.built_troves().len(), 2);
    }

    #[test]
    fn mid_build_failure_leaves_job_unpassed() {
        let _guard = DRIVER_TESTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let spec = JobSpec { job_id: 2, recipes: vec![recipe("broken")], job_context: Vec::new() };

        let worker = ScriptedWorker { fail_builds: true, ..Default::default() };
        let mut driver = Driver::new(config(), worker);
        let job = driver.run(&spec).expect("loop still terminates on a failed trove");

        assert!(!job.is_passed());
        let failed = job.trove(&recipe("broken").id()).expect("trove present");
        assert_eq!(failed.state(), trove::State::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("build script failed"));
    }

    #[test]
    fn prebuilt_match_skips_worker_dispatch() {
        let _guard = DRIVER_TESTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let prior = PriorRecipe {
            name: "cached".into(),
            version: "1.0".into(),
            release: 1,
            flavor: Vec::new(),
            build_requirements: Vec::new(),
            binaries: vec!["cached-bin".into()],
        };
        let spec = JobSpec {
            job_id: 3,
            recipes: vec![recipe("cached")],
            job_context: vec![PriorJob { recipes: vec![prior] }],
        };

        let worker = ScriptedWorker::default();
        let mut driver = Driver::new(config(), worker);
        let job = driver.run(&spec).expect("prebuilt job runs to completion");

        assert!(job.is_passed());
        let trove = job.trove(&recipe("cached").id()).expect("trove present");
        assert_eq!(trove.state(), trove::State::Built);
        assert_eq!(driver.worker.resolve_calls.load(Ordering::SeqCst), 0);
        assert_eq!(driver.worker.build_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mutual_dependency_cycle_fails_both_troves() {
        let _guard = DRIVER_TESTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut a = recipe("a");
        a.depends_on = vec!["b".into()];
        let mut b = recipe("b");
        b.depends_on = vec!["a".into()];
        let spec = JobSpec { job_id: 5, recipes: vec![a, b], job_context: Vec::new() };

        let mut driver = Driver::new(config(), ScriptedWorker::default());
        let err = driver.run(&spec).expect_err("a dependency cycle must fail the job");

        assert!(matches!(err, Error::Unbuildable { .. }));
        assert_eq!(driver.worker.resolve_calls.load(Ordering::SeqCst), 0);
        assert_eq!(driver.worker.build_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn signal_during_build_stops_the_driver_and_fails_the_job() {
        let _guard = DRIVER_TESTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let signal_guard = crate::signal::install().expect("install signal handlers");

        let spec = JobSpec { job_id: 4, recipes: vec![recipe("stuck")], job_context: Vec::new() };
        let worker = ScriptedWorker { hang_builds: true, ..Default::default() };
        let mut driver = Driver::new(config(), worker);

        std::thread::spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).expect("raise SIGTERM");
        });

        let job = driver.run(&spec).expect("interrupted job still returns Ok");

        assert!(!job.is_passed());
        assert!(job.failure_reason().unwrap().contains("interrupted by signal"));
        assert_eq!(driver.worker.stopped.load(Ordering::SeqCst), 1);

        drop(signal_guard);
    }
}
