// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};

use recipe::{Nvf, Requirement};
use trove::{Job, JobId};

use crate::backend::{BuildBackend, BuildOutcome, ResolveOutcome};
use crate::error::Error;
use crate::WorkerFacade;

enum Message {
    Resolved { job_id: JobId, trove: Nvf, requirements: Vec<Requirement> },
    ResolveFailed { job_id: JobId, trove: Nvf, reason: String },
    Built { job_id: JobId, trove: Nvf, binaries: Vec<Nvf> },
    BuildFailed { job_id: JobId, trove: Nvf, reason: String },
}

/// In-process stand-in for a real worker pool: every `resolve`/`build`
/// dispatch spawns an OS thread that runs the backend and reports back
/// through a channel, which [`Self::handle_request_if_ready`] drains one
/// message at a time -- the same one-event-per-tick contract a real RPC
/// worker would have.
pub struct LocalWorker<B> {
    backend: Arc<B>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    ready: Arc<AtomicUsize>,
}

impl<B: BuildBackend> LocalWorker<B> {
    pub fn new(backend: B) -> Self {
        let (tx, rx) = channel();
        Self {
            backend: Arc::new(backend),
            tx,
            rx,
            ready: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<B: BuildBackend> WorkerFacade for LocalWorker<B> {
    fn resolve(&mut self, job_id: JobId, trove: Nvf, declared: Vec<Requirement>) -> Result<(), Error> {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let ready = Arc::clone(&self.ready);
        std::thread::spawn(move || {
            let message = match backend.resolve(&trove, &declared) {
                ResolveOutcome::Resolved(requirements) => Message::Resolved { job_id, trove, requirements },
                ResolveOutcome::Failed(reason) => Message::ResolveFailed { job_id, trove, reason },
            };
            ready.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(message);
        });
        Ok(())
    }

    fn build(&mut self, job_id: JobId, trove: Nvf, chroot_root: PathBuf) -> Result<(), Error> {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let ready = Arc::clone(&self.ready);
        std::thread::spawn(move || {
            let message = match backend.build(&trove, &chroot_root) {
                BuildOutcome::Built(binaries) => Message::Built { job_id, trove, binaries },
                BuildOutcome::Failed(reason) => Message::BuildFailed { job_id, trove, reason },
            };
            ready.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(message);
        });
        Ok(())
    }

    fn handle_request_if_ready(&mut self, job: &mut Job) -> bool {
        let Ok(message) = self.rx.try_recv() else {
            return false;
        };
        self.ready.fetch_sub(1, Ordering::SeqCst);

        let result = match message {
            Message::Resolved { trove, requirements, .. } => job
                .trove_mut_and_publisher(&trove)
                .map(|(t, p)| t.resolved(requirements.into_iter().collect(), p)),
            Message::ResolveFailed { trove, reason, .. } => {
                job.trove_mut_and_publisher(&trove).map(|(t, p)| t.failed(reason, p))
            }
            Message::Built { trove, binaries, .. } => {
                job.trove_mut_and_publisher(&trove).map(|(t, p)| t.built(binaries, p))
            }
            Message::BuildFailed { trove, reason, .. } => {
                job.trove_mut_and_publisher(&trove).map(|(t, p)| t.failed(reason, p))
            }
        };

        if let Err(error) = result {
            tracing::warn!(%error, "worker result for a trove no longer tracked by the job");
        }

        true
    }

    fn has_results(&self) -> bool {
        self.ready.load(Ordering::SeqCst) > 0
    }

    fn stop_all_commands(&mut self) {
        // Spawned threads aren't cancellable; draining here just discards
        // whatever they eventually report, so a caller that's already
        // decided the job is dead doesn't act on stale results.
        while self.rx.try_recv().is_ok() {
            self.ready.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use recipe::{Classification, Flavor, Version};
    use trove::BuildTrove;

    use super::*;

    fn nvf(name: &str) -> Nvf {
        Nvf::new(name, Version::new("1.0", 1), Flavor::empty())
    }

    struct Instant;
    impl BuildBackend for Instant {
        fn resolve(&self, _trove: &Nvf, _declared: &[Requirement]) -> ResolveOutcome {
            ResolveOutcome::Resolved(vec![])
        }

        fn build(&self, trove: &Nvf, _chroot_root: &PathBuf) -> BuildOutcome {
            BuildOutcome::Built(vec![trove.clone()])
        }
    }

    #[test]
    fn resolve_then_build_round_trip_through_job() {
        let mut job = Job::new(JobId(1));
        let mut publisher = trove::Publisher::new();
        let mut t = BuildTrove::new(JobId(1), nvf("a"), Classification::default());
        t.load(&mut publisher);
        t.enqueue_resolve(&mut publisher);
        t.disown();
        job.insert(t);

        let mut worker = LocalWorker::new(Instant);
        worker.resolve(JobId(1), nvf("a"), vec![]).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !worker.has_results() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(worker.handle_request_if_ready(&mut job));
        assert_eq!(job.trove(&nvf("a")).unwrap().state(), trove::State::Resolved);
    }
}
