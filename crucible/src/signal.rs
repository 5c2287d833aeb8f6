// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use nix::sys::signal::{SaFlags, SigAction, SigHandler, Signal, sigaction};
use nix::sys::signalfd::SigSet;

/// Installs the driver's termination handling for §4.1 step 1 / §5's
/// cancellation contract: ignore `SIGTERM`/`SIGINT` so the driver's own
/// polling loop observes them (via [`triggered`]) instead of the process
/// dying mid-teardown. Dropping the returned [`Guard`] restores each
/// signal's previous disposition, so the final re-raise in §5 ("terminate
/// with default disposition") behaves as specified.
pub fn install() -> Result<Guard, Error> {
    let term = set(Signal::SIGTERM, SigHandler::Handler(on_signal))?;
    let int = set(Signal::SIGINT, SigHandler::Handler(on_signal))?;
    RECEIVED.store(0, std::sync::atomic::Ordering::SeqCst);
    Ok(Guard { term, int })
}

/// The signal number the driver was asked to stop for, if any.
pub fn received() -> Option<i32> {
    let value = RECEIVED.load(std::sync::atomic::Ordering::SeqCst);
    (value != 0).then_some(value)
}

static RECEIVED: std::sync::atomic::AtomicI32 = std::sync::atomic::AtomicI32::new(0);

extern "C" fn on_signal(signal: i32) {
    RECEIVED.store(signal, std::sync::atomic::Ordering::SeqCst);
}

fn set(signal: Signal, handler: SigHandler) -> Result<SigAction, Error> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(signal, &action) }.map_err(|source| Error::Sigaction { signal, source })
}

/// Restores whatever `SIGTERM`/`SIGINT` disposition was in place before
/// [`install`] on drop.
pub struct Guard {
    term: SigAction,
    int: SigAction,
}

impl Drop for Guard {
    fn drop(&mut self) {
        let _ = unsafe { sigaction(Signal::SIGTERM, &self.term) };
        let _ = unsafe { sigaction(Signal::SIGINT, &self.int) };
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sigaction({signal})")]
    Sigaction { signal: Signal, source: nix::Error },
}
