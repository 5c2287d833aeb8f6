// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::time::{Duration, Instant};

/// Wall-clock timing for a single trove's resolve/build span, grounded on
/// `boulder::timing::Timing`. Purely diagnostic -- attached to the summary
/// printed once a job finishes, never consulted by the driver loop itself.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    started: Instant,
    finished: Option<Instant>,
}

impl Timing {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            finished: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished = Some(Instant::now());
    }

    pub fn elapsed(&self) -> Duration {
        self.finished.unwrap_or_else(Instant::now).duration_since(self.started)
    }
}
