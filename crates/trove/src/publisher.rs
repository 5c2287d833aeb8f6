// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::sync::mpsc::{Receiver, Sender, channel};

use crate::Event;

/// Fans a [`Job`](crate::Job)'s events out to subscribers (persistence, the
/// status bus). The cyclic `Job <-> BuildTrove <-> publisher` relationship
/// from the original design collapses here to plain indexed ownership: the
/// `Job` owns this bus, and subscribers only ever hold the `Receiver` half,
/// never a back-reference to the `Job` itself.
#[derive(Default)]
pub struct Publisher {
    subscribers: Vec<Sender<Event>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber, returning the receiving half of its
    /// channel. Dropping the `Receiver` unsubscribes it lazily: the next
    /// `publish` call that hits a disconnected sender removes it.
    pub fn subscribe(&mut self) -> Receiver<Event> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
