// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! The admin CLI surface from §6: status/suspend/resume against a
//! dispatcher fleet. That fleet (message bus, node pool) is an external
//! collaborator this workspace doesn't implement -- the surface is wired
//! up so the command names, arguments, and exit codes match, but every
//! handler currently reports the fleet as unreachable rather than talking
//! to a real one.

use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct Command {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// List connected clients and queue lengths on the message bus.
    StatusMessagebus,
    /// List nodes, queued commands, and assigned commands.
    StatusDispatcher,
    /// Queued and active commands on one node, with pids.
    StatusNode { node_id: String },
    /// Mark nodes ineligible for new work.
    Suspend { session_ids: Vec<String> },
    /// Reverse of suspend.
    Resume { session_ids: Vec<String> },
}

pub fn handle(command: Command) -> Result<(), Error> {
    match command.action {
        Action::StatusMessagebus => Err(Error::Unavailable("messagebus")),
        Action::StatusDispatcher => Err(Error::Unavailable("dispatcher")),
        Action::StatusNode { node_id } => Err(Error::NodeUnavailable(node_id)),
        Action::Suspend { session_ids } => Err(Error::SessionsUnavailable("suspend", session_ids)),
        Action::Resume { session_ids } => Err(Error::SessionsUnavailable("resume", session_ids)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: no dispatcher fleet configured")]
    Unavailable(&'static str),
    #[error("node {0}: no dispatcher fleet configured")]
    NodeUnavailable(String),
    #[error("{0} {1:?}: no dispatcher fleet configured")]
    SessionsUnavailable(&'static str, Vec<String>),
}

/// §6's exit-code contract: 0 success, 1 usage error (handled by clap
/// itself before `handle` ever runs), 2 admin-operation failure.
pub const EXIT_OPERATION_FAILURE: i32 = 2;
