// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use fs_err as fs;
use nix::unistd::{Gid, Pid, Uid};
use snafu::{ResultExt, Snafu};

/// Map the current user/group to root inside the child's new user namespace.
///
/// Must be called from the parent after `clone` returns but before the child
/// is allowed to continue past its synchronization pipe.
pub fn idmap(pid: Pid) -> Result<(), Error> {
    let uid = Uid::current();
    let gid = Gid::current();

    // A process may only map a single gid without CAP_SETGID unless it first
    // denies `setgroups`, per user_namespaces(7).
    fs::write(format!("/proc/{pid}/setgroups"), "deny").context(WriteSnafu { what: "setgroups" })?;
    fs::write(format!("/proc/{pid}/uid_map"), format!("0 {uid} 1")).context(WriteSnafu { what: "uid_map" })?;
    fs::write(format!("/proc/{pid}/gid_map"), format!("0 {gid} 1")).context(WriteSnafu { what: "gid_map" })?;

    Ok(())
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("write {what}"))]
    Write { what: &'static str, source: std::io::Error },
}
