// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

//! Builds and tears down the per-trove chroot a worker builds inside.
//!
//! Grounded on `rmake/build/rootfactory.py`'s `AbstractChroot`/`BaseChroot`/
//! `ChrootFactory`: directory scaffold, device nodes, minimal `/etc`, then
//! hand the prepared root to [`container::Container`] (this workspace's
//! namespace-based replacement for that module's plain `chroot(2)` call) to
//! actually run something inside it. Compiling a recipe inside the chroot
//! and the worker RPC wire format are out of scope here -- this crate only
//! owns getting a root ready and tearing it down again.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use container::Container;
use fs_err as fs;
use nix::sys::signal::Signal;
use nix::sys::stat::{Mode, SFlag, mknod};
use nix::unistd::Pid;

/// How long to wait for a freshly started chroot to signal readiness,
/// mirroring `ConaryBasedRoot.start`'s socket-wait budget.
pub const READY_TIMEOUT: Duration = Duration::from_secs(180);
/// Grace period given to a chroot after asking it to stop before it's
/// escalated to `SIGKILL`.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(40);

/// A scaffolded, not-yet-started chroot root.
pub struct ChrootSpec {
    pub root: PathBuf,
    binds: Vec<(PathBuf, PathBuf, bool)>,
    hostname: Option<String>,
    networking: bool,
}

impl ChrootSpec {
    pub fn bind_rw(mut self, host: impl Into<PathBuf>, guest: impl Into<PathBuf>) -> Self {
        self.binds.push((host.into(), guest.into(), false));
        self
    }

    pub fn bind_ro(mut self, host: impl Into<PathBuf>, guest: impl Into<PathBuf>) -> Self {
        self.binds.push((host.into(), guest.into(), true));
        self
    }

    pub fn networking(mut self, enabled: bool) -> Self {
        self.networking = enabled;
        self
    }

    pub fn hostname(mut self, hostname: impl ToString) -> Self {
        self.hostname = Some(hostname.to_string());
        self
    }

    fn into_container(self) -> Container {
        let mut container = Container::new(&self.root).networking(self.networking).ignore_host_sigint(true);
        if let Some(hostname) = self.hostname {
            container = container.hostname(hostname);
        }
        for (host, guest, read_only) in self.binds {
            container = if read_only {
                container.bind_ro(host, guest)
            } else {
                container.bind_rw(host, guest)
            };
        }
        container
    }
}

/// A running chroot: the container process plus the path its readiness
/// marker and logs live under, so the caller can poll/tail them.
pub struct ChrootHandle {
    root: PathBuf,
    pid: Pid,
    child: container::ChildHandle,
}

impl ChrootHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Owns the set of live chroots, keyed by pid, the way `ChrootFactory.chroots`
/// does in the original -- so a driver shutdown can walk the table and kill
/// every outstanding child.
#[derive(Default)]
pub struct ChrootFactory {
    base_dir: PathBuf,
    live: BTreeMap<i32, PathBuf>,
}

impl ChrootFactory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            live: BTreeMap::new(),
        }
    }

    /// Scaffold a fresh root under the factory's base directory: the
    /// `BaseChroot` directory tree, device nodes, and a minimal `/etc`.
    /// Mirrors `AbstractChroot.create`'s `_createDirs`/`_addDeviceNodes`
    /// phase; package installation into the root is the worker's job, not
    /// this crate's.
    pub fn create_root(&self, name: &str) -> Result<ChrootSpec, Error> {
        let root = self.base_dir.join(name);

        clean(&root)?;
        scaffold(&root)?;

        Ok(ChrootSpec {
            root,
            binds: Vec::new(),
            hostname: None,
            networking: false,
        })
    }

    /// Fork the chroot's init process and wait for it to touch
    /// `<root>/<ready_relpath>`, up to `timeout`. On timeout the child is
    /// killed and the attempt reported as a failure.
    pub fn start<E>(
        &mut self,
        spec: ChrootSpec,
        ready_relpath: impl AsRef<Path>,
        timeout: Duration,
        f: impl FnMut() -> Result<(), E>,
    ) -> Result<ChrootHandle, Error>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let root = spec.root.clone();
        let ready_path = root.join(ready_relpath);

        let container = spec.into_container();
        let child = container.spawn(f).map_err(Error::Container)?;
        let pid = child.pid();

        self.live.insert(pid.as_raw(), root.clone());

        if wait_for_path(&ready_path, timeout).is_err() {
            let _ = child.kill(Signal::SIGKILL);
            self.live.remove(&pid.as_raw());
            return Err(Error::NotReady { root });
        }

        Ok(ChrootHandle { root, pid, child })
    }

    /// Ask a chroot to stop, escalating to `SIGKILL` if it's still running
    /// after `STOP_TIMEOUT`. Mirrors `AbstractChroot.stop`/`killChild`.
    pub fn stop(&mut self, handle: ChrootHandle) -> Result<(), Error> {
        self.live.remove(&handle.pid.as_raw());

        handle.child.kill(Signal::SIGTERM).map_err(Error::Container)?;

        // Liveness probe (signal 0): detects exit without reaping, so the
        // single real reap below stays in `ChildHandle::wait`.
        let pid = handle.pid;
        let still_alive = || nix::sys::signal::kill(pid, None).is_ok();

        let deadline = Instant::now() + STOP_TIMEOUT;
        while still_alive() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(100));
        }
        if still_alive() {
            let _ = handle.child.kill(Signal::SIGKILL);
        }

        handle.child.wait().map_err(Error::Container)
    }

    /// Kill every chroot still tracked as live. Called on driver shutdown
    /// (signal, or a fatal job failure) the way `ChrootFactory.killChildren`
    /// is called from `__del__`.
    pub fn kill_all(&mut self) {
        for (pid, root) in std::mem::take(&mut self.live) {
            tracing::warn!(pid, root = %root.display(), "killing outstanding chroot");
            let _ = nix::sys::signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
}

impl Drop for ChrootFactory {
    fn drop(&mut self) {
        self.kill_all();
    }
}

fn clean(root: &Path) -> Result<(), Error> {
    if root.exists() {
        fs::remove_dir_all(root).map_err(|source| Error::Io { path: root.to_owned(), source })?;
    }
    Ok(())
}

/// `BaseChroot`'s directory tree, device nodes and minimal `/etc`.
fn scaffold(root: &Path) -> Result<(), Error> {
    for (dir, mode) in [
        ("tmp", 0o1777),
        ("var/tmp", 0o1777),
        ("proc", 0o755),
        ("dev/pts", 0o755),
        ("etc", 0o755),
    ] {
        let path = root.join(dir);
        fs::create_dir_all(&path).map_err(|source| Error::Io { path: path.clone(), source })?;
        fs_err::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(|source| Error::Io { path, source })?;
    }

    for (name, major, minor, mode) in [("urandom", 1, 9, 0o666), ("ptmx", 5, 2, 0o666)] {
        let path = root.join("dev").join(name);
        let dev = nix::sys::stat::makedev(major, minor);
        // mknod requires CAP_MKNOD; best-effort outside a real container
        // runtime (tests, rootless dev boxes) just leaves the node absent.
        if let Err(source) = mknod(&path, SFlag::S_IFCHR, Mode::from_bits_truncate(mode), dev) {
            tracing::debug!(path = %path.display(), %source, "skipping device node, mknod unavailable");
        }
    }

    fs::write(root.join("etc/hosts"), "127.0.0.1 localhost\n").map_err(|source| Error::Io {
        path: root.join("etc/hosts"),
        source,
    })?;
    if let Ok(resolv) = fs::read("/etc/resolv.conf") {
        fs::write(root.join("etc/resolv.conf"), resolv).map_err(|source| Error::Io {
            path: root.join("etc/resolv.conf"),
            source,
        })?;
    }
    fs::write(root.join("etc/passwd"), "root:x:0:0:root:/root:/bin/sh\n").map_err(|source| Error::Io {
        path: root.join("etc/passwd"),
        source,
    })?;
    fs::write(root.join("etc/group"), "root:x:0:\n").map_err(|source| Error::Io {
        path: root.join("etc/group"),
        source,
    })?;

    Ok(())
}

fn wait_for_path(path: &Path, timeout: Duration) -> Result<(), ()> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Err(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("container")]
    Container(#[source] container::Error),
    #[error("chroot at {root} never signaled readiness")]
    NotReady { root: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_creates_expected_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        scaffold(&root).unwrap();

        assert!(root.join("tmp").is_dir());
        assert!(root.join("var/tmp").is_dir());
        assert!(root.join("proc").is_dir());
        assert!(root.join("dev/pts").is_dir());
        assert!(root.join("etc/hosts").is_file());
        assert!(root.join("etc/passwd").is_file());
    }

    #[test]
    fn wait_for_path_times_out_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("never-appears");
        assert!(wait_for_path(&missing, Duration::from_millis(50)).is_err());
    }

    #[test]
    fn wait_for_path_succeeds_once_present() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("ready");
        fs::write(&marker, b"").unwrap();
        assert!(wait_for_path(&marker, Duration::from_millis(50)).is_ok());
    }
}
