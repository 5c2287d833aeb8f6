// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use recipe::{Nvf, Requirement};

/// What actually resolving/building a trove does, abstracted out so
/// [`crate::LocalWorker`] can be driven in tests without a package client
/// or a real chroot. The real implementation of this lives outside this
/// workspace's scope (package-repository queries, recipe compilation).
pub trait BuildBackend: Send + Sync + 'static {
    fn resolve(&self, trove: &Nvf, declared: &[Requirement]) -> ResolveOutcome;
    fn build(&self, trove: &Nvf, chroot_root: &PathBuf) -> BuildOutcome;
}

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved(Vec<Requirement>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Built(Vec<Nvf>),
    Failed(String),
}
