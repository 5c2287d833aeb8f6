// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

/// Flags derived from the recipe's declared type. A *solitary* recipe
/// (redirect or fileset) must build alone in its job; a *delayed* recipe's
/// build inputs include other just-built binaries from the same job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_group: bool,
    pub is_redirect: bool,
    pub is_fileset: bool,
    pub is_delayed: bool,
}

impl Classification {
    pub fn is_solitary(&self) -> bool {
        self.is_redirect || self.is_fileset
    }
}
