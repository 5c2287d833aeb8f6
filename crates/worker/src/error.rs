// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use recipe::Nvf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no worker slot available")]
    NoSlot,
    #[error("{0} is not tracked by this job")]
    UnknownTrove(Nvf),
}
