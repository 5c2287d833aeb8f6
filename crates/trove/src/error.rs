// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use recipe::Nvf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no such trove in job: {0}")]
    UnknownTrove(Nvf),
    #[error("job {job_id} is not buildable: {reason}")]
    Unbuildable { job_id: u64, reason: String },
}
