// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::Args;

use crate::backend::ChrootBackend;
use crate::driver::{Driver, DriverConfig};
use crate::env::Env;
use crate::{jobspec, signal, timing};

#[derive(Debug, Args)]
pub struct Command {
    /// Path to a job spec YAML file describing the recipes to build.
    pub job_spec: PathBuf,
    /// Allow built chroots network access.
    #[arg(long, default_value = "false")]
    pub networking: bool,
}

pub fn handle(command: Command, env: Env) -> Result<(), Error> {
    let spec = jobspec::load(&command.job_spec)?;

    let log_path = PathBuf::from(&env.settings.build_log_dir).join(format!("{}.log", spec.job_id));
    let captured = crate::log::CapturedStdout::redirect_to(&log_path)?;

    let guard = signal::install()?;

    let config = DriverConfig {
        chroot_base: env.settings.chroot_dir.clone(),
        log_dir: env.settings.build_log_dir.clone(),
        idle_sleep: std::time::Duration::from_millis(env.settings.idle_sleep_ms),
    };
    let worker = worker::LocalWorker::new(ChrootBackend::new(env.settings.chroot_dir.clone(), command.networking));
    let mut driver = Driver::new(config, worker);

    let mut timing = timing::Timing::start();
    let job = driver.run(&spec)?;
    timing.finish();

    drop(guard);
    drop(captured);

    println!("job {} finished in {:?}", spec.job_id, timing.elapsed());
    for trove in job.built_troves() {
        println!("  built: {trove}");
    }
    if let Some(reason) = job.failure_reason() {
        println!("  failed: {reason}");
    }

    if job.is_passed() {
        Ok(())
    } else {
        Err(Error::JobFailed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("job spec")]
    JobSpec(#[from] jobspec::Error),
    #[error("signal handling")]
    Signal(#[from] signal::Error),
    #[error("log redirection")]
    Log(#[from] crate::log::Error),
    #[error("driver")]
    Driver(#[from] crate::driver::Error),
    #[error("build job had failures")]
    JobFailed,
}
