// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser};
use clap_complete::generate_to;
use clap_complete::shells::{Bash, Fish, Zsh};
use clap_mangen::Man;
use fs_err::{self as fs, File};

use crate::env::Env;

pub mod admin;
pub mod build;

#[derive(Debug, Parser)]
pub struct Command {
    #[command(flatten)]
    pub global: Global,
    #[command(subcommand)]
    pub subcommand: Option<Subcommand>,
}

#[derive(Debug, Args)]
pub struct Global {
    #[arg(short, long, default_value = "false", global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    #[arg(long, global = true, hide = true)]
    pub generate_manpages: Option<PathBuf>,
    #[arg(long, global = true, hide = true)]
    pub generate_completions: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Build(build::Command),
    Admin(admin::Command),
}

pub fn process() -> Result<(), Error> {
    let Command { global, subcommand } = Command::parse();

    if let Some(dir) = global.generate_manpages {
        fs::create_dir_all(&dir)?;
        let main_cmd = Command::command();
        let main_man = Man::new(main_cmd.clone());
        let mut buffer = File::create(dir.join("crucible.1"))?;
        main_man.render(&mut buffer)?;

        for sub in main_cmd.get_subcommands() {
            let sub_man = Man::new(sub.clone());
            let name = format!("crucible-{}.1", sub.get_name());
            let mut buffer = File::create(dir.join(&name))?;
            sub_man.render(&mut buffer)?;
        }
        return Ok(());
    }

    if let Some(dir) = global.generate_completions {
        fs::create_dir_all(&dir)?;
        let mut cmd = Command::command();
        generate_to(Bash, &mut cmd, "crucible", &dir)?;
        generate_to(Fish, &mut cmd, "crucible", &dir)?;
        generate_to(Zsh, &mut cmd, "crucible", &dir)?;
        return Ok(());
    }

    let env = Env::new(global.cache_dir, global.config_dir, global.data_dir)?;

    if global.verbose {
        eprintln!("cache directory: {:?}", env.cache_dir);
        eprintln!("config directory: {:?}", env.config_dir);
        eprintln!("chroot directory: {:?}", env.settings.chroot_dir);
    }

    match subcommand {
        Some(Subcommand::Build(command)) => build::handle(command, env)?,
        Some(Subcommand::Admin(command)) => {
            if let Err(error) = admin::handle(command) {
                eprintln!("Error: {error}");
                std::process::exit(admin::EXIT_OPERATION_FAILURE);
            }
        }
        None => (),
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("build")]
    Build(#[from] build::Error),
    #[error("env")]
    Env(#[from] crate::env::Error),
    #[error("io error")]
    Io(#[from] std::io::Error),
}
