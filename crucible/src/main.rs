// SPDX-FileCopyrightText: 2025 AerynOS Developers
// SPDX-License-Identifier: MPL-2.0

use std::error::Error;

mod backend;
mod cli;
mod driver;
mod env;
mod jobspec;
mod log;
mod paths;
mod settings;
mod signal;
mod timing;

fn main() {
    tracing_common::init(
        tracing_common::OutputFormat::Text,
        tracing::level_filters::LevelFilter::INFO,
        tracing_common::OutputDestination::Stderr,
    );

    if let Err(error) = cli::process() {
        report_error(error);
        std::process::exit(1);
    }
}

fn report_error(error: cli::Error) {
    let sources = sources(&error);
    eprintln!("Error: {}", sources.join(": "));
}

fn sources(error: &cli::Error) -> Vec<String> {
    let mut sources = vec![error.to_string()];
    let mut source = error.source();
    while let Some(error) = source.take() {
        sources.push(error.to_string());
        source = error.source();
    }
    sources
}
