// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Upload a firmware repository to one or more serial-connected boards.
//!
//! Usage:
//!   tyflash -e teensy40 https://github.com/org/Firmware "(/dev/ttyACM)[0-2]"
//!   tyflash -e teensy40 --dry-run ./Firmware "(/dev/ttyACM)[0-2]"
//!   tyflash -e uno -y ./Firmware /dev/ttyUSB0

mod cli;
mod commands;
mod executor;
mod source;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.verbose);
    cli::run(args)
}
