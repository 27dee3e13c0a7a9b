// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, warn};

use tyflash_common::{Toolchain, TouchMethod, UploadRequest};

use crate::commands;
use crate::executor::{DryRunExecutor, Executor, ProcessExecutor};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "tyflash")]
#[command(version)]
#[command(about = "Upload a firmware repository to one or more serial-connected boards")]
pub struct Cli {
    /// Firmware project: a local directory or a git repository URL
    #[arg(value_name = "FIRMWARE_LOCATION")]
    pub firmware_location: String,

    /// Port pattern (e.g., "(/dev/ttyACM)[0-2]")
    #[arg(value_name = "PORT_PATTERN")]
    pub port_pattern: String,

    /// Board environment (e.g., teensy40)
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Print the commands instead of running them
    #[arg(short, long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// How Teensy boards are put into bootloader mode
    #[arg(long, value_enum, default_value_t = TouchArg::Stty)]
    pub touch: TouchArg,

    /// git executable
    #[arg(long, env = "TYFLASH_GIT", default_value = "git")]
    pub git: String,

    /// stty executable
    #[arg(long, env = "TYFLASH_STTY", default_value = "stty")]
    pub stty: String,

    /// PlatformIO executable
    #[arg(long, env = "TYFLASH_PIO", default_value = "pio")]
    pub pio: String,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Bootloader touch methods selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TouchArg {
    /// Run `stty -F <port> 134`
    Stty,
    /// Open the port at 134 baud directly
    Serial,
}

impl From<TouchArg> for TouchMethod {
    fn from(arg: TouchArg) -> Self {
        match arg {
            TouchArg::Stty => TouchMethod::Stty,
            TouchArg::Serial => TouchMethod::Serial,
        }
    }
}

impl Cli {
    pub fn request(&self) -> UploadRequest {
        UploadRequest::new(
            self.environment.clone(),
            self.dry_run,
            self.firmware_location.clone(),
            self.port_pattern.clone(),
        )
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            git: self.git.clone(),
            stty: self.stty.clone(),
            pio: self.pio.clone(),
            touch: self.touch.into(),
        }
    }
}

/// Ask a yes/no question; anything but `y` or `yes` is a no.
pub fn confirm(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> Result<bool> {
    write!(output, "{} [y/N]: ", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Warn about expanded ports that are not currently present.
fn warn_missing_ports(ports: &[String]) {
    match serialport::available_ports() {
        Ok(available) => {
            for port in ports {
                if !available.iter().any(|p| &p.port_name == port) {
                    warn!("{} is not currently present", port);
                }
            }
        }
        Err(e) => debug!("could not list serial ports: {}", e),
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let request = cli.request();
    let tools = cli.toolchain();

    let ports = request
        .ports()
        .with_context(|| format!("Invalid port pattern '{}'", request.port_pattern()))?;

    println!(
        "Environment:  {}",
        request.environment().unwrap_or("(default)")
    );
    println!("Dry Run:      {}", request.dry_run());
    println!("Firmware:     {}", request.firmware_location());
    println!("Upload ports: {:?}", ports);

    if !request.dry_run() {
        warn_missing_ports(&ports);
    }

    if !cli.yes {
        let stdin = io::stdin();
        let proceed = confirm(
            &mut stdin.lock(),
            &mut io::stdout(),
            "Do you want to continue?",
        )?;
        if !proceed {
            bail!("Aborted!");
        }
    }

    let mut process = ProcessExecutor::new();
    let mut dry_run = DryRunExecutor::new(io::stdout());
    let executor: &mut dyn Executor = if request.dry_run() {
        &mut dry_run
    } else {
        &mut process
    };

    let report = commands::upload_all(&request, &tools, executor)?;

    println!();
    if request.dry_run() {
        println!(
            "Dry run complete: {} step(s) for {} port(s), nothing executed.",
            dry_run.actions().len(),
            report.ports.len()
        );
        return Ok(());
    }

    println!("Upload summary:");
    for outcome in &report.ports {
        println!("  {}", outcome);
    }
    if report.is_success() {
        println!("All {} port(s) uploaded successfully.", report.ports.len());
    }
    report.ensure_success()
}
