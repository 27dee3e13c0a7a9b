// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Upload planning - which steps run for each port, and the commands they map to.
//!
//! Nothing in this module touches the filesystem or spawns processes; the
//! host tool decides whether a planned [`Invocation`] is executed or only
//! printed (dry run).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::pattern::{expand_port_pattern, PatternError};

/// Board environments containing this marker need a manual bootloader entry.
pub const TEENSY_MARKER: &str = "teensy";

/// Baud rate that makes the Teensy USB serial firmware jump to its bootloader.
pub const BOOTLOADER_BAUD: u32 = 134;

/// Parameters of a multi-port upload. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    environment: Option<String>,
    dry_run: bool,
    firmware_location: String,
    port_pattern: String,
}

impl UploadRequest {
    pub fn new(
        environment: Option<String>,
        dry_run: bool,
        firmware_location: impl Into<String>,
        port_pattern: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            dry_run,
            firmware_location: firmware_location.into(),
            port_pattern: port_pattern.into(),
        }
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn firmware_location(&self) -> &str {
        &self.firmware_location
    }

    pub fn port_pattern(&self) -> &str {
        &self.port_pattern
    }

    /// Expand the port pattern of this request.
    pub fn ports(&self) -> Result<Vec<String>, PatternError> {
        expand_port_pattern(&self.port_pattern)
    }
}

/// Whether uploads for `environment` must first force the bootloader.
///
/// The Teensy loader ignores `--upload-port`, so the board has to be put in
/// bootloader mode through its serial port before uploading.
pub fn needs_bootloader_touch(environment: Option<&str>) -> bool {
    environment.is_some_and(|env| env.contains(TEENSY_MARKER))
}

/// How the bootloader touch is performed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TouchMethod {
    #[default]
    Stty,
    Serial,
}

/// Program names used for each external collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Toolchain {
    pub git: String,
    pub stty: String,
    pub pio: String,
    pub touch: TouchMethod,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            stty: "stty".to_string(),
            pio: "pio".to_string(),
            touch: TouchMethod::Stty,
        }
    }
}

/// A single planned action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Clone { url: String },
    BootloaderTouch { port: String, baud: u32 },
    Upload { port: String, environment: Option<String> },
}

/// Steps for one port, in execution order.
pub fn port_steps(port: &str, environment: Option<&str>) -> Vec<Step> {
    let mut steps = Vec::with_capacity(2);
    if needs_bootloader_touch(environment) {
        steps.push(Step::BootloaderTouch {
            port: port.to_string(),
            baud: BOOTLOADER_BAUD,
        });
    }
    steps.push(Step::Upload {
        port: port.to_string(),
        environment: environment.map(str::to_string),
    });
    steps
}

/// A concrete external command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str], cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: cwd.to_path_buf(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

impl Toolchain {
    /// External command for `step`, run in `cwd`.
    ///
    /// Returns `None` for a bootloader touch performed natively through the
    /// serial port.
    pub fn invocation(&self, step: &Step, cwd: &Path) -> Option<Invocation> {
        match step {
            Step::Clone { url } => {
                Some(Invocation::new(&self.git, &["clone", url.as_str()], cwd))
            }
            Step::BootloaderTouch { port, baud } => match self.touch {
                TouchMethod::Stty => {
                    let baud = baud.to_string();
                    Some(Invocation::new(
                        &self.stty,
                        &["-F", port.as_str(), baud.as_str()],
                        cwd,
                    ))
                }
                TouchMethod::Serial => None,
            },
            Step::Upload { port, environment } => {
                let mut args = vec!["run"];
                if let Some(env) = environment {
                    args.extend(["-e", env.as_str()]);
                }
                args.extend(["--target", "upload", "--upload-port", port.as_str()]);
                Some(Invocation::new(&self.pio, &args, cwd))
            }
        }
    }
}

/// Directory name `git clone <url>` checks out into.
///
/// Trailing slashes and a `.git` suffix are dropped, so
/// `https://host/org/Repo.git/` maps to `Repo`.
pub fn repository_name(url: &str) -> Option<&str> {
    let trimmed = url.trim_end_matches(['/', '\\']);
    let last = trimmed.rsplit(['/', '\\', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}
