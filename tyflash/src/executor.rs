// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Step execution - real processes and serial ports, or a dry-run recorder.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, trace};

use tyflash_common::Invocation;

/// How long a native bootloader touch waits for the port to open.
pub const TOUCH_TIMEOUT_MS: u64 = 500;

/// Something an executor was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Run(Invocation),
    Touch { port: String, baud: u32 },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run(inv) => write!(f, "{} (in {})", inv, inv.cwd.display()),
            Action::Touch { port, baud } => write!(f, "open {} at {} baud", port, baud),
        }
    }
}

/// Failure of one external step, classified only by exit status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepFailure {
    /// Exit code, `None` if the step never ran to completion.
    pub status: Option<i32>,
    /// Captured stderr or the OS error, surfaced as-is.
    pub detail: String,
}

impl StepFailure {
    pub fn exit(status: Option<i32>, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn io(context: &str, err: impl fmt::Display) -> Self {
        Self {
            status: None,
            detail: format!("{}: {}", context, err),
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "exited with status {}", code)?,
            None => write!(f, "failed")?,
        }
        let detail = self.detail.trim();
        if !detail.is_empty() {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for StepFailure {}

/// Carries out planned steps.
pub trait Executor {
    /// Run an external command to completion.
    fn run(&mut self, invocation: &Invocation) -> Result<(), StepFailure>;

    /// Open `port` at `baud` and close it again.
    fn touch(&mut self, port: &str, baud: u32) -> Result<(), StepFailure>;
}

/// Runs commands as child processes and touches ports through `serialport`.
#[derive(Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl Executor for ProcessExecutor {
    fn run(&mut self, invocation: &Invocation) -> Result<(), StepFailure> {
        debug!(cwd = %invocation.cwd.display(), "running {}", invocation);
        let pb = Self::spinner(invocation.to_string());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .output();
        pb.finish_and_clear();

        let output = output
            .map_err(|e| StepFailure::io(&format!("could not start {}", invocation.program), e))?;

        trace!(
            "{} stdout:\n{}",
            invocation.program,
            String::from_utf8_lossy(&output.stdout)
        );

        if output.status.success() {
            Ok(())
        } else {
            Err(StepFailure::exit(
                output.status.code(),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }

    fn touch(&mut self, port: &str, baud: u32) -> Result<(), StepFailure> {
        debug!("opening {} at {} baud", port, baud);
        let handle = serialport::new(port, baud)
            .timeout(Duration::from_millis(TOUCH_TIMEOUT_MS))
            .open()
            .map_err(|e| StepFailure::io(&format!("could not open {}", port), e))?;
        drop(handle);
        Ok(())
    }
}

/// Prints and records every step instead of executing it.
pub struct DryRunExecutor<W: Write> {
    out: W,
    actions: Vec<Action>,
}

impl<W: Write> DryRunExecutor<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            actions: Vec::new(),
        }
    }

    /// Everything that would have been executed, in order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    fn record(&mut self, action: Action) -> Result<(), StepFailure> {
        writeln!(self.out, "[dry-run] {}", action)
            .map_err(|e| StepFailure::io("could not write dry-run output", e))?;
        self.actions.push(action);
        Ok(())
    }
}

impl<W: Write> Executor for DryRunExecutor<W> {
    fn run(&mut self, invocation: &Invocation) -> Result<(), StepFailure> {
        self.record(Action::Run(invocation.clone()))
    }

    fn touch(&mut self, port: &str, baud: u32) -> Result<(), StepFailure> {
        self.record(Action::Touch {
            port: port.to_string(),
            baud,
        })
    }
}
