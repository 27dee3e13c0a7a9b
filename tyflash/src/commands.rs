// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Multi-port upload orchestration.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use tyflash_common::plan::port_steps;
use tyflash_common::{Step, Toolchain, UploadRequest};

use crate::executor::{Executor, StepFailure};
use crate::source::resolve_firmware_source;

/// Result of the steps run against one port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortOutcome {
    pub port: String,
    /// Bootloader touch result, `None` if the environment needs no touch.
    pub touch: Option<Result<(), StepFailure>>,
    pub upload: Result<(), StepFailure>,
}

impl PortOutcome {
    /// A port succeeds when its upload does; a failed touch alone is a warning.
    pub fn succeeded(&self) -> bool {
        self.upload.is_ok()
    }
}

impl fmt::Display for PortOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upload {
            Ok(()) => write!(f, "{}: OK", self.port)?,
            Err(e) => write!(f, "{}: FAILED (upload {})", self.port, e)?,
        }
        if let Some(Err(e)) = &self.touch {
            write!(f, " [bootloader touch {}]", e)?;
        }
        Ok(())
    }
}

/// Outcome of every port, in the order they were processed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub ports: Vec<PortOutcome>,
}

impl UploadReport {
    pub fn failed_ports(&self) -> Vec<&str> {
        self.ports
            .iter()
            .filter(|o| !o.succeeded())
            .map(|o| o.port.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.ports.iter().all(PortOutcome::succeeded)
    }

    /// Turn the report into an error if any upload failed.
    pub fn ensure_success(&self) -> Result<()> {
        let failed = self.failed_ports();
        if !failed.is_empty() {
            bail!(
                "Upload failed on {} of {} port(s): {}",
                failed.len(),
                self.ports.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }
}

fn execute(
    step: &Step,
    firmware_dir: &Path,
    tools: &Toolchain,
    executor: &mut dyn Executor,
) -> Result<(), StepFailure> {
    match (step, tools.invocation(step, firmware_dir)) {
        (_, Some(invocation)) => executor.run(&invocation),
        (Step::BootloaderTouch { port, baud }, None) => executor.touch(port, *baud),
        (_, None) => Ok(()),
    }
}

/// Run the touch and upload steps for each port in order.
///
/// Every port is attempted; failures are recorded in the report instead of
/// stopping the run.
pub fn upload_ports(
    ports: &[String],
    environment: Option<&str>,
    firmware_dir: &Path,
    tools: &Toolchain,
    executor: &mut dyn Executor,
) -> UploadReport {
    let mut report = UploadReport::default();

    for (i, port) in ports.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, ports.len(), port);
        let mut outcome = PortOutcome {
            port: port.clone(),
            touch: None,
            upload: Ok(()),
        };

        for step in port_steps(port, environment) {
            let result = execute(&step, firmware_dir, tools, executor);
            match step {
                Step::BootloaderTouch { .. } => {
                    if let Err(e) = &result {
                        warn!("{}: bootloader touch {}; uploading anyway", port, e);
                    }
                    outcome.touch = Some(result);
                }
                Step::Upload { .. } => {
                    if let Err(e) = &result {
                        error!("{}: upload {}", port, e);
                    }
                    outcome.upload = result;
                }
                Step::Clone { .. } => {}
            }
        }

        report.ports.push(outcome);
    }

    report
}

/// Resolve the firmware source, then upload it to every port of `request`.
///
/// Pattern and source errors abort before any port is touched. The temporary
/// clone, if any, is removed before returning.
pub fn upload_all(
    request: &UploadRequest,
    tools: &Toolchain,
    executor: &mut dyn Executor,
) -> Result<UploadReport> {
    let ports = request
        .ports()
        .with_context(|| format!("Invalid port pattern '{}'", request.port_pattern()))?;

    let source = resolve_firmware_source(request.firmware_location(), tools, executor)?;

    let report = upload_ports(
        &ports,
        request.environment(),
        source.path(),
        tools,
        executor,
    );

    if source.is_temporary() {
        info!("removing temporary clone");
    }
    if let Err(e) = source.close() {
        warn!("could not remove temporary clone: {}", e);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use tyflash_common::{Invocation, PatternError};

    use crate::executor::Action;
    use crate::source::SourceFetchError;

    const PATTERN: &str = "(/dev/ttyACM)[0-2]";
    const REMOTE: &str = "https://example.invalid/org/Firmware";

    /// Records every action and fails the ones it was told to.
    #[derive(Default)]
    struct RecordingExecutor {
        actions: Vec<Action>,
        fail_clone: bool,
        fail_touch: bool,
        fail_upload_ports: Vec<&'static str>,
    }

    impl Executor for RecordingExecutor {
        fn run(&mut self, invocation: &Invocation) -> Result<(), StepFailure> {
            self.actions.push(Action::Run(invocation.clone()));
            let fails = match invocation.program.as_str() {
                "git" => self.fail_clone,
                "stty" => self.fail_touch,
                "pio" => self
                    .fail_upload_ports
                    .iter()
                    .any(|p| invocation.args.iter().any(|a| a == p)),
                _ => false,
            };
            if fails {
                Err(StepFailure::exit(Some(1), "simulated failure"))
            } else {
                Ok(())
            }
        }

        fn touch(&mut self, port: &str, baud: u32) -> Result<(), StepFailure> {
            self.actions.push(Action::Touch {
                port: port.to_string(),
                baud,
            });
            if self.fail_touch {
                Err(StepFailure::io("could not open", "no such device"))
            } else {
                Ok(())
            }
        }
    }

    impl RecordingExecutor {
        fn invocations(&self) -> Vec<&Invocation> {
            self.actions
                .iter()
                .filter_map(|a| match a {
                    Action::Run(inv) => Some(inv),
                    Action::Touch { .. } => None,
                })
                .collect()
        }

        fn count(&self, program: &str) -> usize {
            self.invocations()
                .iter()
                .filter(|inv| inv.program == program)
                .count()
        }

        fn clone_dir(&self) -> PathBuf {
            self.invocations()
                .iter()
                .find(|inv| inv.program == "git")
                .map(|inv| inv.cwd.clone())
                .unwrap()
        }
    }

    fn local_request(dir: &Path, environment: Option<&str>) -> UploadRequest {
        UploadRequest::new(
            environment.map(str::to_string),
            false,
            dir.to_str().unwrap(),
            PATTERN,
        )
    }

    #[test]
    fn test_teensy_touches_then_uploads_each_port_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default();
        let report = upload_all(
            &local_request(dir.path(), Some("teensy40")),
            &Toolchain::default(),
            &mut exec,
        )
        .unwrap();

        let lines: Vec<String> = exec.invocations().iter().map(|i| i.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "stty -F /dev/ttyACM0 134",
                "pio run -e teensy40 --target upload --upload-port /dev/ttyACM0",
                "stty -F /dev/ttyACM1 134",
                "pio run -e teensy40 --target upload --upload-port /dev/ttyACM1",
                "stty -F /dev/ttyACM2 134",
                "pio run -e teensy40 --target upload --upload-port /dev/ttyACM2",
            ]
        );
        assert!(exec.invocations().iter().all(|i| i.cwd == dir.path()));
        assert!(report.is_success());
        assert!(report.ensure_success().is_ok());
    }

    #[test]
    fn test_non_teensy_environment_skips_touch() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default();
        let report = upload_all(
            &local_request(dir.path(), Some("uno")),
            &Toolchain::default(),
            &mut exec,
        )
        .unwrap();

        assert_eq!(exec.count("stty"), 0);
        assert_eq!(exec.count("pio"), 3);
        assert!(report.ports.iter().all(|o| o.touch.is_none()));
    }

    #[test]
    fn test_local_source_is_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default();
        upload_all(
            &local_request(dir.path(), None),
            &Toolchain::default(),
            &mut exec,
        )
        .unwrap();

        assert_eq!(exec.count("git"), 0);
        assert!(dir.path().exists());
    }

    #[test]
    fn test_remote_source_cloned_once_and_removed() {
        let mut exec = RecordingExecutor::default();
        let request = UploadRequest::new(Some("teensy40".to_string()), false, REMOTE, PATTERN);
        let report = upload_all(&request, &Toolchain::default(), &mut exec).unwrap();

        assert!(report.is_success());
        assert_eq!(exec.count("git"), 1);
        let clone_dir = exec.clone_dir();
        assert!(!clone_dir.exists());
        let uploads: Vec<&Invocation> = exec
            .invocations()
            .into_iter()
            .filter(|i| i.program == "pio")
            .collect();
        assert!(uploads.iter().all(|i| i.cwd == clone_dir.join("Firmware")));
    }

    #[test]
    fn test_clone_directory_removed_when_uploads_fail() {
        let mut exec = RecordingExecutor {
            fail_upload_ports: vec!["/dev/ttyACM0", "/dev/ttyACM1", "/dev/ttyACM2"],
            ..Default::default()
        };
        let request = UploadRequest::new(None, false, REMOTE, PATTERN);
        let report = upload_all(&request, &Toolchain::default(), &mut exec).unwrap();

        assert_eq!(report.failed_ports().len(), 3);
        assert!(!exec.clone_dir().exists());
    }

    #[test]
    fn test_clone_failure_aborts_before_any_port() {
        let mut exec = RecordingExecutor {
            fail_clone: true,
            ..Default::default()
        };
        let request = UploadRequest::new(Some("teensy40".to_string()), false, REMOTE, PATTERN);
        let err = upload_all(&request, &Toolchain::default(), &mut exec).unwrap_err();

        assert!(err.downcast_ref::<SourceFetchError>().is_some());
        assert_eq!(exec.actions.len(), 1);
        assert!(!exec.clone_dir().exists());
    }

    #[test]
    fn test_pattern_error_aborts_before_anything_runs() {
        let mut exec = RecordingExecutor::default();
        let request = UploadRequest::new(None, false, REMOTE, "/dev/ttyACM*");
        let err = upload_all(&request, &Toolchain::default(), &mut exec).unwrap_err();

        assert!(err.downcast_ref::<PatternError>().is_some());
        assert!(exec.actions.is_empty());
    }

    #[test]
    fn test_upload_failure_continues_with_remaining_ports() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor {
            fail_upload_ports: vec!["/dev/ttyACM0"],
            ..Default::default()
        };
        let report = upload_all(
            &local_request(dir.path(), None),
            &Toolchain::default(),
            &mut exec,
        )
        .unwrap();

        assert_eq!(exec.count("pio"), 3);
        assert_eq!(report.failed_ports(), vec!["/dev/ttyACM0"]);
        assert!(report.ports[1].succeeded());
        assert!(report.ports[2].succeeded());
        let err = report.ensure_success().unwrap_err();
        assert!(err.to_string().contains("1 of 3"));
    }

    #[test]
    fn test_touch_failure_still_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor {
            fail_touch: true,
            ..Default::default()
        };
        let report = upload_all(
            &local_request(dir.path(), Some("teensy40")),
            &Toolchain::default(),
            &mut exec,
        )
        .unwrap();

        assert_eq!(exec.count("pio"), 3);
        assert!(report
            .ports
            .iter()
            .all(|o| matches!(o.touch, Some(Err(_))) && o.upload.is_ok()));
        assert!(report.is_success());
        assert!(report.ports[0].to_string().contains("bootloader touch"));
    }

    #[test]
    fn test_serial_touch_method_uses_native_touch() {
        let dir = tempfile::tempdir().unwrap();
        let mut exec = RecordingExecutor::default();
        let tools = Toolchain {
            touch: tyflash_common::TouchMethod::Serial,
            ..Toolchain::default()
        };
        upload_all(&local_request(dir.path(), Some("teensy40")), &tools, &mut exec).unwrap();

        assert_eq!(exec.count("stty"), 0);
        assert_eq!(
            exec.actions[0],
            Action::Touch {
                port: "/dev/ttyACM0".to_string(),
                baud: 134
            }
        );
        assert!(matches!(exec.actions[1], Action::Run(_)));
    }

    #[test]
    fn test_dry_run_records_same_sequence_without_executing() {
        use crate::executor::DryRunExecutor;

        let dir = tempfile::tempdir().unwrap();
        let mut exec = DryRunExecutor::new(Vec::new());
        let request = UploadRequest::new(
            Some("teensy40".to_string()),
            true,
            dir.path().to_str().unwrap(),
            PATTERN,
        );
        let report = upload_all(&request, &Toolchain::default(), &mut exec).unwrap();

        let programs: Vec<&str> = exec
            .actions()
            .iter()
            .map(|a| match a {
                Action::Run(inv) => inv.program.as_str(),
                Action::Touch { .. } => "touch",
            })
            .collect();
        assert_eq!(programs, vec!["stty", "pio", "stty", "pio", "stty", "pio"]);
        assert_eq!(report.ports.len(), 3);
        // Nothing was created in the firmware directory.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
