// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Common types and pure logic for tyflash.
//!
//! Everything here is free of I/O so it can be tested without boards,
//! serial ports or external tools attached:
//! - [`pattern`]: expansion of port patterns into port lists
//! - [`plan`]: upload requests, per-port steps and the commands they map to

pub mod pattern;
pub mod plan;

// Re-export commonly used types
pub use pattern::{expand_port_pattern, PatternError, MAX_PORTS, MAX_PORT_LEN, MAX_REPEAT};
pub use plan::{Invocation, Step, Toolchain, TouchMethod, UploadRequest};
pub use plan::{BOOTLOADER_BAUD, TEENSY_MARKER};
