// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Helvety — Core types, error taxonomy, and configuration shared across all
// crates.

pub mod config;
pub mod error;
pub mod messages;
pub mod types;

pub use config::{ComposerConfig, DeviceClass};
pub use error::{ErrorKind, HelvetyError};
pub use types::*;
