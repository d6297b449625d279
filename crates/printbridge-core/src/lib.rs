// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printbridge — Core types, error definitions, and configuration shared
// across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ConfigProvider, ConfigStore};
pub use error::{PrintBridgeError, PrintStage};
pub use types::*;
