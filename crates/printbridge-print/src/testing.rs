// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process printer backend for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use printbridge_bridge::PrinterBackend;
use printbridge_core::error::{PrintBridgeError, PrintStage, Result};
use printbridge_core::types::{PrinterInfo, PrinterStatus};

/// One call observed by `RecordingBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Raw { printer: String, data: Vec<u8> },
    File {
        printer: String,
        path: PathBuf,
        /// File contents at the time of the call.
        data: Vec<u8>,
    },
}

/// Records every submission and optionally fails at a given stage or
/// holds each submission for a fixed time, like a busy spooler.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    fail_at: Option<PrintStage>,
    latency: Duration,
}

impl RecordingBackend {
    pub fn failing(stage: PrintStage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn slow(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn outcome(&self) -> Result<()> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        match self.fail_at {
            Some(stage) => Err(PrintBridgeError::backend(stage, "simulated failure")),
            None => Ok(()),
        }
    }
}

impl PrinterBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn list_printers(&self) -> Result<Vec<PrinterInfo>> {
        Ok(vec![
            PrinterInfo {
                name: "Office".into(),
                status: PrinterStatus::Ready,
            },
            PrinterInfo {
                name: "Label".into(),
                status: PrinterStatus::Offline,
            },
        ])
    }

    fn print_raw(&self, printer: &str, data: &[u8]) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Raw {
            printer: printer.to_string(),
            data: data.to_vec(),
        });
        self.outcome()
    }

    fn print_file(&self, printer: &str, path: &Path) -> Result<()> {
        let data = std::fs::read(path)?;
        self.calls.lock().unwrap().push(Call::File {
            printer: printer.to_string(),
            path: path.to_path_buf(),
            data,
        });
        self.outcome()
    }
}
