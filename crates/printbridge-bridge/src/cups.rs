// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS backend shared by macOS and Linux.
//
// Printing shells out to `lp` and enumeration to `lpstat -l -p`; both ship
// with CUPS on every supported desktop.  macOS additionally passes
// `-o raw` for raw jobs so the filter chain leaves ESC/POS and similar
// printer languages untouched.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, warn};

use printbridge_core::error::{PrintBridgeError, PrintStage, Result};
use printbridge_core::types::{PrinterInfo, printer_label};

use crate::status::parse_lpstat;
use crate::traits::PrinterBackend;

/// An external program plus any arguments that precede the generated ones.
#[derive(Debug, Clone)]
pub struct Tool {
    program: PathBuf,
    leading: Vec<OsString>,
}

impl Tool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading: Vec::new(),
        }
    }

    /// Run `program` with `leading` in front of the generated arguments,
    /// e.g. an interpreter and a script path.
    pub fn with_args<I, S>(program: impl Into<PathBuf>, leading: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            leading: leading.into_iter().map(Into::into).collect(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading);
        cmd
    }

    fn display(&self) -> std::path::Display<'_> {
        self.program.display()
    }
}

/// `lp` / `lpstat` driven backend.
pub struct CupsBackend {
    name: &'static str,
    /// Pass `-o raw` for raw jobs (macOS).
    raw_mode: bool,
    lp: Tool,
    lpstat: Tool,
}

impl CupsBackend {
    pub fn macos() -> Self {
        Self {
            name: "CUPS (macOS)",
            raw_mode: true,
            lp: Tool::new("lp"),
            lpstat: Tool::new("lpstat"),
        }
    }

    pub fn linux() -> Self {
        Self {
            name: "CUPS (Linux)",
            raw_mode: false,
            lp: Tool::new("lp"),
            lpstat: Tool::new("lpstat"),
        }
    }

    /// Use different executables in place of `lp` and `lpstat`.
    pub fn with_tools(mut self, lp: Tool, lpstat: Tool) -> Self {
        self.lp = lp;
        self.lpstat = lpstat;
        self
    }

    pub fn raw_mode(&self) -> bool {
        self.raw_mode
    }
}

/// Arguments for `lp`: destination only when a printer is named, `-o raw`
/// only for raw streams in raw mode, and the file path last.
pub fn lp_args(printer: &str, raw_mode: bool, file: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if !printer.is_empty() {
        args.push("-d".into());
        args.push(printer.into());
    }
    match file {
        Some(path) => args.push(path.as_os_str().to_owned()),
        None if raw_mode => {
            args.push("-o".into());
            args.push("raw".into());
        }
        None => {}
    }
    args
}

impl PrinterBackend for CupsBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn list_printers(&self) -> Result<Vec<PrinterInfo>> {
        let output = self
            .lpstat
            .command()
            .args(["-l", "-p"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                PrintBridgeError::backend(
                    PrintStage::Process,
                    format!("{}: {e}", self.lpstat.display()),
                )
            })?;

        // lpstat exits non-zero when no destinations exist; the listing is
        // still whatever it printed.
        if !output.status.success() {
            debug!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "lpstat returned non-zero"
            );
        }

        let printers = parse_lpstat(&String::from_utf8_lossy(&output.stdout));
        debug!(count = printers.len(), "enumerated CUPS printers");
        Ok(printers)
    }

    fn print_raw(&self, printer: &str, data: &[u8]) -> Result<()> {
        let mut child = self
            .lp
            .command()
            .args(lp_args(printer, self.raw_mode, None))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.lp, e))?;

        // Write then drop stdin so lp sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(data) {
                // lp may have exited early; its status below says why.
                warn!(error = %e, "writing to lp stdin failed");
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| PrintBridgeError::backend(PrintStage::Process, e))?;
        check_exit(&self.lp, &output)?;

        info!(printer = printer_label(printer), bytes = data.len(), "raw job sent to CUPS");
        Ok(())
    }

    fn print_file(&self, printer: &str, path: &Path) -> Result<()> {
        let output = self
            .lp
            .command()
            .args(lp_args(printer, self.raw_mode, Some(path)))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.lp, e))?;
        check_exit(&self.lp, &output)?;

        info!(printer = printer_label(printer), path = %path.display(), "file job sent to CUPS");
        Ok(())
    }
}

fn spawn_error(program: &Tool, e: std::io::Error) -> PrintBridgeError {
    PrintBridgeError::backend(PrintStage::Process, format!("{}: {e}", program.display()))
}

fn check_exit(program: &Tool, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = match stderr.trim() {
        "" => format!("{} exited with {}", program.display(), output.status),
        text => format!("{} exited with {}: {text}", program.display(), output.status),
    };
    Err(PrintBridgeError::backend(PrintStage::Process, detail))
}
