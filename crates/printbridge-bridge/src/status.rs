// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parsers for the printer listings produced by the OS tools.
//
// Both parsers are pure so they can be exercised on any host; the backends
// only run the commands and feed the output through here.
//
// # `lpstat -l -p` (CUPS)
//
// ```text
// printer Office is idle.  enabled since Mon 01 Jan 2026 09:00:00
//         Form mounted:
//         Alerts: offline-report
// printer Label is printing Label-12.  enabled since ...
// ```
//
// # `Get-Printer | ConvertTo-Json` (Windows)
//
// `PrinterStatus` is either an integer code or a string depending on the
// PowerShell version and formatting settings.

use serde::Deserialize;

use printbridge_core::error::{PrintBridgeError, PrintStage, Result};
use printbridge_core::types::{PrinterInfo, PrinterStatus};

// ---------------------------------------------------------------------------
// lpstat
// ---------------------------------------------------------------------------

/// Parse `lpstat -l -p` output into printers in listing order.
///
/// A block starts at a line `printer <name> is <state>...`; indented
/// `Alerts:` lines mentioning "offline" inside that block force the status
/// to `Offline`.  Lines before the first block are ignored.
pub fn parse_lpstat(output: &str) -> Vec<PrinterInfo> {
    let mut printers = Vec::new();
    let mut current: Option<PrinterInfo> = None;

    for line in output.lines() {
        if let Some((name, state)) = block_start(line) {
            if let Some(done) = current.take() {
                printers.push(done);
            }
            current = Some(PrinterInfo {
                name: name.to_string(),
                status: normalize_state(state),
            });
        } else if let Some(ref mut printer) = current {
            if alert_text(line).is_some_and(|alert| alert.contains("offline")) {
                printer.status = PrinterStatus::Offline;
            }
        }
    }

    if let Some(done) = current {
        printers.push(done);
    }
    printers
}

/// Match `^printer\s+(\S+)\s+is\s+(\w+)` and return the name and state word.
fn block_start(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("printer")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut words = rest.split_whitespace();
    let name = words.next()?;
    if words.next()? != "is" {
        return None;
    }

    let word = words.next()?;
    let end = word
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(word.len());
    if end == 0 {
        return None;
    }
    Some((name, &word[..end]))
}

/// Match `^\s+Alerts:\s+(.*)` and return the alert text.
fn alert_text(line: &str) -> Option<&str> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = line.trim_start().strip_prefix("Alerts:")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

/// `idle` reads as `Ready`; anything else is capitalised as-is.
fn normalize_state(state: &str) -> PrinterStatus {
    if state == "idle" {
        return PrinterStatus::Ready;
    }
    let mut chars = state.chars();
    let capitalised = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    PrinterStatus::from(capitalised)
}

// ---------------------------------------------------------------------------
// PowerShell Get-Printer
// ---------------------------------------------------------------------------

/// `PrinterStatus` as it arrives from PowerShell, before normalisation.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum RawPrinterStatus {
    Code(i64),
    Text(String),
    #[default]
    Missing,
    /// Anything else PowerShell decides to emit (floats, objects).
    Unexpected(serde_json::Value),
}

impl RawPrinterStatus {
    pub fn normalize(self) -> PrinterStatus {
        match self {
            Self::Code(code) => PrinterStatus::from_code(code),
            Self::Text(text) => PrinterStatus::from(text),
            Self::Missing => PrinterStatus::Unknown,
            Self::Unexpected(value) => PrinterStatus::Named(value.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WindowsPrinterRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "PrinterStatus", default)]
    status: RawPrinterStatus,
}

/// `ConvertTo-Json` collapses one-element arrays into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<WindowsPrinterRecord>),
    One(WindowsPrinterRecord),
}

/// Parse the JSON emitted by
/// `@(Get-Printer | Select-Object Name, PrinterStatus) | ConvertTo-Json`.
pub fn parse_windows_printers(json: &str) -> Result<Vec<PrinterInfo>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    let records = match serde_json::from_str::<OneOrMany>(json) {
        Ok(OneOrMany::Many(records)) => records,
        Ok(OneOrMany::One(record)) => vec![record],
        Err(e) => {
            return Err(PrintBridgeError::backend(
                PrintStage::Process,
                format!("unexpected Get-Printer output: {e}"),
            ));
        }
    };

    Ok(records
        .into_iter()
        .map(|record| PrinterInfo {
            name: record.name,
            status: record.status.normalize(),
        })
        .collect())
}
