// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the printbridge relay.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a print job, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared payload type of a print request.
///
/// Anything that is not `pdf` is forwarded to the printer verbatim, so
/// unknown names are kept as `Other` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// Base64-encoded PDF, printed from a temporary file.
    Pdf,
    /// Printer-native bytes (ESC/POS, ZPL, PCL, ...).
    Raw,
    /// Plain text.
    Text,
    /// Unrecognised type name; handled like `Raw`.
    Other(String),
}

impl JobKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "pdf" => Self::Pdf,
            "raw" => Self::Raw,
            "text" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Raw => "raw",
            Self::Text => "text",
            Self::Other(name) => name,
        }
    }

    /// Whether the job goes through a temporary file instead of a raw stream.
    pub fn is_file_based(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded print request awaiting dispatch.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub kind: JobKind,
    /// Base64 text for `Pdf`, literal payload otherwise.
    pub content: String,
    /// Destination queue; empty means the OS default printer.
    pub target_printer: String,
}

impl PrintJob {
    pub fn new(kind: JobKind, content: impl Into<String>, target_printer: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            kind,
            content: content.into(),
            target_printer: target_printer.into(),
        }
    }

    /// Printer name for log output.
    pub fn printer_label(&self) -> &str {
        printer_label(&self.target_printer)
    }
}

/// Render an empty printer name as `default`.
pub fn printer_label(name: &str) -> &str {
    if name.is_empty() { "default" } else { name }
}

/// Normalised printer state reported by backend enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrinterStatus {
    Other,
    Error,
    Ready,
    Printing,
    Warmup,
    Stopped,
    Offline,
    Unknown,
    /// Numeric status code outside the known range.
    Code(i64),
    /// Any other state text, kept verbatim (e.g. `Disabled`).
    Named(String),
}

impl PrinterStatus {
    /// Map a Win32_Printer `PrinterStatus` code.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Other,
            2 => Self::Error,
            3 => Self::Ready,
            4 => Self::Printing,
            5 => Self::Warmup,
            6 => Self::Stopped,
            7 => Self::Offline,
            other => Self::Code(other),
        }
    }
}

impl std::fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other => f.write_str("Other"),
            Self::Error => f.write_str("Error"),
            Self::Ready => f.write_str("Ready"),
            Self::Printing => f.write_str("Printing"),
            Self::Warmup => f.write_str("Warmup"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Offline => f.write_str("Offline"),
            Self::Unknown => f.write_str("Unknown"),
            Self::Code(code) => write!(f, "Status {code}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<String> for PrinterStatus {
    fn from(text: String) -> Self {
        match text.as_str() {
            "Other" => Self::Other,
            "Error" => Self::Error,
            "Ready" => Self::Ready,
            "Printing" => Self::Printing,
            "Warmup" => Self::Warmup,
            "Stopped" => Self::Stopped,
            "Offline" => Self::Offline,
            "Unknown" => Self::Unknown,
            _ => match text.strip_prefix("Status ").and_then(|n| n.parse().ok()) {
                Some(code) => Self::Code(code),
                None => Self::Named(text),
            },
        }
    }
}

impl From<PrinterStatus> for String {
    fn from(status: PrinterStatus) -> Self {
        status.to_string()
    }
}

/// A printer known to the operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterInfo {
    pub name: String,
    pub status: PrinterStatus,
}

/// Lifecycle phase of the HTTP print server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_kind_keeps_unknown_names() {
        assert_eq!(JobKind::parse("pdf"), JobKind::Pdf);
        assert_eq!(JobKind::parse("text"), JobKind::Text);
        let weird = JobKind::parse("weird");
        assert_eq!(weird, JobKind::Other("weird".into()));
        assert_eq!(weird.as_str(), "weird");
        assert!(!weird.is_file_based());
        assert!(JobKind::Pdf.is_file_based());
    }

    #[test]
    fn status_codes_map_to_names() {
        assert_eq!(PrinterStatus::from_code(3).to_string(), "Ready");
        assert_eq!(PrinterStatus::from_code(7).to_string(), "Offline");
        assert_eq!(PrinterStatus::from_code(42).to_string(), "Status 42");
        assert_eq!(PrinterStatus::from_code(0).to_string(), "Status 0");
    }

    #[test]
    fn printer_info_serializes_status_as_text() {
        let info = PrinterInfo {
            name: "Zebra".into(),
            status: PrinterStatus::Code(9),
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"name":"Zebra","status":"Status 9"}"#);

        let back: PrinterInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn empty_printer_is_labelled_default() {
        let job = PrintJob::new(JobKind::Raw, "hello", "");
        assert_eq!(job.printer_label(), "default");
        assert_eq!(printer_label("Office"), "Office");
    }
}
