// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.
//
// Every method here may block on the OS (spawning `lp`, talking to the
// spooler), so async callers should run them on a blocking thread.

use std::path::Path;

use printbridge_core::error::Result;
use printbridge_core::types::PrinterInfo;

/// Printer enumeration and job submission for one operating system.
pub trait PrinterBackend: Send + Sync {
    /// Human-readable backend name (e.g. "Windows spooler", "CUPS (macOS)").
    fn name(&self) -> &str;

    /// Printers known to the OS, in the order the OS reports them.
    fn list_printers(&self) -> Result<Vec<PrinterInfo>>;

    /// Send printer-native bytes straight to `printer`.
    ///
    /// An empty `printer` targets the OS default printer.
    fn print_raw(&self, printer: &str, data: &[u8]) -> Result<()>;

    /// Hand a document on disk to the OS print facility.
    ///
    /// An empty `printer` targets the OS default printer.
    fn print_file(&self, printer: &str, path: &Path) -> Result<()>;
}

/// Start-with-the-user-session registration.
pub trait Autostart: Send + Sync {
    /// Whether the application is currently registered to start at login.
    fn is_enabled(&self) -> bool;

    /// Register (`true`) or unregister (`false`) the application.
    fn toggle(&self, enabled: bool) -> Result<()>;
}
