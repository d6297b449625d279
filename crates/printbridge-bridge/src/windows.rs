// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windows backend.
//
// Raw jobs go straight into the spooler (winspool) as a RAW datatype
// document; file jobs use the shell "print" verb through PowerShell so the
// registered handler for the file type (e.g. the PDF reader) renders it.
// Enumeration asks PowerShell for `Get-Printer` as JSON.

use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::ERROR_INSUFFICIENT_BUFFER;
use windows_sys::Win32::Graphics::Printing::{
    ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, GetDefaultPrinterW, OpenPrinterW,
    PRINTER_HANDLE, StartDocPrinterW, StartPagePrinter, WritePrinter,
};

use printbridge_core::error::{PrintBridgeError, PrintStage, Result};
use printbridge_core::types::{PrinterInfo, printer_label};

use crate::status::parse_windows_printers;
use crate::traits::PrinterBackend;

/// Process creation flag that suppresses the console window.
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Document name shown in the spooler queue.
const DOCUMENT_NAME: &str = "printbridge document";

const LIST_PRINTERS_SCRIPT: &str =
    "@(Get-Printer | Select-Object Name, PrinterStatus) | ConvertTo-Json";

/// Spooler + PowerShell backend.
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// A PowerShell invocation that never flashes a console window.
fn hidden_powershell(script: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command", script])
        .stdin(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW);
    cmd
}

fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn last_error() -> std::io::Error {
    std::io::Error::last_os_error()
}

/// Name of the user's default printer.
fn default_printer() -> Result<String> {
    let mut len: u32 = 0;
    // SAFETY: a null buffer with zero length only queries the required size.
    let ok = unsafe { GetDefaultPrinterW(std::ptr::null_mut(), &mut len) };
    if ok == 0 {
        let err = last_error();
        if err.raw_os_error() != Some(ERROR_INSUFFICIENT_BUFFER as i32) {
            return Err(PrintBridgeError::backend(
                PrintStage::Open,
                format!("no default printer: {err}"),
            ));
        }
    }

    let mut buf = vec![0u16; len as usize];
    // SAFETY: `buf` holds `len` UTF-16 units as reported by the first call.
    let ok = unsafe { GetDefaultPrinterW(buf.as_mut_ptr(), &mut len) };
    if ok == 0 {
        return Err(PrintBridgeError::backend(
            PrintStage::Open,
            format!("no default printer: {}", last_error()),
        ));
    }

    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    Ok(String::from_utf16_lossy(&buf[..end]))
}

/// An open spooler handle, closed on drop.
struct Spooler {
    handle: PRINTER_HANDLE,
}

impl Spooler {
    fn open(name: &str) -> Result<Self> {
        let name_w = wide(name);
        // SAFETY: PRINTER_HANDLE is a plain handle value; all-zero is the
        // "no handle" state that OpenPrinterW overwrites on success.
        let mut handle: PRINTER_HANDLE = unsafe { std::mem::zeroed() };
        // SAFETY: `name_w` is NUL-terminated and outlives the call.
        let ok = unsafe { OpenPrinterW(name_w.as_ptr(), &mut handle, std::ptr::null()) };
        if ok == 0 {
            return Err(PrintBridgeError::backend(
                PrintStage::Open,
                format!("failed to open printer '{name}': {}", last_error()),
            ));
        }
        Ok(Self { handle })
    }

    fn check(&self, ok: bool, stage: PrintStage) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(PrintBridgeError::backend(stage, last_error()))
        }
    }

    /// Frame `data` as one RAW document with a single page.
    fn write_document(&self, data: &[u8]) -> Result<()> {
        let mut doc_name = wide(DOCUMENT_NAME);
        let mut datatype = wide("RAW");
        let info = DOC_INFO_1W {
            pDocName: doc_name.as_mut_ptr(),
            pOutputFile: std::ptr::null_mut(),
            pDatatype: datatype.as_mut_ptr(),
        };

        // SAFETY: `info` and the strings it points to live across the call.
        let job = unsafe { StartDocPrinterW(self.handle, 1, &info) };
        self.check(job != 0, PrintStage::StartDocument)?;

        // SAFETY: handle is open and a document has been started.
        let ok = unsafe { StartPagePrinter(self.handle) };
        if let Err(e) = self.check(ok != 0, PrintStage::StartPage) {
            // SAFETY: closes the document started above.
            unsafe { EndDocPrinter(self.handle) };
            return Err(e);
        }

        let mut written: u32 = 0;
        // SAFETY: `data` is valid for `data.len()` bytes for the duration of the call.
        let ok = unsafe {
            WritePrinter(
                self.handle,
                data.as_ptr().cast(),
                data.len() as u32,
                &mut written,
            )
        };
        let write_result = if ok == 0 {
            Err(PrintBridgeError::backend(PrintStage::Write, last_error()))
        } else if written as usize != data.len() {
            Err(PrintBridgeError::backend(
                PrintStage::Write,
                format!("short write: {written} of {} bytes", data.len()),
            ))
        } else {
            Ok(())
        };
        if let Err(e) = write_result {
            // SAFETY: unwinds the page and document started above.
            unsafe {
                EndPagePrinter(self.handle);
                EndDocPrinter(self.handle);
            }
            return Err(e);
        }

        // SAFETY: a page is open on this handle.
        let ok = unsafe { EndPagePrinter(self.handle) };
        if let Err(e) = self.check(ok != 0, PrintStage::EndPage) {
            // SAFETY: closes the document started above.
            unsafe { EndDocPrinter(self.handle) };
            return Err(e);
        }

        // SAFETY: a document is open on this handle.
        let ok = unsafe { EndDocPrinter(self.handle) };
        self.check(ok != 0, PrintStage::EndDocument)
    }
}

impl Drop for Spooler {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful OpenPrinterW.
        if unsafe { ClosePrinter(self.handle) } == 0 {
            warn!(error = %last_error(), "ClosePrinter failed");
        }
    }
}

/// Quote a path for a single-quoted PowerShell string literal.
fn ps_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

impl PrinterBackend for WindowsBackend {
    fn name(&self) -> &str {
        "Windows spooler"
    }

    fn list_printers(&self) -> Result<Vec<PrinterInfo>> {
        let output = hidden_powershell(LIST_PRINTERS_SCRIPT)
            .output()
            .map_err(|e| PrintBridgeError::backend(PrintStage::Process, format!("powershell: {e}")))?;

        if !output.status.success() {
            return Err(PrintBridgeError::backend(
                PrintStage::Process,
                format!(
                    "Get-Printer exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let printers = parse_windows_printers(&String::from_utf8_lossy(&output.stdout))?;
        debug!(count = printers.len(), "enumerated Windows printers");
        Ok(printers)
    }

    fn print_raw(&self, printer: &str, data: &[u8]) -> Result<()> {
        let name = if printer.is_empty() {
            default_printer()?
        } else {
            printer.to_string()
        };

        let spooler = Spooler::open(&name)?;
        spooler.write_document(data)?;

        info!(printer = printer_label(printer), bytes = data.len(), "raw job sent to spooler");
        Ok(())
    }

    fn print_file(&self, printer: &str, path: &Path) -> Result<()> {
        // The print verb always targets the default printer; the handler
        // application decides what to do with a named one.
        let script = format!(
            "Start-Process -FilePath {} -Verb Print -WindowStyle Hidden",
            ps_quote(path)
        );
        let output = hidden_powershell(&script)
            .output()
            .map_err(|e| PrintBridgeError::backend(PrintStage::Process, format!("powershell: {e}")))?;

        if !output.status.success() {
            return Err(PrintBridgeError::backend(
                PrintStage::Process,
                format!(
                    "Start-Process exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        info!(printer = printer_label(printer), path = %path.display(), "file job handed to print verb");
        Ok(())
    }
}
