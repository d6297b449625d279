// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Routes a print job to the platform backend.
//
// PDF jobs are base64-decoded into a temp file and handed to the OS as a
// document; every other type is sent to the printer as raw bytes.  Backend
// calls block on the OS, so they run on tokio's blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Local;
use tracing::{debug, info, warn};

use printbridge_bridge::PrinterBackend;
use printbridge_core::error::{PrintBridgeError, PrintStage, Result};
use printbridge_core::types::{PrintJob, PrinterInfo, printer_label};

use crate::tempfiles::TempFileManager;

/// How long a PDF stays on disk after submission.  The OS print command
/// returns before the spooler has finished reading the file.
pub const PDF_CLEANUP_DELAY: Duration = Duration::from_secs(20);

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Printer the job went to; empty for the OS default.
    pub printer: String,
}

pub struct PrintDispatcher {
    backend: Arc<dyn PrinterBackend>,
    temp_files: TempFileManager,
    cleanup_delay: Duration,
}

impl PrintDispatcher {
    pub fn new(backend: Arc<dyn PrinterBackend>) -> Self {
        Self::with_temp_files(backend, TempFileManager::new())
    }

    pub fn with_temp_files(backend: Arc<dyn PrinterBackend>, temp_files: TempFileManager) -> Self {
        Self {
            backend,
            temp_files,
            cleanup_delay: PDF_CLEANUP_DELAY,
        }
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn backend(&self) -> &Arc<dyn PrinterBackend> {
        &self.backend
    }

    pub fn temp_files(&self) -> &TempFileManager {
        &self.temp_files
    }

    /// Print `job` and wait for the backend to accept it.
    ///
    /// For PDF jobs the temp file is scheduled for deletion whether the
    /// backend succeeded, failed, or the returned future was dropped first.
    pub async fn dispatch(&self, job: &PrintJob) -> Result<DispatchOutcome> {
        let printer = job.target_printer.clone();
        debug!(job_id = %job.id, kind = %job.kind, printer = job.printer_label(), "dispatching job");

        if job.kind.is_file_based() {
            self.print_pdf(&printer, &job.content).await?;
        } else {
            let data = job.content.clone().into_bytes();
            let backend = Arc::clone(&self.backend);
            let target = printer.clone();
            run_blocking(move || backend.print_raw(&target, &data)).await?;
        }

        info!(job_id = %job.id, kind = %job.kind, printer = printer_label(&printer), "job submitted");
        Ok(DispatchOutcome { printer })
    }

    async fn print_pdf(&self, printer: &str, encoded: &str) -> Result<()> {
        let data = decode_pdf(encoded)?;
        let path = self.temp_files.create_unique(&data, "pdf")?;
        let _cleanup = CleanupGuard {
            temp_files: &self.temp_files,
            path: Some(path.clone()),
            delay: self.cleanup_delay,
        };

        let backend = Arc::clone(&self.backend);
        let target = printer.to_string();
        run_blocking(move || backend.print_file(&target, &path)).await
    }

    /// Print a short text banner on `printer` to check it is reachable.
    pub async fn print_test_page(&self, printer: &str) -> Result<DispatchOutcome> {
        if printer.is_empty() {
            return Err(PrintBridgeError::NoPrinterSelected);
        }
        let page = test_page(printer, &Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        let backend = Arc::clone(&self.backend);
        let target = printer.to_string();
        run_blocking(move || backend.print_raw(&target, page.as_bytes())).await?;

        info!(printer, "test page submitted");
        Ok(DispatchOutcome {
            printer: printer.to_string(),
        })
    }

    /// Printers known to the OS.
    pub async fn list_printers(&self) -> Result<Vec<PrinterInfo>> {
        let backend = Arc::clone(&self.backend);
        run_blocking(move || backend.list_printers()).await
    }
}

/// Schedules deletion of a temp file when dropped, so a PDF is cleaned up
/// even if the request awaiting the print is cancelled or times out.
struct CleanupGuard<'a> {
    temp_files: &'a TempFileManager,
    path: Option<PathBuf>,
    delay: Duration,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            self.temp_files.schedule_delete(path, self.delay);
        }
    }
}

/// Decode base64 PDF content.  Line breaks inside the text are ignored, as
/// mail-style wrapped base64 is common in the wild.
fn decode_pdf(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PrintBridgeError::Decode(e.to_string()))
}

fn test_page(printer: &str, when: &str) -> String {
    format!(
        "printbridge test page\r\n\
         ====================\r\n\
         \r\n\
         Printer: {printer}\r\n\
         Time:    {when}\r\n\
         \r\n\
         If you can read this, the printer is set up correctly.\r\n\x0c"
    )
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|e| {
        warn!(error = %e, "print task did not complete");
        Err(PrintBridgeError::backend(PrintStage::Process, format!("task join: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingBackend};
    use printbridge_core::types::JobKind;

    fn dispatcher(backend: Arc<RecordingBackend>, dir: &std::path::Path) -> PrintDispatcher {
        PrintDispatcher::with_temp_files(backend, TempFileManager::in_dir(dir))
    }

    fn files_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn raw_content_goes_out_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path());

        let job = PrintJob::new(JobKind::Raw, "\x1b@Hello\n", "Label");
        let outcome = dispatcher.dispatch(&job).await.unwrap();

        assert_eq!(outcome.printer, "Label");
        assert_eq!(
            backend.calls(),
            vec![Call::Raw {
                printer: "Label".into(),
                data: b"\x1b@Hello\n".to_vec(),
            }]
        );
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn unknown_types_print_as_raw() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path());

        for kind in ["text", "zpl"] {
            let job = PrintJob::new(JobKind::parse(kind), "^XA^XZ", "");
            dispatcher.dispatch(&job).await.unwrap();
        }

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| matches!(c, Call::Raw { printer, .. } if printer.is_empty())));
    }

    #[tokio::test(start_paused = true)]
    async fn pdf_is_printed_from_a_temp_file_then_removed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path());

        let job = PrintJob::new(JobKind::Pdf, "JVBERi0xLjQK", "Office");
        dispatcher.dispatch(&job).await.unwrap();

        let path = match backend.calls().as_slice() {
            [Call::File { printer, path, data }] => {
                assert_eq!(printer, "Office");
                assert_eq!(data, b"%PDF-1.4\n");
                path.clone()
            }
            other => panic!("unexpected calls: {other:?}"),
        };
        assert!(path.exists());
        assert_eq!(dispatcher.temp_files().pending(), vec![path.clone()]);

        tokio::time::advance(PDF_CLEANUP_DELAY + Duration::from_secs(1)).await;
        for _ in 0..100 {
            if dispatcher.temp_files().pending_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_pdf_is_still_scheduled_for_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::failing(PrintStage::Process));
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path());

        let job = PrintJob::new(JobKind::Pdf, "JVBERi0xLjQK", "Office");
        let err = dispatcher.dispatch(&job).await.unwrap_err();

        assert!(matches!(err, PrintBridgeError::Backend { stage: PrintStage::Process, .. }));
        assert_eq!(dispatcher.temp_files().pending_count(), 1);
        assert_eq!(dispatcher.temp_files().purge_now(), 1);
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn abandoned_pdf_job_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::slow(Duration::from_millis(300)));
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path())
            .with_cleanup_delay(Duration::from_millis(50));

        let job = PrintJob::new(JobKind::Pdf, "JVBERi0xLjQK", "Office");
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), dispatcher.dispatch(&job)).await;

        assert!(abandoned.is_err());
        assert_eq!(dispatcher.temp_files().pending_count(), 1);

        // Let the blocking print finish reading, then the cleanup timer run.
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(dispatcher.temp_files().pending_count(), 0);
        assert_eq!(files_in(dir.path()), 0);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn bad_base64_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path());

        let job = PrintJob::new(JobKind::Pdf, "not base64!!", "Office");
        let err = dispatcher.dispatch(&job).await.unwrap_err();

        assert!(matches!(err, PrintBridgeError::Decode(_)));
        assert!(err.to_string().starts_with("failed to decode base64"));
        assert!(backend.calls().is_empty());
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn wrapped_base64_decodes() {
        assert_eq!(decode_pdf("JVBE\r\nRi0x\nLjQK").unwrap(), b"%PDF-1.4\n");
    }

    #[tokio::test]
    async fn concurrent_pdfs_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = Arc::new(dispatcher(Arc::clone(&backend), dir.path()));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let job = PrintJob::new(JobKind::Pdf, "JVBERi0xLjQK", "Office");
                    dispatcher.dispatch(&job).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut paths: Vec<_> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::File { path, .. } => Some(path),
                Call::Raw { .. } => None,
            })
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 10);
        dispatcher.temp_files().purge_now();
    }

    #[tokio::test]
    async fn test_page_requires_a_printer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let dispatcher = dispatcher(Arc::clone(&backend), dir.path());

        assert!(matches!(
            dispatcher.print_test_page("").await,
            Err(PrintBridgeError::NoPrinterSelected)
        ));

        dispatcher.print_test_page("Office").await.unwrap();
        match backend.calls().as_slice() {
            [Call::Raw { printer, data }] => {
                assert_eq!(printer, "Office");
                assert!(String::from_utf8_lossy(data).contains("Printer: Office"));
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn printers_come_from_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(Arc::new(RecordingBackend::default()), dir.path());
        let names: Vec<String> = dispatcher
            .list_printers()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Office", "Label"]);
    }
}
