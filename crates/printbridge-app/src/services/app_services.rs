// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — builds the backend, dispatcher and print server
// once at startup and exposes the operations a settings window or tray
// menu would call.
//
// The HTTP server reads the configuration through the same `ConfigStore`
// that `save_config` writes, so a newly selected printer applies to the
// next request without restarting the server.

use std::path::Path;
use std::sync::Arc;

use printbridge_bridge::{Autostart, DesktopAutostart, Platform, PrinterBackend, printer_backend};
use printbridge_core::config::{AppConfig, ConfigProvider, ConfigStore};
use printbridge_core::error::Result;
use printbridge_core::types::{PrinterInfo, ServerStatus};
use printbridge_print::{BroadcastSink, PrintDispatcher, PrintEvent, PrintServer, TempFileManager};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Name used for the login-item registration.
const APP_NAME: &str = "printbridge";

/// Shared application services.
///
/// All fields are cheaply cloneable (Arc-wrapped) so that the struct can be
/// moved into tasks and signal handlers freely.
#[derive(Clone)]
pub struct AppServices {
    dispatcher: Arc<PrintDispatcher>,
    server: Arc<PrintServer>,
    config: Arc<ConfigStore>,
    autostart: Arc<dyn Autostart>,
    events: Arc<BroadcastSink>,
}

impl AppServices {
    /// Initialise all services for the current platform.  Call once at
    /// startup.
    ///
    /// A corrupt configuration file is logged and replaced by defaults; the
    /// next `save_config` overwrites it on disk.
    pub fn init(data_dir: &Path) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising app services");

        let store = load_config_store(data_dir);
        store.set_transient(store.config().with_env_overrides());

        let platform = Platform::detect();
        let backend = printer_backend(platform)?;
        let autostart = DesktopAutostart::for_current_exe(platform, APP_NAME)?;

        info!("app services initialised");
        Ok(Self::new(
            backend,
            Arc::new(store),
            Arc::new(autostart),
            TempFileManager::new(),
        ))
    }

    /// Assemble services from explicit parts.
    pub fn new(
        backend: Arc<dyn PrinterBackend>,
        config: Arc<ConfigStore>,
        autostart: Arc<dyn Autostart>,
        temp_files: TempFileManager,
    ) -> Self {
        let dispatcher = Arc::new(PrintDispatcher::with_temp_files(backend, temp_files));
        let events = Arc::new(BroadcastSink::default());
        let server = Arc::new(PrintServer::new(
            Arc::clone(&dispatcher),
            Arc::clone(&config) as Arc<dyn ConfigProvider>,
            Arc::clone(&events) as Arc<dyn printbridge_print::EventSink>,
        ));

        Self {
            dispatcher,
            server,
            config,
            autostart,
            events,
        }
    }

    // -- Printers -----------------------------------------------------------

    /// Printers known to the OS.
    pub async fn printers(&self) -> Result<Vec<PrinterInfo>> {
        self.dispatcher.list_printers().await
    }

    // -- Server -------------------------------------------------------------

    pub fn start_server(&self, port: u16) -> Result<()> {
        self.server.start(port)
    }

    pub async fn stop_server(&self) -> Result<()> {
        self.server.stop().await
    }

    pub fn is_server_running(&self) -> bool {
        self.server.is_running()
    }

    /// Job notifications from the print server.
    pub fn subscribe(&self) -> broadcast::Receiver<PrintEvent> {
        self.events.subscribe()
    }

    // -- Config -------------------------------------------------------------

    pub fn config(&self) -> AppConfig {
        self.config.config()
    }

    // -- Autostart ----------------------------------------------------------

    pub fn autostart_enabled(&self) -> bool {
        self.autostart.is_enabled()
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Stop the server and remove temp files still waiting on a timer.
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop_server().await {
            warn!(error = %e, "print server did not stop cleanly");
        }
        self.dispatcher.temp_files().purge_now();
        info!("printbridge shutdown");
    }
}

// Settings-window operations; the headless binary never calls them.
#[allow(dead_code)]
impl AppServices {
    /// Print a test page on the selected printer.
    pub async fn print_test_page(&self) -> Result<()> {
        let printer = self.config.config().selected_printer;
        info!(printer = %printer, "printing test page");
        self.dispatcher.print_test_page(&printer).await?;
        Ok(())
    }

    pub fn server_status(&self) -> ServerStatus {
        self.server.status()
    }

    /// Apply the autostart preference, then persist the settings.
    ///
    /// An autostart failure is logged but does not prevent saving.
    pub fn save_config(&self, selected_printer: &str, port: u16, auto_start: bool) -> Result<()> {
        if let Err(e) = self.autostart.toggle(auto_start) {
            error!(error = %e, "failed to toggle autostart");
        }
        self.config.update(selected_printer, port, auto_start)?;
        info!(printer = selected_printer, port, auto_start, "config saved");
        Ok(())
    }

    pub fn set_autostart(&self, enabled: bool) -> Result<()> {
        self.autostart.toggle(enabled)
    }
}

/// Load the settings file, falling back to defaults that still write back
/// to it when the file cannot be parsed.
fn load_config_store(data_dir: &Path) -> ConfigStore {
    match ConfigStore::load(data_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "config unreadable, using defaults");
            ConfigStore::with_defaults(data_dir)
        }
    }
}
