// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printbridge — operating-system printer backends.
//
// The rest of the workspace only sees `dyn PrinterBackend`; which variant
// sits behind it is decided once at startup by `printer_backend`.

pub mod autostart;
pub mod cups;
pub mod status;
pub mod traits;

#[cfg(windows)]
pub mod windows;

use std::sync::Arc;

use printbridge_core::error::Result;

pub use autostart::DesktopAutostart;
pub use cups::CupsBackend;
pub use traits::{Autostart, PrinterBackend};

/// The desktop platforms printbridge knows how to print on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this process is running on.  Unix flavours other than
    /// macOS are treated as Linux (they all ship CUPS).
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            _ => Self::Linux,
        }
    }
}

/// Construct the backend for `platform`.
///
/// Returns `PlatformUnavailable` when asked for the Windows backend in a
/// build that was not compiled for Windows.
pub fn printer_backend(platform: Platform) -> Result<Arc<dyn PrinterBackend>> {
    let backend: Arc<dyn PrinterBackend> = match platform {
        Platform::MacOs => Arc::new(CupsBackend::macos()),
        Platform::Linux => Arc::new(CupsBackend::linux()),
        #[cfg(windows)]
        Platform::Windows => Arc::new(windows::WindowsBackend::new()),
        #[cfg(not(windows))]
        Platform::Windows => {
            return Err(printbridge_core::error::PrintBridgeError::PlatformUnavailable);
        }
    };
    tracing::info!(backend = backend.name(), "printer backend selected");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use printbridge_core::error::PrintBridgeError;

    #[test]
    fn os_names_map_to_platforms() {
        assert_eq!(Platform::from_os("windows"), Platform::Windows);
        assert_eq!(Platform::from_os("macos"), Platform::MacOs);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(Platform::from_os("freebsd"), Platform::Linux);
    }

    #[test]
    fn unix_variants_share_cups() {
        assert_eq!(printer_backend(Platform::MacOs).unwrap().name(), "CUPS (macOS)");
        assert_eq!(printer_backend(Platform::Linux).unwrap().name(), "CUPS (Linux)");
    }

    #[cfg(not(windows))]
    #[test]
    fn windows_backend_needs_a_windows_build() {
        assert!(matches!(
            printer_backend(Platform::Windows),
            Err(PrintBridgeError::PlatformUnavailable)
        ));
    }

    #[test]
    fn detected_platform_has_a_backend() {
        assert!(printer_backend(Platform::detect()).is_ok());
    }
}
