// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration and its persistent store.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{PrintBridgeError, Result};

/// Default HTTP port for the print server.
pub const DEFAULT_PORT: u16 = 9999;

/// Name of the persisted settings file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured port at startup.
pub const PORT_ENV: &str = "PRINTBRIDGE_PORT";

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Printer that receives every job; empty means the OS default.
    pub selected_printer: String,
    /// Port for the HTTP print server.
    pub port: u16,
    /// Whether the server starts with the application (and the application
    /// with the user session).
    pub auto_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selected_printer: String::new(),
            port: DEFAULT_PORT,
            auto_start: false,
        }
    }
}

impl AppConfig {
    /// Apply `PRINTBRIDGE_PORT` if it is set to a valid port number.
    pub fn with_env_overrides(self) -> Self {
        self.with_port_override(std::env::var(PORT_ENV).ok().as_deref())
    }

    fn with_port_override(mut self, value: Option<&str>) -> Self {
        if let Some(port) = value.and_then(|v| v.trim().parse::<u16>().ok()) {
            if port != 0 {
                self.port = port;
            }
        }
        self
    }
}

/// Read access to the current configuration plus a single update call.
///
/// The print server reads through this on every request, so updates take
/// effect for the next job without a restart.
pub trait ConfigProvider: Send + Sync {
    fn config(&self) -> AppConfig;

    fn update(&self, selected_printer: &str, port: u16, auto_start: bool) -> Result<()>;
}

/// JSON-file backed configuration.
pub struct ConfigStore {
    /// `None` for the in-memory store used in tests.
    path: Option<PathBuf>,
    current: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Load `config.json` from `data_dir`, writing defaults if it does not
    /// exist yet.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let config = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                PrintBridgeError::Config(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = AppConfig::default();
                persist(&path, &defaults)?;
                defaults
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(config),
        })
    }

    /// Defaults backed by `config.json` in `data_dir`, leaving any existing
    /// file untouched until the next `update` replaces it.
    pub fn with_defaults(data_dir: &Path) -> Self {
        Self {
            path: Some(data_dir.join(CONFIG_FILE)),
            current: RwLock::new(AppConfig::default()),
        }
    }

    /// A store that never touches the disk.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            path: None,
            current: RwLock::new(config),
        }
    }

    /// Location of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the in-memory value without persisting it (startup overrides).
    pub fn set_transient(&self, config: AppConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

impl ConfigProvider for ConfigStore {
    fn config(&self) -> AppConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, selected_printer: &str, port: u16, auto_start: bool) -> Result<()> {
        let config = AppConfig {
            selected_printer: selected_printer.to_string(),
            port,
            auto_start,
        };
        if let Some(ref path) = self.path {
            persist(path, &config)?;
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }
}

fn persist(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
