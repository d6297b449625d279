// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for printbridge.

use std::fmt;

use thiserror::Error;

/// The step of an OS-level print submission that failed.
///
/// Windows spooler submissions go through open → start-document →
/// start-page → write → end-page → end-document; command-based backends
/// only ever fail at `Process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    Open,
    StartDocument,
    StartPage,
    Write,
    EndPage,
    EndDocument,
    Process,
}

impl PrintStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::StartDocument => "start-document",
            Self::StartPage => "start-page",
            Self::Write => "write",
            Self::EndPage => "end-page",
            Self::EndDocument => "end-document",
            Self::Process => "process",
        }
    }
}

impl fmt::Display for PrintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for all printbridge operations.
#[derive(Debug, Error)]
pub enum PrintBridgeError {
    // -- Request errors --
    #[error("{0}")]
    Validation(String),

    #[error("failed to decode base64: {0}")]
    Decode(String),

    // -- Print errors --
    #[error("{stage} failed: {detail}")]
    Backend { stage: PrintStage, detail: String },

    #[error("failed to write temp file: {0}")]
    TempFile(String),

    #[error("failed to clean up temp file: {0}")]
    Cleanup(String),

    #[error("no printer selected")]
    NoPrinterSelected,

    // -- Server lifecycle --
    #[error("server is already running")]
    AlreadyRunning,

    #[error("print server error: {0}")]
    PrintServer(String),

    // -- Collaborators --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("autostart error: {0}")]
    Autostart(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl PrintBridgeError {
    /// Shorthand for a failed backend stage.
    pub fn backend(stage: PrintStage, detail: impl fmt::Display) -> Self {
        Self::Backend {
            stage,
            detail: detail.to_string(),
        }
    }

    /// Whether the error was caused by the caller's request rather than by
    /// printing or the host system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintBridgeError>;
