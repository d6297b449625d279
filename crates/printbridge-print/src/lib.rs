// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printbridge — job dispatch and the local HTTP print server.

pub mod dispatcher;
pub mod events;
pub mod server;
pub mod tempfiles;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{DispatchOutcome, PDF_CLEANUP_DELAY, PrintDispatcher};
pub use events::{BroadcastSink, EventSink, NullSink, PrintEvent};
pub use server::PrintServer;
pub use tempfiles::TempFileManager;
