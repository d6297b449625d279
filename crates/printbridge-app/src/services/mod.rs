// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — wires the printbridge backend crates together for the
// binary (and for any UI shell that embeds it).

pub mod app_services;
pub mod data_dir;
