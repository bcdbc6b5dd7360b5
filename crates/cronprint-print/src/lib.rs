// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cronprint Print: the IPP/1.1 binary codec and the printer client that
// carries it over HTTP. Scheduling lives in `cronprint-schedule`; this crate
// only knows how to talk to one printer.

pub mod codec;
pub mod ipp_client;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use codec::{IppMessage, IppValue};
pub use ipp_client::{ClientOptions, PrinterAttributes, PrinterClient};
