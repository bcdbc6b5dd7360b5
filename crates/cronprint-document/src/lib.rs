// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cronprint-document: documents generated by cronprint itself.
//
// Currently a single artifact: the deterministic one-page test PDF printed by
// test-page jobs and the manual `/print-test` endpoint.

pub mod pdf;

// Re-export so callers can use `cronprint_document::generate_test_page`.
pub use pdf::test_page::generate as generate_test_page;
