// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the cronprint dispatcher.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CronprintError, ErrorKind, Result};

/// The single network printer this process talks to.
///
/// Holds the URI exactly as configured (`ipp://`, `ipps://`, `http://` or
/// `https://`); it is sent verbatim as the `printer-uri` operation attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterEndpoint {
    pub uri: String,
}

impl PrinterEndpoint {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl std::fmt::Display for PrinterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

/// A scheduled print job as declared in configuration.
///
/// Immutable once loaded. When `test_page` is set, `file_path` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    /// Standard 5-field cron expression (or an `@daily`-style descriptor).
    pub schedule: String,
    pub file_path: Option<PathBuf>,
    pub test_page: bool,
    /// Disabled jobs are skipped at registration.
    pub enabled: bool,
}

/// What a firing sends to the printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintTarget {
    /// A generated single-page PDF labelled with the job name.
    TestPage,
    /// A document read from disk at firing time.
    File(PathBuf),
}

impl JobDefinition {
    /// Resolve which payload this job prints.
    ///
    /// A job that is neither a test-page job nor names a file is a
    /// configuration error.
    pub fn target(&self) -> Result<PrintTarget> {
        if self.test_page {
            return Ok(PrintTarget::TestPage);
        }
        match &self.file_path {
            Some(path) if !path.as_os_str().is_empty() => Ok(PrintTarget::File(path.clone())),
            _ => Err(CronprintError::config(format!(
                "job {:?} has neither a file nor the test-page flag",
                self.name
            ))),
        }
    }
}

/// Document formats cronprint sends as `document-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    PostScript,
    /// Anything else; the printer auto-detects.
    OctetStream,
}

impl DocumentFormat {
    /// MIME type string for the IPP `document-format` attribute.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PostScript => "application/postscript",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Infer the format from a path's suffix.
    ///
    /// Only the exact lower-case `.pdf` and `.ps` suffixes are recognised.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("pdf") => Self::Pdf,
            Some("ps") => Self::PostScript,
            _ => Self::OctetStream,
        }
    }
}

/// Error detail carried by a failed [`DispatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CronprintError> for DispatchError {
    fn from(err: &CronprintError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one firing of one job. Produced for logging only.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub succeeded: bool,
    pub error: Option<DispatchError>,
}

impl DispatchResult {
    pub fn from_outcome(job_name: &str, started_at: DateTime<Utc>, outcome: &Result<()>) -> Self {
        Self {
            job_name: job_name.to_string(),
            started_at,
            succeeded: outcome.is_ok(),
            error: outcome.as_ref().err().map(DispatchError::from),
        }
    }
}
