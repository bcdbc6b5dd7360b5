// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for cronprint.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all cronprint operations.
#[derive(Debug, Error)]
pub enum CronprintError {
    // -- Startup errors (fatal) --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid schedule {expression:?}: {reason}")]
    Schedule { expression: String, reason: String },

    // -- Per-firing errors --
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The printer answered with a well-formed response carrying a
    /// non-success IPP status.
    #[error("IPP error: {status}{}", detail_suffix(.message))]
    Protocol {
        status: String,
        message: Option<String>,
    },

    #[error("decode IPP response: {0}")]
    Decode(String),

    #[error("encode IPP request: {0}")]
    Encode(String),

    #[error("open file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

/// Failure to complete the HTTP round-trip to the printer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, TLS failure, broken body stream.
    #[error("HTTP request: {0}")]
    Request(String),

    /// The printer's HTTP layer answered with a non-2xx status.
    #[error("HTTP {0}")]
    Status(String),

    #[error("HTTP request: deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Error taxonomy used for logging and for deciding what is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Schedule,
    Transport,
    Protocol,
    /// Request encoding or response decoding.
    Codec,
    Io,
}

impl ErrorKind {
    /// Startup categories abort the process; everything else is contained to
    /// a single firing or HTTP request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config | Self::Schedule)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Schedule => "schedule",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Codec => "codec",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CronprintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Schedule { .. } => ErrorKind::Schedule,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Decode(_) | Self::Encode(_) => ErrorKind::Codec,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Shorthand for [`CronprintError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CronprintError>;
