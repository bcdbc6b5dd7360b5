// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async IPP client bound to one network printer.
//
// Each operation is exactly one HTTP POST to the printer carrying an
// `application/ipp` body:
//   - Get-Printer-Attributes  (RFC 8011 §4.2.5)
//   - Print-Job               (RFC 8011 §4.2.1), document bytes appended
//
// No operation retries. Every round-trip runs under a caller-supplied
// deadline; running out of time is a transport error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};
use url::Url;

use cronprint_core::error::{CronprintError, Result, TransportError};
use cronprint_core::types::{DocumentFormat, PrinterEndpoint};

use crate::codec::{self, IPP_CONTENT_TYPE, IppMessage, IppValue, TAG_JOB_ATTRIBUTES};

/// IANA-assigned port for IPP, used when an `ipp://` URI names none.
pub const IPP_PORT: u16 = 631;

/// Attributes returned by Get-Printer-Attributes, flattened to
/// `name -> display string`.
pub type PrinterAttributes = HashMap<String, String>;

/// Construction options for [`PrinterClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// `requesting-user-name` sent with every Print-Job.
    pub user_name: String,
    /// Accept self-signed certificates on `ipps://` / `https://` printers.
    pub accept_invalid_certs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_name: "cronprint".into(),
            accept_invalid_certs: false,
        }
    }
}

/// Client for a single printer endpoint.
///
/// Safe to share between tasks; the underlying HTTP connection pool is
/// reused by concurrent calls.
pub struct PrinterClient {
    endpoint: PrinterEndpoint,
    /// Where requests are POSTed (`ipp` -> `http`, `ipps` -> `https`).
    http_url: Url,
    http: reqwest::Client,
    user_name: String,
    next_request_id: AtomicU32,
}

impl PrinterClient {
    pub fn new(endpoint: PrinterEndpoint, options: ClientOptions) -> Result<Self> {
        let http_url = http_url(&endpoint.uri)?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| CronprintError::config(format!("HTTP client: {e}")))?;

        debug!(printer = %endpoint, url = %http_url, "printer client ready");
        Ok(Self {
            endpoint,
            http_url,
            http,
            user_name: options.user_name,
            next_request_id: AtomicU32::new(1),
        })
    }

    pub fn endpoint(&self) -> &PrinterEndpoint {
        &self.endpoint
    }

    /// The HTTP(S) URL requests are sent to.
    pub fn http_url(&self) -> &Url {
        &self.http_url
    }

    /// Query the printer's state, state reasons and model.
    #[instrument(skip(self, timeout), fields(printer = %self.endpoint))]
    pub async fn get_attributes(&self, timeout: Duration) -> Result<PrinterAttributes> {
        let request =
            codec::get_printer_attributes_request(self.request_id(), &self.endpoint.uri);
        let body = request.encode()?;

        debug!(request_id = request.request_id, "sending Get-Printer-Attributes");
        let response = self.round_trip(body.into(), None, timeout).await?;

        let attrs = response.flatten();
        debug!(count = attrs.len(), "received printer attributes");
        Ok(attrs)
    }

    /// Submit the file at `path`, streaming it straight from disk.
    ///
    /// The document format is derived from the file suffix.
    #[instrument(skip(self, path, timeout), fields(printer = %self.endpoint, path = %path.display()))]
    pub async fn print_file(&self, path: &Path, job_name: &str, timeout: Duration) -> Result<()> {
        let io_error = |source| CronprintError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let meta = file.metadata().await.map_err(io_error)?;
        if !meta.is_file() {
            return Err(io_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let file_len = meta.len();

        let format = DocumentFormat::from_path(path);
        let request = codec::print_job_request(
            self.request_id(),
            &self.endpoint.uri,
            &self.user_name,
            job_name,
            format,
        );
        let header = request.encode()?;
        let content_length = header.len() as u64 + file_len;

        let hasher = Arc::new(Mutex::new(Sha256::new()));
        // reqwest only reports a failing body as a send error; keep the
        // underlying read error so it surfaces as an I/O failure.
        let read_error: Arc<Mutex<Option<std::io::Error>>> = Arc::new(Mutex::new(None));
        let document = {
            let hasher = Arc::clone(&hasher);
            let read_error = Arc::clone(&read_error);
            ReaderStream::new(file)
                .inspect_ok(move |chunk| {
                    hasher
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .update(chunk);
                })
                .inspect_err(move |e| {
                    read_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .get_or_insert_with(|| std::io::Error::new(e.kind(), e.to_string()));
                })
        };
        let body = stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(header)) })
            .chain(document);

        info!(
            mime = format.mime_type(),
            bytes = file_len,
            request_id = request.request_id,
            "sending Print-Job"
        );
        let outcome = self
            .round_trip(
                reqwest::Body::wrap_stream(body),
                Some(content_length),
                timeout,
            )
            .await;
        let read_failure = read_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(source) = read_failure {
            return Err(io_error(source));
        }
        let response = outcome?;

        let digest = std::mem::take(&mut *hasher.lock().unwrap_or_else(PoisonError::into_inner))
            .finalize();
        log_accepted(&response, job_name, &hex::encode(digest));
        Ok(())
    }

    /// Generate a test page labelled with `job_name` and submit it as PDF.
    #[instrument(skip(self, timeout), fields(printer = %self.endpoint))]
    pub async fn print_test_page(&self, job_name: &str, timeout: Duration) -> Result<()> {
        let document = cronprint_document::generate_test_page(job_name);
        let request = codec::print_job_request(
            self.request_id(),
            &self.endpoint.uri,
            &self.user_name,
            job_name,
            DocumentFormat::Pdf,
        );
        let body = request.encode_with_document(&document)?;

        info!(
            bytes = document.len(),
            request_id = request.request_id,
            "sending Print-Job (test page)"
        );
        let response = self.round_trip(body.into(), None, timeout).await?;

        log_accepted(&response, job_name, &hex::encode(Sha256::digest(&document)));
        Ok(())
    }

    // -- Internals ---------------------------------------------------------

    fn request_id(&self) -> u32 {
        // Request ids are positive; skip 0 if the counter ever wraps.
        self.next_request_id.fetch_add(1, Ordering::Relaxed).max(1)
    }

    /// POST `body` and decode the reply, under `timeout`.
    ///
    /// Any status other than `successful-ok` becomes a protocol error.
    async fn round_trip(
        &self,
        body: reqwest::Body,
        content_length: Option<u64>,
        timeout: Duration,
    ) -> Result<IppMessage> {
        let response = tokio::time::timeout(timeout, self.exchange(body, content_length))
            .await
            .map_err(|_| TransportError::DeadlineExceeded(timeout))??;

        if !response.is_successful_ok() {
            let status = response.status_name().into_owned();
            let message = response.status_message();
            warn!(status = %status, message = ?message, "printer rejected request");
            return Err(CronprintError::Protocol { status, message });
        }
        Ok(response)
    }

    async fn exchange(&self, body: reqwest::Body, content_length: Option<u64>) -> Result<IppMessage> {
        let mut request = self
            .http
            .post(self.http_url.clone())
            .header(CONTENT_TYPE, IPP_CONTENT_TYPE)
            .header(ACCEPT, IPP_CONTENT_TYPE);
        // Streamed bodies would otherwise go out chunked, which many
        // printers reject.
        if let Some(len) = content_length {
            request = request.header(CONTENT_LENGTH, len);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Request(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.to_string()).into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(error_chain(&e)))?;
        IppMessage::decode(&bytes)
    }
}

/// Translate a printer URI into the HTTP URL its requests are POSTed to.
///
/// `ipp://` becomes `http://` and `ipps://` becomes `https://`, both
/// defaulting to port 631. `http://` and `https://` are used unchanged.
pub fn http_url(uri: &str) -> Result<Url> {
    let invalid = |reason: String| CronprintError::config(format!("printer URI {uri:?}: {reason}"));

    let parsed = Url::parse(uri).map_err(|e| invalid(e.to_string()))?;
    let scheme = match parsed.scheme() {
        "http" | "https" => return Ok(parsed),
        "ipp" => "http",
        "ipps" => "https",
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    };
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }

    // `Url::set_scheme` will not switch between special and non-special
    // schemes, so rebuild from everything after `scheme://`.
    let rest = &parsed[url::Position::BeforeUsername..];
    let mut url =
        Url::parse(&format!("{scheme}://{rest}")).map_err(|e| invalid(e.to_string()))?;
    if parsed.port().is_none() {
        url.set_port(Some(IPP_PORT))
            .map_err(|()| invalid("cannot set port".into()))?;
    }
    Ok(url)
}

fn log_accepted(response: &IppMessage, job_name: &str, sha256: &str) {
    let job_id = response
        .group(TAG_JOB_ATTRIBUTES)
        .and_then(|g| g.get("job-id"))
        .and_then(|a| a.first())
        .and_then(IppValue::as_i32);
    info!(job = job_name, job_id = ?job_id, sha256, "print job accepted by printer");
}

/// `reqwest` errors hide the useful part (refused, DNS, TLS) in `source()`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
