// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process fake IPP printer for tests.
//
// Listens on an ephemeral localhost port, records every request body, and
// answers according to a configurable [`PrinterBehavior`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use cronprint_core::error::Result;

use crate::codec::{
    IPP_CONTENT_TYPE, IppAttribute, IppAttributeGroup, IppMessage, IppValue,
    OP_GET_PRINTER_ATTRIBUTES, OP_PRINT_JOB, STATUS_OK, TAG_JOB_ATTRIBUTES,
    TAG_OPERATION_ATTRIBUTES, TAG_PRINTER_ATTRIBUTES, VALUE_TAG_CHARSET, VALUE_TAG_ENUM,
    VALUE_TAG_INTEGER, VALUE_TAG_KEYWORD, VALUE_TAG_NATURAL_LANGUAGE, VALUE_TAG_TEXT,
};

/// Path the fake printer serves.
const PRINTER_PATH: &str = "/ipp/print";

/// `client-error-bad-request`.
const STATUS_BAD_REQUEST: u16 = 0x0400;

/// How the fake printer answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterBehavior {
    /// `successful-ok` with plausible attributes.
    Ok,
    /// A well-formed IPP response carrying this status code.
    IppStatus(u16),
    /// An HTTP error with an empty body.
    HttpStatus(u16),
    /// HTTP 200 with a body that is not IPP.
    Garbage,
    /// Never answer.
    Stall,
}

/// One request as received by the fake printer.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    /// Decode the IPP message and return it with the document bytes.
    pub fn decode(&self) -> Result<(IppMessage, &[u8])> {
        IppMessage::decode_with_payload(&self.body)
    }
}

struct FakeState {
    behavior: Mutex<PrinterBehavior>,
    requests: Mutex<Vec<ReceivedRequest>>,
    next_job_id: AtomicI32,
}

/// A running fake printer. Stops when dropped.
pub struct FakePrinter {
    addr: SocketAddr,
    state: Arc<FakeState>,
    server: JoinHandle<()>,
}

impl FakePrinter {
    pub async fn start(behavior: PrinterBehavior) -> std::io::Result<Self> {
        let state = Arc::new(FakeState {
            behavior: Mutex::new(behavior),
            requests: Mutex::new(Vec::new()),
            next_job_id: AtomicI32::new(100),
        });
        let app = Router::new()
            .route(PRINTER_PATH, post(handle_ipp))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// `http://` URI of the printer.
    pub fn uri(&self) -> String {
        format!("http://{}{PRINTER_PATH}", self.addr)
    }

    /// `ipp://` URI of the printer, with its explicit port.
    pub fn ipp_uri(&self) -> String {
        format!("ipp://{}{PRINTER_PATH}", self.addr)
    }

    pub fn set_behavior(&self, behavior: PrinterBehavior) {
        *self
            .state
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A URI on which nothing is listening.
    pub async fn unreachable_uri() -> std::io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);
        Ok(format!("http://{addr}{PRINTER_PATH}"))
    }
}

impl Drop for FakePrinter {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_ipp(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(ReceivedRequest {
            content_type: header_value(header::CONTENT_TYPE),
            accept: header_value(header::ACCEPT),
            body: body.to_vec(),
        });

    let behavior = *state
        .behavior
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let request = match IppMessage::decode(&body) {
        Ok(request) => request,
        Err(_) => return ipp_reply(status_response(STATUS_BAD_REQUEST, 0)),
    };

    match behavior {
        PrinterBehavior::Ok => {
            let job_id = state.next_job_id.fetch_add(1, Ordering::Relaxed);
            ipp_reply(ok_response(&request, job_id))
        }
        PrinterBehavior::IppStatus(code) => {
            ipp_reply(status_response(code, request.request_id))
        }
        PrinterBehavior::HttpStatus(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        PrinterBehavior::Garbage => (
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>not an IPP printer</body></html>",
        )
            .into_response(),
        PrinterBehavior::Stall => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

fn ipp_reply(message: IppMessage) -> Response {
    match message.encode() {
        Ok(bytes) => ([(header::CONTENT_TYPE, IPP_CONTENT_TYPE)], bytes).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn operation_group() -> IppAttributeGroup {
    let mut group = IppAttributeGroup::new(TAG_OPERATION_ATTRIBUTES);
    group.attributes.push(string_attr(
        "attributes-charset",
        VALUE_TAG_CHARSET,
        "utf-8",
    ));
    group.attributes.push(string_attr(
        "attributes-natural-language",
        VALUE_TAG_NATURAL_LANGUAGE,
        "en-US",
    ));
    group
}

fn ok_response(request: &IppMessage, job_id: i32) -> IppMessage {
    let mut response = IppMessage::new(STATUS_OK, request.request_id);
    response.groups.push(operation_group());

    match request.code {
        OP_GET_PRINTER_ATTRIBUTES => {
            let mut printer = IppAttributeGroup::new(TAG_PRINTER_ATTRIBUTES);
            printer.attributes.push(IppAttribute::new(
                "printer-state",
                VALUE_TAG_ENUM,
                IppValue::Enum(3),
            ));
            printer.attributes.push(string_attr(
                "printer-state-reasons",
                VALUE_TAG_KEYWORD,
                "none",
            ));
            printer.attributes.push(string_attr(
                "printer-make-and-model",
                VALUE_TAG_TEXT,
                "Cronprint Fake Printer",
            ));
            response.groups.push(printer);
        }
        OP_PRINT_JOB => {
            let mut job = IppAttributeGroup::new(TAG_JOB_ATTRIBUTES);
            job.attributes.push(IppAttribute::new(
                "job-id",
                VALUE_TAG_INTEGER,
                IppValue::Integer(job_id),
            ));
            job.attributes.push(IppAttribute::new(
                "job-state",
                VALUE_TAG_ENUM,
                IppValue::Enum(3),
            ));
            response.groups.push(job);
        }
        _ => {}
    }
    response
}

fn status_response(code: u16, request_id: u32) -> IppMessage {
    let mut response = IppMessage::new(code, request_id);
    let mut op = operation_group();
    op.attributes.push(string_attr(
        "status-message",
        VALUE_TAG_TEXT,
        "fake printer refused the request",
    ));
    response.groups.push(op);
    response
}

fn string_attr(name: &str, value_tag: u8, value: &str) -> IppAttribute {
    IppAttribute::new(name, value_tag, IppValue::String(value.to_string()))
}
