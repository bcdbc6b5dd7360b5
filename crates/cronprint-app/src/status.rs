// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Status API: health of the printer, the schedule, and a manual test print.
//
//   GET  /healthz      printer reachability plus attributes
//   GET  /jobs         scheduled entries with next/previous fire times
//   POST /print-test   print a test page now

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cronprint_print::{PrinterAttributes, PrinterClient};
use cronprint_schedule::{EntryId, JobScheduler};

/// Job name used for prints triggered through `/print-test`.
pub const MANUAL_JOB_NAME: &str = "manual-test";

const SERVICE_NAME: &str = "cronprint";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<PrinterClient>,
    pub scheduler: Arc<JobScheduler>,
    pub printer_uri: String,
    /// Deadline for the printer calls a handler makes.
    pub timeout: Duration,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    printer: String,
    printer_ok: bool,
    attributes: Option<PrinterAttributes>,
    jobs: usize,
}

#[derive(Serialize)]
struct JobResponse {
    id: EntryId,
    name: String,
    schedule: String,
    next_run: Option<DateTime<FixedOffset>>,
    prev_run: Option<DateTime<FixedOffset>>,
}

#[derive(Serialize)]
struct PrintTestResponse {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/jobs", get(list_jobs_handler))
        .route("/print-test", post(print_test_handler))
        .with_state(state)
}

/// Serve the status API until `cancel` fires, then allow in-flight requests
/// up to `grace` to finish before returning.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = cancel.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            info!("status API drained");
            result
        }
        Err(_) => {
            warn!(grace = ?grace, "status API did not drain in time, closing");
            Ok(())
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let attributes = match state.client.get_attributes(state.timeout).await {
        Ok(attrs) => Some(attrs),
        Err(e) => {
            warn!(printer = %state.printer_uri, error = %e, "printer health check failed");
            None
        }
    };
    let printer_ok = attributes.is_some();

    Json(HealthResponse {
        status: if printer_ok { "healthy" } else { "degraded" },
        service: SERVICE_NAME,
        printer: state.printer_uri.clone(),
        printer_ok,
        attributes,
        jobs: state.scheduler.len(),
    })
}

async fn list_jobs_handler(State(state): State<AppState>) -> impl IntoResponse {
    let jobs: Vec<JobResponse> = state
        .scheduler
        .entries()
        .into_iter()
        .map(|entry| JobResponse {
            id: entry.id,
            name: entry.name,
            schedule: entry.schedule,
            next_run: entry.next_fire,
            prev_run: entry.prev_fire,
        })
        .collect();

    Json(jobs)
}

async fn print_test_handler(State(state): State<AppState>) -> Response {
    match state
        .client
        .print_test_page(MANUAL_JOB_NAME, state.timeout)
        .await
    {
        Ok(()) => {
            info!("manual test page printed");
            Json(PrintTestResponse { status: "ok" }).into_response()
        }
        Err(e) => {
            warn!(error = %e, "manual test page failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use futures::FutureExt;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use cronprint_core::types::PrinterEndpoint;
    use cronprint_print::ClientOptions;
    use cronprint_print::codec::{OP_PRINT_JOB, TAG_OPERATION_ATTRIBUTES};
    use cronprint_print::testing::{FakePrinter, PrinterBehavior};
    use cronprint_schedule::JobCallback;

    fn state_for(uri: &str) -> AppState {
        let client = PrinterClient::new(PrinterEndpoint::new(uri), ClientOptions::default()).unwrap();
        AppState {
            client: Arc::new(client),
            scheduler: Arc::new(JobScheduler::new("America/New_York").unwrap()),
            printer_uri: uri.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn noop() -> JobCallback {
        Arc::new(|| async {}.boxed())
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn get_json(app: Router, uri: &str) -> Value {
        let (status, body) = send(app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_healthy_with_reachable_printer() {
        let printer = FakePrinter::start(PrinterBehavior::Ok).await.unwrap();
        let state = state_for(&printer.uri());
        state
            .scheduler
            .add_job("daily", "0 9 * * *", noop())
            .unwrap();

        let json = get_json(router(state), "/healthz").await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "cronprint");
        assert_eq!(json["printer"], printer.uri());
        assert_eq!(json["printer_ok"], true);
        assert_eq!(json["jobs"], 1);
        assert_eq!(json["attributes"]["printer-state"], "3");
        assert_eq!(
            json["attributes"]["printer-make-and-model"],
            "Cronprint Fake Printer"
        );
    }

    #[tokio::test]
    async fn healthz_degrades_when_printer_unreachable() {
        let uri = FakePrinter::unreachable_uri().await.unwrap();
        let app = router(state_for(&uri));

        let json = get_json(app.clone(), "/healthz").await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["printer_ok"], false);
        assert!(json["attributes"].is_null());

        // Still serving after the failure.
        let jobs = get_json(app, "/jobs").await;
        assert!(jobs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn healthz_recovers_when_printer_comes_back() {
        let printer = FakePrinter::start(PrinterBehavior::HttpStatus(503))
            .await
            .unwrap();
        let app = router(state_for(&printer.uri()));

        let json = get_json(app.clone(), "/healthz").await;
        assert_eq!(json["status"], "degraded");

        printer.set_behavior(PrinterBehavior::Ok);
        let json = get_json(app, "/healthz").await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["printer_ok"], true);
        assert_eq!(printer.requests().len(), 2);
    }

    #[tokio::test]
    async fn healthz_degrades_on_ipp_error() {
        let printer = FakePrinter::start(PrinterBehavior::IppStatus(0x0406))
            .await
            .unwrap();
        let json = get_json(router(state_for(&printer.uri())), "/healthz").await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["printer_ok"], false);
    }

    #[tokio::test]
    async fn jobs_lists_entries_before_first_fire() {
        let state = state_for("http://127.0.0.1:9/ipp/print");
        let id = state
            .scheduler
            .add_job("daily", "0 9 * * *", noop())
            .unwrap();

        let json = get_json(router(state), "/jobs").await;
        let jobs = json.as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["id"], id.to_string());
        assert_eq!(jobs[0]["name"], "daily");
        assert_eq!(jobs[0]["schedule"], "0 9 * * *");
        assert!(jobs[0]["prev_run"].is_null());

        let next = jobs[0]["next_run"].as_str().unwrap();
        let next = DateTime::parse_from_rfc3339(next).unwrap();
        assert!(next.to_rfc3339().contains("T09:00:00"));
    }

    #[tokio::test]
    async fn print_test_rejects_get() {
        let printer = FakePrinter::start(PrinterBehavior::Ok).await.unwrap();
        let app = router(state_for(&printer.uri()));

        let (status, _) = send(app, Method::GET, "/print-test").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(printer.requests().is_empty());
    }

    #[tokio::test]
    async fn print_test_prints_manual_test_page() {
        let printer = FakePrinter::start(PrinterBehavior::Ok).await.unwrap();
        let app = router(state_for(&printer.uri()));

        let (status, body) = send(app, Method::POST, "/print-test").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "ok" }));

        let requests = printer.requests();
        assert_eq!(requests.len(), 1);
        let (message, document) = requests[0].decode().unwrap();
        assert_eq!(message.code, OP_PRINT_JOB);
        let job_name = message
            .group(TAG_OPERATION_ATTRIBUTES)
            .and_then(|g| g.get_string("job-name"));
        assert_eq!(job_name, Some(MANUAL_JOB_NAME));
        assert!(document.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn print_test_surfaces_error_text() {
        let printer = FakePrinter::start(PrinterBehavior::IppStatus(0x0507))
            .await
            .unwrap();
        let app = router(state_for(&printer.uri()));

        let (status, body) = send(app, Method::POST, "/print-test").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("IPP error: server-error-busy"), "{text}");
    }

    #[tokio::test]
    async fn serve_returns_after_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(
            listener,
            state_for("http://127.0.0.1:9/ipp/print"),
            cancel.clone(),
            Duration::from_secs(1),
        ));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
