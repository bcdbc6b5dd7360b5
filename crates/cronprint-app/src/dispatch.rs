// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch loop: binds each configured job to the scheduler and sends its
// document to the printer when it fires.
//
// Every per-firing failure stops at this boundary: it is logged with the job
// name and never reaches the scheduler or other jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info};

use cronprint_core::error::Result;
use cronprint_core::types::{DispatchResult, JobDefinition, PrintTarget};
use cronprint_print::PrinterClient;
use cronprint_schedule::{JobCallback, JobScheduler};

/// Register every enabled job with the scheduler.
///
/// Returns the number of jobs registered. A job without a payload or with an
/// invalid schedule aborts registration with the corresponding error.
pub fn register_jobs(
    scheduler: &JobScheduler,
    client: &Arc<PrinterClient>,
    jobs: &[JobDefinition],
    timeout: Duration,
) -> Result<usize> {
    let mut registered = 0;
    for job in jobs {
        if !job.enabled {
            info!(job = %job.name, schedule = %job.schedule, "job disabled, not scheduling");
            continue;
        }

        let target = job.target()?;
        let callback = dispatch_callback(Arc::clone(client), job.name.clone(), target, timeout);
        scheduler.add_job(&job.name, &job.schedule, callback)?;
        info!(job = %job.name, schedule = %job.schedule, "scheduled job");
        registered += 1;
    }
    Ok(registered)
}

fn dispatch_callback(
    client: Arc<PrinterClient>,
    name: String,
    target: PrintTarget,
    timeout: Duration,
) -> JobCallback {
    Arc::new(move || {
        let client = Arc::clone(&client);
        let name = name.clone();
        let target = target.clone();
        async move {
            dispatch_job(&client, &name, &target, timeout).await;
        }
        .boxed()
    })
}

/// Run one firing of one job and log its outcome.
pub async fn dispatch_job(
    client: &PrinterClient,
    name: &str,
    target: &PrintTarget,
    timeout: Duration,
) -> DispatchResult {
    let started_at = Utc::now();
    info!(job = %name, "executing job");

    let outcome = match target {
        PrintTarget::TestPage => client.print_test_page(name, timeout).await,
        PrintTarget::File(path) => client.print_file(path, name, timeout).await,
    };

    let result = DispatchResult::from_outcome(name, started_at, &outcome);
    match &result.error {
        None => info!(job = %name, "job completed"),
        Some(err) => error!(job = %name, kind = %err.kind, error = %err.message, "job failed"),
    }
    result
}
