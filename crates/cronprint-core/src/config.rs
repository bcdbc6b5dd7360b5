// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration, read from `CRONPRINT_*` environment variables.
//
// Jobs are declared by key families:
//
//   CRONPRINT_JOB_<NAME>_SCHEDULE   cron expression (declares the job)
//   CRONPRINT_JOB_<NAME>_FILE       document path
//   CRONPRINT_JOB_<NAME>_TESTPAGE   "true" to print a generated test page
//   CRONPRINT_JOB_<NAME>_ENABLED    "false" to skip the job

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CronprintError, Result};
use crate::types::{JobDefinition, PrinterEndpoint};

const ENV_PREFIX: &str = "CRONPRINT_";
const JOB_PREFIX: &str = "CRONPRINT_JOB_";
const SCHEDULE_SUFFIX: &str = "_SCHEDULE";

/// Process-wide settings, immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bind host for the status API.
    pub host: String,
    /// Bind port for the status API.
    pub port: u16,
    pub printer: PrinterEndpoint,
    /// IANA timezone name used to evaluate every schedule.
    pub timezone: String,
    /// Deadline applied to each printer round-trip.
    pub printer_timeout: Duration,
    /// `requesting-user-name` sent with Print-Job.
    pub user_name: String,
    /// Accept self-signed certificates on `ipps://` printers.
    pub accept_invalid_certs: bool,
    /// How long the status API may drain in-flight requests on shutdown.
    pub shutdown_grace: Duration,
    /// Job definitions, sorted by name.
    pub jobs: Vec<JobDefinition>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit set of key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();

        let get = |key: &str| env.get(key).map(String::as_str).filter(|v| !v.is_empty());

        let printer_uri = get("CRONPRINT_PRINTER_URI")
            .ok_or_else(|| CronprintError::config("CRONPRINT_PRINTER_URI is required"))?;

        let port = match get("CRONPRINT_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| CronprintError::config(format!("CRONPRINT_PORT {raw:?}: {e}")))?,
            None => 8080,
        };

        Ok(Self {
            host: get("CRONPRINT_HOST").unwrap_or("0.0.0.0").to_string(),
            port,
            printer: PrinterEndpoint::new(printer_uri),
            timezone: get("CRONPRINT_TIMEZONE").unwrap_or("UTC").to_string(),
            printer_timeout: parse_secs(
                get("CRONPRINT_PRINTER_TIMEOUT_SECS"),
                "CRONPRINT_PRINTER_TIMEOUT_SECS",
                30,
            )?,
            user_name: get("CRONPRINT_USER_NAME").unwrap_or("cronprint").to_string(),
            accept_invalid_certs: parse_bool(
                get("CRONPRINT_PRINTER_INSECURE_TLS"),
                "CRONPRINT_PRINTER_INSECURE_TLS",
                false,
            )?,
            shutdown_grace: parse_secs(
                get("CRONPRINT_SHUTDOWN_GRACE_SECS"),
                "CRONPRINT_SHUTDOWN_GRACE_SECS",
                5,
            )?,
            jobs: parse_jobs(&env)?,
        })
    }

    /// `host:port` for the status API listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Collect every `CRONPRINT_JOB_<NAME>_SCHEDULE` family into a definition.
///
/// The job name is the lower-cased `<NAME>`; sibling keys are looked up under
/// the upper-cased name. Two keys that lower-case to the same name produce two
/// independent definitions sharing that name.
fn parse_jobs(env: &HashMap<String, String>) -> Result<Vec<JobDefinition>> {
    let mut declared: Vec<(&String, &String)> = env
        .iter()
        .filter(|(k, _)| k.starts_with(JOB_PREFIX) && k.ends_with(SCHEDULE_SUFFIX))
        .collect();
    declared.sort();

    let mut jobs = Vec::with_capacity(declared.len());
    for (key, schedule) in declared {
        let Some(raw_name) = key
            .strip_prefix(JOB_PREFIX)
            .and_then(|rest| rest.strip_suffix(SCHEDULE_SUFFIX))
            .filter(|n| !n.is_empty())
        else {
            debug!(key = %key, "ignoring job key with empty name");
            continue;
        };

        let name = raw_name.to_lowercase();
        let family = format!("{JOB_PREFIX}{}", name.to_uppercase());
        let sibling = |suffix: &str| {
            env.get(&format!("{family}_{suffix}"))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        };

        let test_page = parse_bool(sibling("TESTPAGE"), &format!("{family}_TESTPAGE"), false)?;
        let enabled = parse_bool(sibling("ENABLED"), &format!("{family}_ENABLED"), true)?;

        let job = JobDefinition {
            name,
            schedule: schedule.trim().to_string(),
            file_path: sibling("FILE").map(PathBuf::from),
            test_page,
            enabled,
        };
        // Reject payload-less jobs at load time rather than at first firing.
        job.target()?;
        jobs.push(job);
    }

    jobs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(jobs)
}

fn parse_bool(raw: Option<&str>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CronprintError::config(format!(
            "{key} {raw:?}: expected true or false"
        ))),
    }
}

fn parse_secs(raw: Option<&str>, key: &str, default: u64) -> Result<Duration> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| CronprintError::config(format!("{key} {raw:?}: {e}")))?,
        None => default,
    };
    if secs == 0 {
        return Err(CronprintError::config(format!("{key} must be positive")));
    }
    Ok(Duration::from_secs(secs))
}
