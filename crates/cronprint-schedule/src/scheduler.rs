// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cron job scheduler bound to one IANA timezone.
//
// A single background task owns the clock: it sleeps until the earliest
// next fire time, spawns the callback of every due entry as its own Tokio
// task, then recomputes each fired entry's next time from the current wall
// clock. Callbacks are never awaited by the loop, so a slow job neither
// delays other jobs nor its own next firing, and two firings of the same
// job may overlap.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cronprint_core::error::{CronprintError, Result};

use crate::clock::{Clock, SystemClock};
use crate::cron_expr::CronExpr;

/// How long the loop sleeps when nothing is scheduled. Adding a job wakes it
/// early.
const IDLE_SLEEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Work run at each fire time. Called once per firing; the returned future
/// is spawned.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque handle of a scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only snapshot of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEntry {
    pub id: EntryId,
    pub name: String,
    pub schedule: String,
    /// `None` only if the expression has no further occurrences.
    pub next_fire: Option<DateTime<FixedOffset>>,
    /// `None` until the entry first fires.
    pub prev_fire: Option<DateTime<FixedOffset>>,
}

struct Entry {
    id: EntryId,
    name: String,
    expr: CronExpr,
    callback: JobCallback,
    next: Option<DateTime<Tz>>,
    prev: Option<DateTime<Tz>>,
}

impl Entry {
    fn snapshot(&self) -> ScheduledEntry {
        ScheduledEntry {
            id: self.id,
            name: self.name.clone(),
            schedule: self.expr.source().to_string(),
            next_fire: self.next.map(|t| t.fixed_offset()),
            prev_fire: self.prev.map(|t| t.fixed_offset()),
        }
    }
}

/// Fires registered callbacks on their cron schedules.
pub struct JobScheduler {
    timezone: Tz,
    clock: Arc<dyn Clock>,
    entries: RwLock<Vec<Entry>>,
    /// Wakes the loop when an entry is added.
    wake: Notify,
}

impl JobScheduler {
    /// Scheduler on the system clock. An unknown timezone name is a
    /// configuration error.
    pub fn new(timezone: &str) -> Result<Self> {
        Self::with_clock(timezone, Arc::new(SystemClock))
    }

    pub fn with_clock(timezone: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|e| CronprintError::config(format!("unknown timezone {timezone:?}: {e}")))?;
        Ok(Self {
            timezone,
            clock,
            entries: RwLock::new(Vec::new()),
            wake: Notify::new(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Register `callback` under `expression`.
    ///
    /// The expression is parsed and the first fire time computed now; an
    /// invalid or never-firing expression is a schedule error.
    pub fn add_job(&self, name: &str, expression: &str, callback: JobCallback) -> Result<EntryId> {
        let expr = CronExpr::parse(expression)?;
        let now = self.clock.now().with_timezone(&self.timezone);
        let next = expr.next_after(&now).ok_or_else(|| CronprintError::Schedule {
            expression: expr.source().to_string(),
            reason: "never fires".into(),
        })?;

        let id = EntryId::new();
        info!(job = name, schedule = expr.source(), next_fire = %next.fixed_offset(), "job registered");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry {
                id,
                name: name.to_string(),
                expr,
                callback,
                next: Some(next),
                prev: None,
            });
        self.wake.notify_one();
        Ok(id)
    }

    /// Snapshot of every entry, soonest first.
    pub fn entries(&self) -> Vec<ScheduledEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot: Vec<ScheduledEntry> = entries.iter().map(Entry::snapshot).collect();
        snapshot.sort_by(|a, b| match (a.next_fire, b.next_fire) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        snapshot
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the scheduling loop. It stops when `cancel` fires; callbacks
    /// already running are left alone.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run(cancel).await })
    }

    async fn run(&self, cancel: CancellationToken) {
        info!(timezone = %self.timezone, jobs = self.len(), "scheduler started");
        loop {
            let now = self.clock.now();
            let sleep_for = match self.fire_due(now) {
                Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
                None => IDLE_SLEEP,
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Spawn every entry due at `now`, advance it, and return the earliest
    /// upcoming fire time.
    fn fire_due(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_now = now.with_timezone(&self.timezone);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        for entry in entries.iter_mut() {
            let Some(due) = entry.next.filter(|next| *next <= local_now) else {
                continue;
            };

            debug!(job = %entry.name, fire_time = %due.fixed_offset(), "firing");
            tokio::spawn((entry.callback)());

            entry.prev = Some(due);
            entry.next = entry.expr.next_after(&local_now);
            if entry.next.is_none() {
                warn!(job = %entry.name, schedule = entry.expr.source(), "schedule has no further occurrences");
            }
        }

        entries
            .iter()
            .filter_map(|e| e.next)
            .min()
            .map(|t| t.with_timezone(&Utc))
    }
}
