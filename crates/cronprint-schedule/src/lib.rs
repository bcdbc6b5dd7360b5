// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cronprint Schedule: cron expressions evaluated in one timezone, and the
// scheduler that fires job callbacks at their computed times.

pub mod clock;
pub mod cron_expr;
pub mod scheduler;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use cron_expr::CronExpr;
pub use scheduler::{EntryId, JobCallback, JobScheduler, ScheduledEntry};
