// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standard 5-field cron expressions on top of the `cron` crate.
//
//   minute  hour  day-of-month  month  day-of-week
//
// The `cron` crate wants a leading seconds field, numbers Sunday as 1 and
// requires day-of-month AND day-of-week to match. Classic cron numbers
// Sunday as 0 (or 7) and fires when EITHER day field matches if both are
// restricted. This module rewrites the expression so the crate evaluates
// classic semantics.

use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use cron::Schedule;

use cronprint_core::error::{CronprintError, Result};

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronExpr {
    source: String,
    /// One schedule normally; two when both day fields are restricted, whose
    /// occurrences are merged.
    schedules: Vec<Schedule>,
}

impl CronExpr {
    /// Parse a 5-field expression or one of the `@yearly`, `@annually`,
    /// `@monthly`, `@weekly`, `@daily`, `@midnight`, `@hourly` descriptors.
    pub fn parse(expression: &str) -> Result<Self> {
        let source = expression.trim().to_string();
        let invalid = |reason: String| CronprintError::Schedule {
            expression: source.clone(),
            reason,
        };

        let expanded = if source.starts_with('@') {
            expand_descriptor(&source).ok_or_else(|| invalid("unknown descriptor".into()))?
        } else {
            source.as_str()
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields[..] else {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        };

        let dom = DayField::day_of_month(dom).map_err(&invalid)?;
        let dow = DayField::day_of_week(dow).map_err(&invalid)?;

        let compile = |dom: &str, dow: &str| {
            Schedule::from_str(&format!("0 {minute} {hour} {dom} {month} {dow}"))
                .map_err(|e| invalid(e.to_string()))
        };

        let schedules = if dom.star || dow.star {
            vec![compile(&dom.text, &dow.text)?]
        } else {
            vec![compile(&dom.text, "*")?, compile("*", &dow.text)?]
        };

        Ok(Self { source, schedules })
    }

    /// The expression as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// First occurrence strictly after `after`, in `after`'s timezone.
    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        self.schedules
            .iter()
            .filter_map(|s| s.after(after).next())
            .min()
    }
}

impl FromStr for CronExpr {
    type Err = CronprintError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn expand_descriptor(descriptor: &str) -> Option<&'static str> {
    let expanded = match descriptor.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        _ => return None,
    };
    Some(expanded)
}

/// A day field rewritten for the `cron` crate.
struct DayField {
    text: String,
    /// Unrestricted: some item is `*` or `?` without a step above 1.
    star: bool,
}

impl DayField {
    fn day_of_month(field: &str) -> std::result::Result<Self, String> {
        let star = field.split(',').any(is_star_item);
        Ok(Self {
            text: field.replace('?', "*"),
            star,
        })
    }

    /// Expand to an explicit list of weekday names, accepting 0-7 (0 and 7
    /// are Sunday), three-letter names, ranges and steps.
    fn day_of_week(field: &str) -> std::result::Result<Self, String> {
        let mut days = [false; 7];
        let mut star = false;

        for item in field.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => {
                    let step: usize = step
                        .parse()
                        .map_err(|_| format!("invalid step {step:?}"))?;
                    if step == 0 {
                        return Err("step must be positive".into());
                    }
                    (range, step)
                }
                None => (item, 1),
            };

            let (lo, hi) = if range == "*" || range == "?" {
                star |= step == 1;
                (0, 6)
            } else if let Some((lo, hi)) = range.split_once('-') {
                (weekday(lo)?, weekday(hi)?)
            } else {
                let day = weekday(range)?;
                // `n/step` runs from n to the end of the week
                (day, if item.contains('/') { 6 } else { day })
            };
            if lo > hi {
                return Err(format!("day-of-week range {range:?} runs backwards"));
            }

            for day in (lo..=hi).step_by(step) {
                days[day % 7] = true;
            }
        }

        if star {
            return Ok(Self {
                text: "*".into(),
                star: true,
            });
        }
        let text = days
            .iter()
            .zip(WEEKDAY_NAMES)
            .filter(|(on, _)| **on)
            .map(|(_, name)| name)
            .collect::<Vec<_>>()
            .join(",");
        Ok(Self { text, star: false })
    }
}

fn is_star_item(item: &str) -> bool {
    match item.split_once('/') {
        Some((range, step)) => (range == "*" || range == "?") && step.parse::<u32>() == Ok(1),
        None => item == "*" || item == "?",
    }
}

fn weekday(token: &str) -> std::result::Result<usize, String> {
    if let Ok(n) = token.parse::<usize>() {
        return if n <= 7 {
            Ok(n)
        } else {
            Err(format!("day-of-week {n} out of range 0-7"))
        };
    }
    WEEKDAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .ok_or_else(|| format!("unknown day-of-week {token:?}"))
}
