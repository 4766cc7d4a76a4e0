use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::app::{NexaError, Result};

const FIELDS: usize = 6;

/// A parsed six-field cron expression:
/// `seconds minutes hours day-of-month month day-of-week`.
#[derive(Debug, Clone)]
pub struct Recurrence {
    spec: String,
    schedule: Schedule,
}

impl Recurrence {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let fields = spec.split_whitespace().count();
        if fields != FIELDS {
            return Err(NexaError::InvalidSchedule {
                spec: spec.to_string(),
                reason: format!("expected {} fields, found {}", FIELDS, fields),
            });
        }

        let schedule = Schedule::from_str(spec).map_err(|e| NexaError::InvalidSchedule {
            spec: spec.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            spec: spec.to_string(),
            schedule,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// First firing strictly after `now`, or `None` if the expression never
    /// fires again.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }
}
