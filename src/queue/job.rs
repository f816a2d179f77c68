//! # Job Structures for the Order Queue
//!
//! The queue's unit of work is one job per order, keyed by the order id so a
//! second submission with the same id can never duplicate work.

use crate::models::OrderParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed job payload carried through the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub order_id: String,
    pub params: OrderParams,
    pub submitted_at: DateTime<Utc>,
}

impl JobPayload {
    pub fn new(order_id: impl Into<String>, params: OrderParams) -> Self {
        Self {
            order_id: order_id.into(),
            params,
            submitted_at: Utc::now(),
        }
    }
}

/// Queue-level lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Ready for dispatch
    Waiting,
    /// Claimed by a worker
    Active,
    /// Scheduled for a future attempt
    Delayed,
    /// Finished successfully
    Completed,
    /// Finished after exhausting retries
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Delayed => write!(f, "delayed"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "delayed" => Ok(Self::Delayed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}

/// One enqueued order execution. `id` doubles as the order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderJob {
    pub id: String,
    pub payload: JobPayload,
    /// Higher number dispatches first
    pub priority: i32,
    pub state: JobState,
    pub attempts_made: i32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time a delayed job becomes dispatchable again
    pub scheduled_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrderJob {
    pub fn new(payload: JobPayload, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: payload.order_id.clone(),
            payload,
            priority,
            state: JobState::Waiting,
            attempts_made: 0,
            last_error: None,
            enqueued_at: now,
            scheduled_at: now,
            finished_at: None,
        }
    }

    /// Whether this job is dispatchable at `now`
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Waiting => true,
            JobState::Delayed => self.scheduled_at <= now,
            _ => false,
        }
    }
}

/// Per-state job counts from storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
}

/// Aggregate queue statistics. `total` is the exact sum of the other five
/// at the instant the counts were read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
    pub total: i64,
}

impl From<JobCounts> for JobStats {
    fn from(counts: JobCounts) -> Self {
        Self {
            waiting: counts.waiting,
            active: counts.active,
            completed: counts.completed,
            failed: counts.failed,
            delayed: counts.delayed,
            total: counts.waiting
                + counts.active
                + counts.completed
                + counts.failed
                + counts.delayed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderKind;
    use rust_decimal_macros::dec;

    fn payload(order_id: &str) -> JobPayload {
        JobPayload::new(
            order_id,
            OrderParams {
                token_in: "SOL".to_string(),
                token_out: "USDC".to_string(),
                amount_in: dec!(10),
                slippage: dec!(0.01),
                kind: OrderKind::Market,
                priority: 1,
            },
        )
    }

    #[test]
    fn test_job_key_is_order_id() {
        let job = OrderJob::new(payload("o-1"), 1);
        assert_eq!(job.id, "o-1");
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts_made, 0);
    }

    #[test]
    fn test_readiness() {
        let mut job = OrderJob::new(payload("o-1"), 1);
        let now = Utc::now();
        assert!(job.is_ready(now));

        job.state = JobState::Delayed;
        job.scheduled_at = now + chrono::Duration::seconds(30);
        assert!(!job.is_ready(now));
        assert!(job.is_ready(now + chrono::Duration::seconds(31)));

        job.state = JobState::Active;
        assert!(!job.is_ready(now));
    }

    #[test]
    fn test_stats_total_is_sum() {
        let stats = JobStats::from(JobCounts {
            waiting: 2,
            active: 1,
            completed: 10,
            failed: 3,
            delayed: 4,
        });
        assert_eq!(stats.total, 20);
    }

    #[test]
    fn test_state_string_roundtrip() {
        for state in [
            JobState::Waiting,
            JobState::Active,
            JobState::Delayed,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(state.to_string().parse::<JobState>().unwrap(), state);
        }
    }
}
