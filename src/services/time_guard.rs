use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::models::quiz::Quiz;
use crate::models::quiz_attempt::{ActiveAttempt, QuizAttempt};

/// How the server treats submissions that arrive after an attempt's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlinePolicy {
    /// The client's countdown triggers the submission; late arrivals are accepted.
    ClientTrusted,
    /// Submissions later than `expires_at + grace_seconds` are rejected.
    Enforced { grace_seconds: i64 },
}

/// Countdown bookkeeping for an attempt.
///
/// The countdown runs `time_limit_minutes * 60` seconds from the moment the
/// attempt became active. A time limit of 0 means the quiz is untimed.
#[derive(Debug, Clone, Copy)]
pub struct TimeGuard {
    policy: DeadlinePolicy,
}

impl TimeGuard {
    pub fn new(policy: DeadlinePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DeadlinePolicy {
        self.policy
    }

    pub fn countdown_seconds(quiz: &Quiz) -> i64 {
        i64::from(quiz.time_limit_minutes.max(0)) * 60
    }

    pub fn deadline_for(quiz: &Quiz, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match Self::countdown_seconds(quiz) {
            0 => None,
            secs => Some(started_at + Duration::seconds(secs)),
        }
    }

    /// Seconds left on an active, timed attempt.
    pub fn remaining_seconds(attempt: &QuizAttempt, now: DateTime<Utc>) -> Option<i64> {
        if attempt.is_terminal() {
            return None;
        }
        attempt
            .expires_at
            .map(|deadline| (deadline - now).num_seconds().max(0))
    }

    pub fn check_submission(&self, attempt: &ActiveAttempt, now: DateTime<Utc>) -> Result<()> {
        let DeadlinePolicy::Enforced { grace_seconds } = self.policy else {
            return Ok(());
        };
        match attempt.expires_at {
            Some(deadline) if now > deadline + Duration::seconds(grace_seconds) => {
                tracing::warn!(
                    attempt_id = %attempt.id,
                    deadline = %deadline,
                    "Submission rejected after deadline"
                );
                Err(Error::DeadlineExceeded)
            }
            _ => Ok(()),
        }
    }
}

impl Default for TimeGuard {
    fn default() -> Self {
        Self::new(DeadlinePolicy::ClientTrusted)
    }
}
