use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{AppointmentId, Slot};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing input; the caller can fix it.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("slot {slot} on {date} is already booked")]
    Conflict { date: NaiveDate, slot: Slot },
    #[error("appointment not found: {0}")]
    NotFound(AppointmentId),
    /// Storage failed or timed out; safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

impl EngineError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// True for outcomes the caller caused, as opposed to infrastructure faults.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, EngineError::Unavailable(_))
    }
}
