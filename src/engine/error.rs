use thiserror::Error;

use crate::model::*;

use super::conflict::{describe_conflict, ConflictError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("booking not found: {0}")]
    NotFound(BookingId),
    #[error("booking already exists: {0}")]
    BookingExists(BookingId),
    #[error("room already exists: {0}")]
    RoomExists(RoomId),
    #[error("unknown room: {0}")]
    UnknownRoom(RoomId),
    #[error("{}", describe_conflict(.conflicting))]
    Conflict { conflicting: Box<Booking> },
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("start time {start} must be before end time {end}")]
    InvalidTimeRange { start: TimeOfDay, end: TimeOfDay },
    #[error("invalid recurrence: {0}")]
    InvalidRecurrence(&'static str),
    #[error("cannot change status from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

impl From<ConflictError> for EngineError {
    fn from(e: ConflictError) -> Self {
        match e {
            ConflictError::MissingField(field) => EngineError::MissingField(field),
        }
    }
}

impl EngineError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::BookingExists(_) | EngineError::RoomExists(_) => "already_exists",
            EngineError::UnknownRoom(_) => "unknown_room",
            EngineError::Conflict { .. } => "conflict",
            EngineError::MissingField(_)
            | EngineError::InvalidTimeRange { .. }
            | EngineError::InvalidRecurrence(_) => "bad_request",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}
