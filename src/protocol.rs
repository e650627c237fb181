//! JSON-lines request/response messages.
//!
//! Every line on the socket is one JSON object. Requests are tagged by `"op"`,
//! responses by `"type"`. Field names follow the booking records: camelCase.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    Hello {
        university: String,
        password: String,
    },
    CreateBooking {
        booking: NewBooking,
    },
    CheckConflict {
        candidate: CandidateBooking,
    },
    OccurrencesOnDate {
        room_id: RoomId,
        date: NaiveDate,
    },
    FreeWindows {
        room_id: RoomId,
        date: NaiveDate,
        opens_at: TimeOfDay,
        closes_at: TimeOfDay,
        #[serde(default)]
        min_duration: Option<Minutes>,
    },
    CancelBooking {
        id: BookingId,
    },
    RejectBooking {
        id: BookingId,
    },
    ConfirmBooking {
        id: BookingId,
    },
    GetBooking {
        id: BookingId,
    },
    ListBookings {
        #[serde(default)]
        user_id: Option<String>,
    },
    ListRooms,
    Listen {
        room_id: RoomId,
    },
    Unlisten {
        room_id: RoomId,
    },
    UnlistenAll,
}

/// Free time as the viewer renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    /// `None` when either end falls outside the day.
    pub fn from_span(span: Span) -> Option<Self> {
        Some(Self {
            start: TimeOfDay::from_minutes(span.start)?,
            end: TimeOfDay::from_minutes(span.end)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Response {
    Ready {
        university: String,
    },
    Booking {
        booking: Booking,
    },
    Bookings {
        bookings: Vec<Booking>,
    },
    /// Outcome of a conflict pre-check. `conflict` is absent when the slot is free.
    Conflict {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conflict: Option<Booking>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    FreeWindows {
        room_id: RoomId,
        date: NaiveDate,
        windows: Vec<TimeWindow>,
    },
    Rooms {
        rooms: Vec<Room>,
    },
    Listening {
        room_id: RoomId,
    },
    Unlistened {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    Notification {
        room_id: RoomId,
        event: BookingEvent,
    },
    Error {
        code: String,
        message: String,
    },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

pub fn encode_response(response: &Response) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(response)?)
}
