use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use ulid::Ulid;

/// Minutes since midnight.
pub type Minutes = u16;

pub type RoomId = String;
pub type BookingId = Ulid;

const MINUTES_PER_DAY: Minutes = 24 * 60;

/// Wall-clock time on a 24-hour clock, naive, no timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(Minutes);

impl TimeOfDay {
    pub fn from_hm(hours: u8, minutes: u8) -> Option<Self> {
        if hours >= 24 || minutes >= 60 {
            return None;
        }
        Some(Self(Minutes::from(hours) * 60 + Minutes::from(minutes)))
    }

    pub fn from_minutes(minutes: Minutes) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(self) -> Minutes {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day {0:?} (expected HH:MM)")]
pub struct TimeOfDayParseError(String);

impl FromStr for TimeOfDay {
    type Err = TimeOfDayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimeOfDayParseError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let component = |part: &str| -> Option<u8> {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse().ok()
        };
        let (hours, minutes) = component(h).zip(component(m)).ok_or_else(err)?;
        TimeOfDay::from_hm(hours, minutes).ok_or_else(err)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open interval `[start, end)` in minutes since midnight.
///
/// Built from caller data without validation, so `start >= end` is representable;
/// such a span simply never satisfies the containment helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        Self { start, end }
    }

    pub fn between(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self::new(start.minutes(), end.minutes())
    }

    pub fn duration(&self) -> Minutes {
        self.end.saturating_sub(self.start)
    }

    /// Touching spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    /// Active bookings are the only ones that block a room.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Rejected and Cancelled are terminal.
    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed) | (Pending, Rejected) | (Pending, Cancelled)
                | (Confirmed, Rejected) | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Rejected => "Rejected",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repetition pattern of a booking. `Once` is spelled `None` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recurrence {
    #[default]
    #[serde(rename = "None")]
    Once,
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingKind {
    Lecture,
    #[default]
    Event,
    #[serde(rename = "Student Org")]
    StudentOrg,
    Examination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingSource {
    #[serde(rename = "SIS")]
    Sis,
    Manual,
    #[serde(rename = "Google Calendar")]
    GoogleCalendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Lecturer,
    #[serde(rename = "Teaching Assistant")]
    TeachingAssistant,
    Admin,
}

/// A reservation of one room, possibly repeating from `date` onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub room_name: String,
    pub user_id: String,
    pub user_name: String,
    pub user_role: Role,
    /// First (or only) occurrence.
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub purpose: String,
    #[serde(rename = "type")]
    pub kind: BookingKind,
    pub status: BookingStatus,
    pub source: BookingSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Last date (inclusive) the pattern applies. `None` means open-ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::between(self.start_time, self.end_time)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// A proposed booking as handed over by the booking form. Every field may be
/// missing; see `MissingFieldPolicy` for what the engine does about that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBooking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeOfDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeOfDay>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_end_date: Option<NaiveDate>,
}

impl CandidateBooking {
    pub fn new(room_id: impl Into<RoomId>, date: NaiveDate, start: TimeOfDay, end: TimeOfDay) -> Self {
        Self {
            room_id: Some(room_id.into()),
            date: Some(date),
            start_time: Some(start),
            end_time: Some(end),
            recurrence: Recurrence::Once,
            recurrence_end_date: None,
        }
    }

    pub fn repeating(mut self, recurrence: Recurrence, until: Option<NaiveDate>) -> Self {
        self.recurrence = recurrence;
        self.recurrence_end_date = until;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// Booking-form submission. Required fields are optional here so that a missing
/// one can be reported by name instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<TimeOfDay>,
    #[serde(default)]
    pub end_time: Option<TimeOfDay>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default, rename = "type")]
    pub kind: BookingKind,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub recurrence_end_date: Option<NaiveDate>,
    pub user: BookingUser,
}

impl NewBooking {
    pub fn candidate(&self) -> CandidateBooking {
        CandidateBooking {
            room_id: self.room_id.clone(),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            recurrence: self.recurrence,
            recurrence_end_date: self.recurrence_end_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomKind {
    #[serde(rename = "Lecture Hall")]
    LectureHall,
    Lab,
    #[serde(rename = "Seminar Room")]
    SeminarRoom,
}

/// Occupancy badge shown in the venue directory. Conflict checks never read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomStatus {
    Available,
    Occupied,
    Booked,
    Maintenance,
}

/// Venue directory entry. Display data only; conflict checks never read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub building_id: String,
    pub name: String,
    #[serde(default)]
    pub floor: i32,
    pub capacity: u32,
    #[serde(rename = "type")]
    pub kind: RoomKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenity_ids: Vec<String>,
}

/// All bookings of one room, in the order they were added.
#[derive(Debug, Clone)]
pub struct RoomSchedule {
    pub room_id: RoomId,
    pub bookings: Vec<Booking>,
}

impl RoomSchedule {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            bookings: Vec::new(),
        }
    }

    /// Bookings that still hold the room.
    pub fn active_count(&self) -> usize {
        self.bookings.iter().filter(|b| b.is_active()).count()
    }

    pub fn insert(&mut self, booking: Booking) {
        self.bookings.push(booking);
    }

    pub fn find(&self, id: &BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn find_mut(&mut self, id: &BookingId) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == *id)
    }
}

/// Change published to room listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BookingEvent {
    Created {
        booking: Booking,
    },
    Imported {
        booking: Booking,
    },
    StatusChanged {
        id: BookingId,
        room_id: RoomId,
        from: BookingStatus,
        to: BookingStatus,
    },
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    pub fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    pub fn booking(room_id: &str, date: &str, start: &str, end: &str) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id: room_id.to_string(),
            room_name: format!("Room {room_id}"),
            user_id: "u100".into(),
            user_name: "Dr. John Doe".into(),
            user_role: Role::Lecturer,
            date: d(date),
            start_time: t(start),
            end_time: t(end),
            purpose: "Advanced Web Development".into(),
            kind: BookingKind::Lecture,
            status: BookingStatus::Confirmed,
            source: BookingSource::Manual,
            course_code: None,
            recurrence: Recurrence::Once,
            recurrence_end_date: None,
        }
    }

    pub fn repeating(mut b: Booking, recurrence: Recurrence, until: Option<&str>) -> Booking {
        b.recurrence = recurrence;
        b.recurrence_end_date = until.map(d);
        b
    }

    pub fn with_status(mut b: Booking, status: BookingStatus) -> Booking {
        b.status = status;
        b
    }
}
