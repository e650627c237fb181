use chrono::NaiveDate;

use crate::model::*;

use super::availability::{free_windows, occurrences_on_date};
use super::conflict::{ConflictChecker, MissingFieldPolicy};
use super::{Engine, EngineError, SharedRoomSchedule};

impl Engine {
    /// Advisory pre-check for the booking form, without reserving anything.
    /// Incomplete candidates pass; the engine's candidate scope applies, so the
    /// answer agrees with `create_booking`.
    pub async fn check_conflict(&self, candidate: &CandidateBooking) -> Option<Booking> {
        let room_id = candidate.room_id.as_deref()?;
        let rs = self.get_schedule(room_id)?;
        let guard = rs.read().await;
        ConflictChecker::new(MissingFieldPolicy::Permit, self.scope)
            .check(candidate, &guard.bookings)
            .ok()
            .flatten()
            .cloned()
    }

    /// The availability viewer's list for one room and date. Unknown rooms are empty.
    pub async fn occurrences_on_date(&self, room_id: &str, date: NaiveDate) -> Vec<Booking> {
        let Some(rs) = self.get_schedule(room_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        occurrences_on_date(room_id, date, &guard.bookings)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn free_windows(
        &self,
        room_id: &str,
        date: NaiveDate,
        opening: Span,
        min_duration: Option<Minutes>,
    ) -> Vec<Span> {
        let mut free = match self.get_schedule(room_id) {
            Some(rs) => {
                let guard = rs.read().await;
                free_windows(room_id, date, &guard.bookings, opening)
            }
            None => free_windows(room_id, date, std::iter::empty::<&Booking>(), opening),
        };
        if let Some(min) = min_duration {
            free.retain(|span| span.duration() >= min);
        }
        free
    }

    pub async fn get_booking(&self, id: &BookingId) -> Result<Booking, EngineError> {
        let room_id = self
            .get_room_for_booking(id)
            .ok_or(EngineError::NotFound(*id))?;
        let rs = self
            .get_schedule(&room_id)
            .ok_or(EngineError::NotFound(*id))?;
        let guard = rs.read().await;
        guard.find(id).cloned().ok_or(EngineError::NotFound(*id))
    }

    /// Bookings ordered by date, then start time.
    ///
    /// With a user id: that user's own bookings plus every SIS-synced one.
    pub async fn list_bookings(&self, user_id: Option<&str>) -> Vec<Booking> {
        // Collect Arcs first; DashMap refs must not be held across awaits.
        let schedules: Vec<SharedRoomSchedule> =
            self.state.iter().map(|e| e.value().clone()).collect();

        let mut out = Vec::new();
        for rs in schedules {
            let guard = rs.read().await;
            out.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| match user_id {
                        Some(user) => b.user_id == user || b.source == BookingSource::Sis,
                        None => true,
                    })
                    .cloned(),
            );
        }
        out.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.start_time.cmp(&b.start_time))
                .then(a.id.cmp(&b.id))
        });
        out
    }

    pub fn get_room(&self, room_id: &str) -> Option<Room> {
        self.rooms.get(room_id).map(|r| r.value().clone())
    }

    pub fn list_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }
}
