mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod recurrence;

pub use availability::{free_windows, merge_overlapping, occurrences_on_date, subtract_spans};
pub use conflict::{
    describe_conflict, find_conflict, CandidateScope, ConflictChecker, ConflictError,
    MissingFieldPolicy,
};
pub use error::EngineError;
pub use recurrence::{occurrence_dates, occurs_on, pattern_occurs_on};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::model::*;
use crate::notify::NotifyHub;

pub type SharedRoomSchedule = Arc<RwLock<RoomSchedule>>;

/// One university's rooms and bookings.
///
/// Each room's schedule sits behind its own lock; a booking is checked and
/// inserted while that lock is held for writing.
pub struct Engine {
    pub state: DashMap<RoomId, SharedRoomSchedule>,
    pub notify: Arc<NotifyHub>,
    pub(super) rooms: DashMap<RoomId, Room>,
    /// Reverse lookup: booking id → room id
    pub(super) booking_to_room: DashMap<BookingId, RoomId>,
    pub(super) scope: CandidateScope,
}

impl Engine {
    pub fn new(notify: Arc<NotifyHub>, scope: CandidateScope) -> Self {
        Self {
            state: DashMap::new(),
            notify,
            rooms: DashMap::new(),
            booking_to_room: DashMap::new(),
            scope,
        }
    }

    pub fn scope(&self) -> CandidateScope {
        self.scope
    }

    pub fn get_schedule(&self, room_id: &str) -> Option<SharedRoomSchedule> {
        self.state.get(room_id).map(|e| e.value().clone())
    }

    /// Schedules exist for every room that has ever held a booking, directory
    /// entry or not (SIS imports may reference rooms the directory lacks).
    pub(super) fn schedule_or_create(&self, room_id: &str) -> SharedRoomSchedule {
        if let Some(rs) = self.get_schedule(room_id) {
            return rs;
        }
        self.state
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(RoomSchedule::new(room_id.to_string()))))
            .value()
            .clone()
    }

    pub fn get_room_for_booking(&self, id: &BookingId) -> Option<RoomId> {
        self.booking_to_room.get(id).map(|e| e.value().clone())
    }

    /// Lookup booking → room, get schedule, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        id: &BookingId,
    ) -> Result<(RoomId, OwnedRwLockWriteGuard<RoomSchedule>), EngineError> {
        let room_id = self
            .get_room_for_booking(id)
            .ok_or(EngineError::NotFound(*id))?;
        let rs = self
            .get_schedule(&room_id)
            .ok_or(EngineError::NotFound(*id))?;
        let guard = rs.write_owned().await;
        Ok((room_id, guard))
    }
}
