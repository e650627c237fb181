use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{BOOKINGS_CREATED_TOTAL, CONFLICTS_DETECTED_TOTAL};

use super::conflict::{validate_recurrence, validate_times, ConflictChecker, MissingFieldPolicy};
use super::{Engine, EngineError};

const DEFAULT_PURPOSE: &str = "Seminar";

/// Cancelled and rejected bookings stay in the schedule but do not count.
pub(super) fn ensure_capacity(schedule: &RoomSchedule) -> Result<(), EngineError> {
    if schedule.active_count() >= MAX_BOOKINGS_PER_ROOM {
        return Err(EngineError::LimitExceeded("too many bookings in room"));
    }
    Ok(())
}

impl Engine {
    pub fn add_room(&self, room: Room) -> Result<(), EngineError> {
        if self.rooms.len() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if room.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        if self.rooms.contains_key(&room.id) {
            return Err(EngineError::RoomExists(room.id));
        }
        debug!(room_id = %room.id, name = %room.name, "room added");
        self.rooms.insert(room.id.clone(), room);
        Ok(())
    }

    /// Insert an externally sourced booking (SIS sync, seed data) as-is.
    ///
    /// No conflict check: the registry is the source of truth for its own
    /// schedule. Shape is still validated.
    pub async fn import_booking(&self, booking: Booking) -> Result<(), EngineError> {
        validate_times(booking.start_time, booking.end_time)?;
        let mut booking = booking;
        booking.recurrence_end_date =
            validate_recurrence(booking.date, booking.recurrence, booking.recurrence_end_date)?;
        // Claim the id before locking the room; a second import of the same
        // id fails here even when it targets another room.
        match self.booking_to_room.entry(booking.id) {
            Entry::Occupied(_) => return Err(EngineError::BookingExists(booking.id)),
            Entry::Vacant(slot) => {
                slot.insert(booking.room_id.clone());
            }
        }

        let rs = self.schedule_or_create(&booking.room_id);
        let mut guard = rs.write().await;
        if let Err(e) = ensure_capacity(&guard) {
            self.booking_to_room.remove(&booking.id);
            return Err(e);
        }

        let event = BookingEvent::Imported {
            booking: booking.clone(),
        };
        let room_id = booking.room_id.clone();
        guard.insert(booking);
        self.notify.send(&room_id, &event);
        Ok(())
    }

    /// Import in order; stops at the first invalid booking. Returns how many were inserted.
    pub async fn import_bookings(
        &self,
        bookings: impl IntoIterator<Item = Booking>,
    ) -> Result<usize, EngineError> {
        let mut count = 0;
        for booking in bookings {
            self.import_booking(booking).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Submit a booking-form request.
    ///
    /// The room's write lock is held from the conflict check through the
    /// insert, so two overlapping requests for one room cannot both commit.
    pub async fn create_booking(&self, request: NewBooking) -> Result<Booking, EngineError> {
        let room_id = request
            .room_id
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or(EngineError::MissingField("roomId"))?;
        let date = request.date.ok_or(EngineError::MissingField("date"))?;
        let start_time = request.start_time.ok_or(EngineError::MissingField("startTime"))?;
        let end_time = request.end_time.ok_or(EngineError::MissingField("endTime"))?;
        validate_times(start_time, end_time)?;
        let recurrence_end_date =
            validate_recurrence(date, request.recurrence, request.recurrence_end_date)?;
        if request.purpose.len() > MAX_PURPOSE_LEN {
            return Err(EngineError::LimitExceeded("purpose too long"));
        }
        if request.user.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("user name too long"));
        }
        let room_name = self
            .rooms
            .get(&room_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| EngineError::UnknownRoom(room_id.clone()))?;

        let rs = self.schedule_or_create(&room_id);
        let mut guard = rs.write().await;
        ensure_capacity(&guard)?;

        let checker = ConflictChecker::new(MissingFieldPolicy::Reject, self.scope);
        let candidate = request.candidate();
        if let Some(existing) = checker.check(&candidate, &guard.bookings)? {
            metrics::counter!(CONFLICTS_DETECTED_TOTAL).increment(1);
            debug!(
                room_id = %room_id,
                conflicting = %existing.id,
                "booking refused"
            );
            return Err(EngineError::Conflict {
                conflicting: Box::new(existing.clone()),
            });
        }

        let purpose = match request.purpose.trim() {
            "" => DEFAULT_PURPOSE.to_string(),
            p => p.to_string(),
        };
        let booking = Booking {
            id: Ulid::new(),
            room_id: room_id.clone(),
            room_name,
            user_id: request.user.id,
            user_name: request.user.name,
            user_role: request.user.role,
            date,
            start_time,
            end_time,
            purpose,
            kind: request.kind,
            status: BookingStatus::Confirmed,
            source: BookingSource::Manual,
            course_code: request.course_code,
            recurrence: request.recurrence,
            recurrence_end_date,
        };

        self.booking_to_room.insert(booking.id, room_id.clone());
        guard.insert(booking.clone());
        drop(guard);

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            booking_id = %booking.id,
            room_id = %room_id,
            date = %booking.date,
            start = %booking.start_time,
            end = %booking.end_time,
            "booking created"
        );
        self.notify.send(
            &room_id,
            &BookingEvent::Created {
                booking: booking.clone(),
            },
        );
        Ok(booking)
    }

    /// Move a booking to `to`. Returns the updated booking.
    pub async fn set_status(&self, id: BookingId, to: BookingStatus) -> Result<Booking, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.find_mut(&id).ok_or(EngineError::NotFound(id))?;
        let from = booking.status;
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }
        booking.status = to;
        let updated = booking.clone();
        drop(guard);

        info!(booking_id = %id, room_id = %room_id, %from, %to, "booking status changed");
        self.notify.send(
            &room_id,
            &BookingEvent::StatusChanged {
                id,
                room_id: room_id.clone(),
                from,
                to,
            },
        );
        Ok(updated)
    }

    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.set_status(id, BookingStatus::Cancelled).await
    }

    pub async fn reject_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.set_status(id, BookingStatus::Rejected).await
    }

    pub async fn confirm_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        self.set_status(id, BookingStatus::Confirmed).await
    }
}
