use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::MAX_SERIES_HORIZON_DAYS;
use crate::model::*;

use super::recurrence::{occurrence_dates, occurs_on};
use super::EngineError;

/// What the engine reports for a candidate missing `roomId`, `date`,
/// `startTime` or `endTime`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFieldPolicy {
    /// Report "no conflict". This is not validation: callers check field
    /// presence before trusting the answer.
    #[default]
    Permit,
    /// Report the first missing field as an error.
    Reject,
}

/// Which dates of the candidate are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CandidateScope {
    /// Only the candidate's literal `date`. Later occurrences of a recurring
    /// candidate are never compared against existing bookings.
    #[default]
    FirstDate,
    /// Every occurrence of the candidate from its `date` through
    /// `date + horizon_days`, clamped to its own end date.
    Series { horizon_days: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Conflict detection with explicit policies. `ConflictChecker::default()`
/// is exactly `find_conflict`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConflictChecker {
    pub missing_fields: MissingFieldPolicy,
    pub scope: CandidateScope,
}

/// A candidate with every required field present.
struct Resolved<'c> {
    room_id: &'c str,
    date: NaiveDate,
    span: Span,
    recurrence: Recurrence,
    until: Option<NaiveDate>,
}

fn resolve(candidate: &CandidateBooking) -> Result<Resolved<'_>, ConflictError> {
    let room_id = candidate
        .room_id
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or(ConflictError::MissingField("roomId"))?;
    let date = candidate.date.ok_or(ConflictError::MissingField("date"))?;
    let start = candidate.start_time.ok_or(ConflictError::MissingField("startTime"))?;
    let end = candidate.end_time.ok_or(ConflictError::MissingField("endTime"))?;
    Ok(Resolved {
        room_id,
        date,
        span: Span::between(start, end),
        recurrence: candidate.recurrence,
        until: candidate.recurrence_end_date,
    })
}

impl ConflictChecker {
    pub fn new(missing_fields: MissingFieldPolicy, scope: CandidateScope) -> Self {
        Self {
            missing_fields,
            scope,
        }
    }

    /// First existing booking (in iteration order) that collides with the candidate.
    ///
    /// With `Series` scope, earlier candidate dates are searched first.
    pub fn check<'a, I>(
        &self,
        candidate: &CandidateBooking,
        existing: I,
    ) -> Result<Option<&'a Booking>, ConflictError>
    where
        I: IntoIterator<Item = &'a Booking>,
        I::IntoIter: Clone,
    {
        let resolved = match resolve(candidate) {
            Ok(r) => r,
            Err(e) => {
                return match self.missing_fields {
                    MissingFieldPolicy::Permit => Ok(None),
                    MissingFieldPolicy::Reject => Err(e),
                };
            }
        };
        let existing = existing.into_iter();

        match self.scope {
            CandidateScope::FirstDate => Ok(first_clash(&resolved, resolved.date, existing)),
            CandidateScope::Series { horizon_days } => {
                let horizon = horizon_days.min(MAX_SERIES_HORIZON_DAYS);
                let last = resolved
                    .date
                    .checked_add_days(Days::new(horizon.into()))
                    .unwrap_or(NaiveDate::MAX);
                let dates =
                    occurrence_dates(resolved.date, resolved.recurrence, resolved.until, last);
                for date in dates {
                    if let Some(hit) = first_clash(&resolved, date, existing.clone()) {
                        return Ok(Some(hit));
                    }
                }
                Ok(None)
            }
        }
    }
}

fn first_clash<'a>(
    candidate: &Resolved<'_>,
    date: NaiveDate,
    existing: impl Iterator<Item = &'a Booking>,
) -> Option<&'a Booking> {
    existing
        .filter(|b| b.room_id == candidate.room_id && b.is_active())
        .find(|b| occurs_on(b, date) && b.span().overlaps(&candidate.span))
}

/// Does `candidate` collide with an active booking of the same room?
///
/// Missing-field policy: permit. A candidate without `roomId`, `date`,
/// `startTime` or `endTime` yields `None`. Only the candidate's own `date` is
/// checked, even when it carries a recurrence.
pub fn find_conflict<'a, I>(candidate: &CandidateBooking, existing: I) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
    I::IntoIter: Clone,
{
    ConflictChecker::default()
        .check(candidate, existing)
        .ok()
        .flatten()
}

/// The message the booking form shows when a submission is refused.
pub fn describe_conflict(existing: &Booking) -> String {
    format!(
        "Conflict detected with \"{}\" starting at {}.",
        existing.purpose, existing.start_time
    )
}

pub(crate) fn validate_times(start: TimeOfDay, end: TimeOfDay) -> Result<(), EngineError> {
    if start >= end {
        return Err(EngineError::InvalidTimeRange { start, end });
    }
    Ok(())
}

/// Returns the end date to store: dropped for non-recurring bookings.
pub(crate) fn validate_recurrence(
    date: NaiveDate,
    recurrence: Recurrence,
    until: Option<NaiveDate>,
) -> Result<Option<NaiveDate>, EngineError> {
    match (recurrence, until) {
        (Recurrence::Once, _) => Ok(None),
        (_, Some(end)) if end < date => Err(EngineError::InvalidRecurrence(
            "recurrence end date is before the first date",
        )),
        (_, until) => Ok(until),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    fn candidate(room: &str, date: &str, start: &str, end: &str) -> CandidateBooking {
        CandidateBooking::new(room, d(date), t(start), t(end))
    }

    #[test]
    fn same_date_overlap_conflicts() {
        let existing = vec![booking("r1", "2025-01-06", "09:00", "10:00")];
        let hit = find_conflict(&candidate("r1", "2025-01-06", "09:30", "10:30"), &existing);
        assert_eq!(hit, Some(&existing[0]));
    }

    #[test]
    fn different_date_never_conflicts_for_single_bookings() {
        let existing = vec![booking("r1", "2025-01-06", "09:00", "10:00")];
        assert!(find_conflict(&candidate("r1", "2025-01-07", "09:00", "10:00"), &existing).is_none());
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let existing = vec![booking("r1", "2025-01-06", "08:00", "10:00")];
        assert!(find_conflict(&candidate("r1", "2025-01-06", "10:00", "11:00"), &existing).is_none());

        let existing = vec![booking("r1", "2025-01-06", "10:00", "11:00")];
        assert!(find_conflict(&candidate("r1", "2025-01-06", "08:00", "10:00"), &existing).is_none());
    }

    #[test]
    fn one_minute_overlap_conflicts() {
        let existing = vec![booking("r1", "2025-01-06", "08:00", "10:01")];
        assert!(find_conflict(&candidate("r1", "2025-01-06", "10:00", "11:00"), &existing).is_some());
    }

    #[test]
    fn containment_conflicts_both_ways() {
        let existing = vec![booking("r1", "2025-01-06", "09:00", "09:30")];
        assert!(find_conflict(&candidate("r1", "2025-01-06", "08:00", "12:00"), &existing).is_some());

        let existing = vec![booking("r1", "2025-01-06", "08:00", "12:00")];
        assert!(find_conflict(&candidate("r1", "2025-01-06", "09:00", "09:30"), &existing).is_some());
    }

    #[test]
    fn cancelled_and_rejected_are_transparent() {
        for status in [BookingStatus::Cancelled, BookingStatus::Rejected] {
            let existing = vec![with_status(booking("r1", "2025-01-06", "09:00", "10:00"), status)];
            assert!(
                find_conflict(&candidate("r1", "2025-01-06", "09:00", "10:00"), &existing).is_none(),
                "{status} booking must not block"
            );
        }
    }

    #[test]
    fn pending_bookings_block() {
        let existing = vec![with_status(
            booking("r1", "2025-01-06", "09:00", "10:00"),
            BookingStatus::Pending,
        )];
        assert!(find_conflict(&candidate("r1", "2025-01-06", "09:00", "10:00"), &existing).is_some());
    }

    #[test]
    fn different_rooms_never_conflict() {
        let existing = vec![booking("r1", "2025-01-06", "09:00", "10:00")];
        assert!(find_conflict(&candidate("r2", "2025-01-06", "09:00", "10:00"), &existing).is_none());
    }

    #[test]
    fn weekly_booking_blocks_later_monday() {
        let existing = vec![repeating(
            booking("r1", "2025-03-03", "08:30", "10:30"),
            Recurrence::Weekly,
            Some("2025-12-31"),
        )];
        let hit = find_conflict(&candidate("r1", "2025-03-10", "09:00", "09:30"), &existing);
        assert_eq!(hit, Some(&existing[0]));
    }

    #[test]
    fn weekly_booking_leaves_tuesday_free() {
        let existing = vec![repeating(
            booking("r1", "2025-03-03", "08:30", "10:30"),
            Recurrence::Weekly,
            Some("2025-12-31"),
        )];
        assert!(find_conflict(&candidate("r1", "2025-03-11", "09:00", "09:30"), &existing).is_none());
    }

    #[test]
    fn recurring_booking_does_not_apply_retroactively() {
        let existing = vec![repeating(
            booking("r1", "2025-03-03", "08:30", "10:30"),
            Recurrence::Daily,
            None,
        )];
        assert!(find_conflict(&candidate("r1", "2025-03-02", "09:00", "09:30"), &existing).is_none());
        assert!(find_conflict(&candidate("r1", "2030-03-02", "09:00", "09:30"), &existing).is_some());
    }

    #[test]
    fn daily_booking_expires_after_end_date() {
        let existing = vec![repeating(
            booking("r1", "2025-01-01", "09:00", "10:00"),
            Recurrence::Daily,
            Some("2025-01-10"),
        )];
        assert!(find_conflict(&candidate("r1", "2025-01-10", "09:00", "10:00"), &existing).is_some());
        assert!(find_conflict(&candidate("r1", "2025-01-11", "09:00", "10:00"), &existing).is_none());
    }

    #[test]
    fn first_match_in_iteration_order_wins() {
        let existing = vec![
            booking("r2", "2025-01-06", "09:00", "10:00"),
            booking("r1", "2025-01-06", "09:00", "09:45"),
            booking("r1", "2025-01-06", "09:30", "10:30"),
        ];
        let hit = find_conflict(&candidate("r1", "2025-01-06", "09:15", "09:40"), &existing);
        assert_eq!(hit.map(|b| b.id), Some(existing[1].id));

        let reversed: Vec<_> = existing.iter().rev().collect();
        let hit = find_conflict(&candidate("r1", "2025-01-06", "09:15", "09:40"), reversed);
        assert_eq!(hit.map(|b| b.id), Some(existing[2].id));
    }

    #[test]
    fn empty_collection_has_no_conflict() {
        let existing: Vec<Booking> = Vec::new();
        assert!(find_conflict(&candidate("r1", "2025-01-06", "09:00", "10:00"), &existing).is_none());
    }

    #[test]
    fn missing_fields_are_permitted_by_default() {
        let existing = vec![booking("r1", "2025-01-06", "09:00", "10:00")];
        let full = candidate("r1", "2025-01-06", "09:00", "10:00");

        let mut no_room = full.clone();
        no_room.room_id = None;
        let mut empty_room = full.clone();
        empty_room.room_id = Some(String::new());
        let mut no_date = full.clone();
        no_date.date = None;
        let mut no_start = full.clone();
        no_start.start_time = None;
        let mut no_end = full.clone();
        no_end.end_time = None;

        for c in [no_room, empty_room, no_date, no_start, no_end, CandidateBooking::default()] {
            assert!(find_conflict(&c, &existing).is_none());
        }
    }

    #[test]
    fn reject_policy_names_the_missing_field() {
        let checker = ConflictChecker::new(MissingFieldPolicy::Reject, CandidateScope::FirstDate);
        let existing: Vec<Booking> = Vec::new();

        let mut c = candidate("r1", "2025-01-06", "09:00", "10:00");
        c.start_time = None;
        assert_eq!(
            checker.check(&c, &existing),
            Err(ConflictError::MissingField("startTime"))
        );
        assert_eq!(
            checker.check(&CandidateBooking::default(), &existing),
            Err(ConflictError::MissingField("roomId"))
        );
    }

    #[test]
    fn first_date_scope_ignores_later_candidate_occurrences() {
        // existing single booking next Monday; candidate repeats weekly from this Monday
        let existing = vec![booking("r1", "2025-01-13", "09:00", "10:00")];
        let c = candidate("r1", "2025-01-06", "09:00", "10:00").repeating(Recurrence::Weekly, None);
        assert!(find_conflict(&c, &existing).is_none());
    }

    #[test]
    fn series_scope_checks_every_candidate_occurrence() {
        let existing = vec![booking("r1", "2025-01-13", "09:00", "10:00")];
        let c = candidate("r1", "2025-01-06", "09:00", "10:00").repeating(Recurrence::Weekly, None);
        let checker = ConflictChecker::new(
            MissingFieldPolicy::Permit,
            CandidateScope::Series { horizon_days: 365 },
        );
        assert_eq!(checker.check(&c, &existing), Ok(Some(&existing[0])));
    }

    #[test]
    fn series_scope_stops_at_candidate_end_date_and_horizon() {
        let existing = vec![booking("r1", "2025-01-20", "09:00", "10:00")];
        let checker = ConflictChecker::new(
            MissingFieldPolicy::Permit,
            CandidateScope::Series { horizon_days: 365 },
        );
        let ends_before = candidate("r1", "2025-01-06", "09:00", "10:00")
            .repeating(Recurrence::Weekly, Some(d("2025-01-19")));
        assert_eq!(checker.check(&ends_before, &existing), Ok(None));

        let short_horizon = ConflictChecker::new(
            MissingFieldPolicy::Permit,
            CandidateScope::Series { horizon_days: 7 },
        );
        let open = candidate("r1", "2025-01-06", "09:00", "10:00").repeating(Recurrence::Weekly, None);
        assert_eq!(short_horizon.check(&open, &existing), Ok(None));
        assert_eq!(checker.check(&open, &existing), Ok(Some(&existing[0])));
    }

    #[test]
    fn series_scope_finds_earliest_dated_clash_first() {
        let late = booking("r1", "2025-01-20", "09:00", "10:00");
        let early = booking("r1", "2025-01-08", "09:00", "10:00");
        let existing = vec![late, early];
        let checker = ConflictChecker::new(
            MissingFieldPolicy::Permit,
            CandidateScope::Series { horizon_days: 60 },
        );
        let c = candidate("r1", "2025-01-06", "09:30", "09:45").repeating(Recurrence::Daily, None);
        assert_eq!(checker.check(&c, &existing).unwrap().map(|b| b.id), Some(existing[1].id));
    }

    #[test]
    fn conflict_message_names_purpose_and_start() {
        let b = booking("r1", "2025-03-03", "08:30", "10:30");
        assert_eq!(
            describe_conflict(&b),
            "Conflict detected with \"Advanced Web Development\" starting at 08:30."
        );
    }

    #[test]
    fn time_validation() {
        assert!(validate_times(t("09:00"), t("10:00")).is_ok());
        assert!(matches!(
            validate_times(t("10:00"), t("10:00")),
            Err(EngineError::InvalidTimeRange { .. })
        ));
        assert!(validate_times(t("23:00"), t("01:00")).is_err()); // no cross-midnight spans
    }

    #[test]
    fn recurrence_validation() {
        assert_eq!(
            validate_recurrence(d("2025-01-06"), Recurrence::Once, Some(d("2025-02-01"))).unwrap(),
            None
        );
        assert_eq!(
            validate_recurrence(d("2025-01-06"), Recurrence::Weekly, Some(d("2025-01-06"))).unwrap(),
            Some(d("2025-01-06"))
        );
        assert!(matches!(
            validate_recurrence(d("2025-01-06"), Recurrence::Daily, Some(d("2025-01-05"))),
            Err(EngineError::InvalidRecurrence(_))
        ));
    }
}
