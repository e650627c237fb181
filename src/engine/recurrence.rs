use chrono::{Datelike, NaiveDate};

use crate::model::*;

/// Is `date` one of the days `booking` occupies?
pub fn occurs_on(booking: &Booking, date: NaiveDate) -> bool {
    pattern_occurs_on(booking.date, booking.recurrence, booking.recurrence_end_date, date)
}

/// Occurrence membership for a pattern starting on `first`.
///
/// Patterns never apply before `first` nor after `until`. Weekly patterns repeat
/// on the weekday of `first`.
pub fn pattern_occurs_on(
    first: NaiveDate,
    recurrence: Recurrence,
    until: Option<NaiveDate>,
    date: NaiveDate,
) -> bool {
    if date < first {
        return false;
    }
    if until.is_some_and(|end| date > end) {
        return false;
    }
    match recurrence {
        Recurrence::Once => date == first,
        Recurrence::Daily => true,
        Recurrence::Weekly => date.weekday() == first.weekday(),
    }
}

/// Every occurrence date of a pattern from `first` through `last` (inclusive),
/// ascending. `first` itself is always yielded when `first <= last`, even if
/// `until` is earlier than it.
pub fn occurrence_dates(
    first: NaiveDate,
    recurrence: Recurrence,
    until: Option<NaiveDate>,
    last: NaiveDate,
) -> impl Iterator<Item = NaiveDate> {
    let (step, bound) = match recurrence {
        Recurrence::Once => (1, first),
        Recurrence::Daily => (1, until.map_or(last, |u| u.max(first))),
        Recurrence::Weekly => (7, until.map_or(last, |u| u.max(first))),
    };
    let bound = bound.min(last);
    first
        .iter_days()
        .step_by(step)
        .take_while(move |d| *d <= bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;

    #[test]
    fn single_booking_occurs_only_on_its_date() {
        let b = booking("r1", "2025-01-06", "09:00", "10:00");
        assert!(occurs_on(&b, d("2025-01-06")));
        assert!(!occurs_on(&b, d("2025-01-05")));
        assert!(!occurs_on(&b, d("2025-01-13")));
    }

    #[test]
    fn weekly_open_ended_repeats_on_same_weekday() {
        // 2025-01-06 is a Monday
        let b = repeating(booking("r1", "2025-01-06", "09:00", "10:00"), Recurrence::Weekly, None);
        assert!(occurs_on(&b, d("2025-01-06")));
        assert!(occurs_on(&b, d("2025-01-13")));
        assert!(occurs_on(&b, d("2025-01-20")));
        assert!(occurs_on(&b, d("2027-06-07")));
        assert!(!occurs_on(&b, d("2025-01-07")));
        assert!(!occurs_on(&b, d("2024-12-30"))); // a Monday, but before the first date
    }

    #[test]
    fn daily_end_date_is_inclusive() {
        let b = repeating(
            booking("r1", "2025-01-01", "09:00", "10:00"),
            Recurrence::Daily,
            Some("2025-01-10"),
        );
        assert!(occurs_on(&b, d("2025-01-01")));
        assert!(occurs_on(&b, d("2025-01-05")));
        assert!(occurs_on(&b, d("2025-01-10")));
        assert!(!occurs_on(&b, d("2025-01-11")));
        assert!(!occurs_on(&b, d("2024-12-31")));
    }

    #[test]
    fn weekly_respects_end_date() {
        let b = repeating(
            booking("r1", "2025-03-03", "08:30", "10:30"),
            Recurrence::Weekly,
            Some("2025-03-17"),
        );
        assert!(occurs_on(&b, d("2025-03-17")));
        assert!(!occurs_on(&b, d("2025-03-24")));
    }

    #[test]
    fn weekly_crosses_year_boundary() {
        // 2025-12-29 is a Monday; 2026-01-05 is the next one
        let b = repeating(booking("r1", "2025-12-29", "09:00", "10:00"), Recurrence::Weekly, None);
        assert!(occurs_on(&b, d("2026-01-05")));
        assert!(!occurs_on(&b, d("2026-01-04")));
    }

    #[test]
    fn dates_for_single_booking() {
        let dates: Vec<_> =
            occurrence_dates(d("2025-01-06"), Recurrence::Once, None, d("2025-12-31")).collect();
        assert_eq!(dates, vec![d("2025-01-06")]);
    }

    #[test]
    fn dates_for_weekly_until_end() {
        let dates: Vec<_> = occurrence_dates(
            d("2025-01-06"),
            Recurrence::Weekly,
            Some(d("2025-01-27")),
            d("2025-12-31"),
        )
        .collect();
        assert_eq!(
            dates,
            vec![d("2025-01-06"), d("2025-01-13"), d("2025-01-20"), d("2025-01-27")]
        );
    }

    #[test]
    fn dates_for_open_ended_daily_stop_at_last() {
        let dates: Vec<_> =
            occurrence_dates(d("2025-01-30"), Recurrence::Daily, None, d("2025-02-02")).collect();
        assert_eq!(
            dates,
            vec![d("2025-01-30"), d("2025-01-31"), d("2025-02-01"), d("2025-02-02")]
        );
    }

    #[test]
    fn dates_always_include_first_day() {
        // end date before the start date still yields the first occurrence
        let dates: Vec<_> = occurrence_dates(
            d("2025-01-06"),
            Recurrence::Daily,
            Some(d("2025-01-01")),
            d("2025-12-31"),
        )
        .collect();
        assert_eq!(dates, vec![d("2025-01-06")]);
    }
}
