use chrono::NaiveDate;

use crate::model::*;

use super::recurrence::occurs_on;

// ── Day View ──────────────────────────────────────────────────────

/// Active bookings of `room_id` that occupy `date`, ordered by start time.
///
/// The sort is stable, so bookings starting at the same minute keep their
/// collection order.
pub fn occurrences_on_date<'a, I>(room_id: &str, date: NaiveDate, existing: I) -> Vec<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut day: Vec<&Booking> = existing
        .into_iter()
        .filter(|b| b.room_id == room_id && b.is_active() && occurs_on(b, date))
        .collect();
    day.sort_by_key(|b| b.start_time);
    day
}

/// Unoccupied parts of `opening` for a room on a date.
pub fn free_windows<'a, I>(room_id: &str, date: NaiveDate, existing: I, opening: Span) -> Vec<Span>
where
    I: IntoIterator<Item = &'a Booking>,
{
    if opening.start >= opening.end {
        return Vec::new();
    }
    let mut taken: Vec<Span> = occurrences_on_date(room_id, date, existing)
        .into_iter()
        .map(Booking::span)
        .filter(|s| s.start < s.end)
        .collect();
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_spans(&[opening], &taken)
}

/// Merge sorted overlapping/adjacent spans into disjoint spans.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`. Both inputs sorted by start and disjoint.
pub fn subtract_spans(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < b.end {
            result.push(Span::new(current_start, b.end));
        }
    }

    result
}
