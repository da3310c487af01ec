use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{Booking, TimeSlot};

pub(crate) fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub(crate) fn local_today() -> NaiveDate {
    local_now().date()
}

/// Mark each grid slot booked iff it overlaps any confirmed booking in the
/// set. Intervals are half-open, so a booking ending exactly where a slot
/// starts is not a conflict. O(slots × bookings).
pub fn annotate_slots<'a>(
    slots: &[TimeSlot],
    bookings: impl IntoIterator<Item = &'a Booking>,
) -> Vec<(TimeSlot, bool)> {
    let confirmed: Vec<&Booking> = bookings.into_iter().filter(|b| b.is_confirmed()).collect();
    slots
        .iter()
        .map(|slot| {
            let booked = confirmed.iter().any(|b| slot.overlaps(&b.range()));
            (*slot, booked)
        })
        .collect()
}

/// First confirmed booking overlapping `range`, if any.
pub fn find_conflict<'a>(
    range: &TimeSlot,
    bookings: impl Iterator<Item = &'a Booking>,
) -> Option<&'a Booking> {
    bookings
        .filter(|b| b.is_confirmed())
        .find(|b| range.overlaps(&b.range()))
}
