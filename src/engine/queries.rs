use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::model::*;

use super::conflict::annotate_slots;
use super::{BookingError, Engine};

/// One day's schedule: the full grid split into free and taken slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub available_slots: Vec<TimeSlot>,
    pub booked_slots: Vec<TimeSlot>,
}

/// Admin-side listing filter. All fields are conjunctive; `None` means
/// "don't care".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub student_id: Option<String>,
}

impl Engine {
    /// Read-only availability for a date. Unsynchronized with submissions:
    /// the result may be stale by the time the client acts on it — the
    /// commit path re-validates regardless of what a client last saw.
    pub async fn availability(&self, date: NaiveDate) -> DayAvailability {
        let guard = self.ledger.read().await;
        let annotated = annotate_slots(self.slot_grid(), guard.confirmed_on(date));

        let mut available_slots = Vec::new();
        let mut booked_slots = Vec::new();
        for (slot, booked) in annotated {
            if booked {
                booked_slots.push(slot);
            } else {
                available_slots.push(slot);
            }
        }

        // Validated operating hours guarantee a non-empty grid.
        DayAvailability {
            date,
            open: self.slot_grid().first().map(|s| s.start).unwrap_or_default(),
            close: self.slot_grid().last().map(|s| s.end).unwrap_or_default(),
            available_slots,
            booked_slots,
        }
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let guard = self.ledger.read().await;
        guard.get(&id).cloned().ok_or(BookingError::NotFound(id))
    }

    /// Admin view: bookings matching `filter`, ordered by date then start
    /// time. Cancelled bookings are included unless filtered out.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let guard = self.ledger.read().await;
        let from = filter.date_from.unwrap_or(NaiveDate::MIN);
        let to = filter.date_to.unwrap_or(NaiveDate::MAX);

        let mut matches: Vec<Booking> = guard
            .between(from, to)
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .filter(|b| {
                filter
                    .student_id
                    .as_deref()
                    .is_none_or(|sid| b.user.student_id == sid)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|b| (b.booking_date, b.start_time));
        matches
    }

    /// Hours the user may still book in the week containing `date`.
    pub async fn remaining_hours_for(&self, user: &UserIdentity, date: NaiveDate) -> i64 {
        let guard = self.ledger.read().await;
        super::quota::remaining_hours(self.config(), &guard, user, date)
    }
}
