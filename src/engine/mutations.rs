use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{find_conflict, local_now, local_today};
use super::{BookingError, Engine, quota, slots};

impl Engine {
    /// Validate and commit a booking request. The whole check-then-commit
    /// sequence runs under the ledger write lock, so concurrent submissions
    /// for the same date (or the same user) serialize here and each one
    /// validates against fresh state.
    ///
    /// Validation order, first failure wins:
    /// window → slot alignment → conflict → per-booking cap → weekly quota
    /// → field checks.
    pub async fn submit_booking(
        &self,
        candidate: CandidateBooking,
    ) -> Result<Booking, BookingError> {
        let today = local_today();
        let mut guard = self.ledger.write().await;

        // 1. Booking window: past dates and dates beyond the released
        //    horizon are both out.
        let (first, last_bookable) = quota::booking_window(today);
        if candidate.booking_date < first || candidate.booking_date > last_bookable {
            return Err(BookingError::OutOfWindow { last_bookable });
        }

        // 2. The range must decompose into whole grid slots.
        if !slots::is_slot_aligned(
            &self.config().operating_hours,
            candidate.start_time,
            candidate.end_time,
        ) {
            return Err(BookingError::InvalidRange {
                start: candidate.start_time,
                end: candidate.end_time,
            });
        }
        let range = TimeSlot::new(candidate.start_time, candidate.end_time);

        // 3. No overlap with a confirmed booking on that date.
        if let Some(existing) = find_conflict(&range, guard.confirmed_on(candidate.booking_date)) {
            return Err(BookingError::SlotConflict {
                booking_id: existing.id,
            });
        }

        // 4. Per-booking cap.
        let requested_hours = range.duration_hours();
        if requested_hours > i64::from(self.config().max_single_booking_hours) {
            return Err(BookingError::SingleBookingLimit {
                max_hours: self.config().max_single_booking_hours,
                requested_hours,
            });
        }

        // 5. Weekly quota, computed before counting this request.
        let remaining =
            quota::remaining_hours(self.config(), &guard, &candidate.user, candidate.booking_date);
        if remaining < requested_hours {
            return Err(BookingError::WeeklyQuotaExceeded {
                remaining_hours: remaining,
                requested_hours,
            });
        }

        // 6. Required fields.
        validate_fields(&candidate, self.config().max_players_per_booking)?;
        if guard.booking_count() >= MAX_BOOKINGS {
            return Err(BookingError::LimitExceeded("too many bookings in ledger"));
        }

        let booking = Booking {
            id: Ulid::new(),
            booking_date: candidate.booking_date,
            start_time: candidate.start_time,
            end_time: candidate.end_time,
            user: candidate.user,
            number_of_players: candidate.number_of_players,
            game_id: candidate.game_id,
            special_requests: candidate.special_requests,
            status: BookingStatus::Confirmed,
            created_at: local_now(),
        };

        let event = Event::confirmed(&booking);
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(booking)
    }

    /// Cancel a confirmed booking. One-way and terminal: a second cancel of
    /// the same booking reports `AlreadyCancelled` and changes nothing, so
    /// callers can tell an idempotent retry from a logic error. Runs under
    /// the write lock so it is atomic with respect to concurrent
    /// quota-consuming submissions by the same user.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, BookingError> {
        let mut guard = self.ledger.write().await;

        let booking = guard.get(&id).ok_or(BookingError::NotFound(id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(id));
        }
        let booking_date = booking.booking_date;

        let event = Event::BookingCancelled { id, booking_date };
        self.persist_and_apply(&mut guard, &event).await?;

        let cancelled = guard
            .get(&id)
            .cloned()
            .ok_or(BookingError::NotFound(id))?;
        Ok(cancelled)
    }
}

fn validate_fields(candidate: &CandidateBooking, max_players: u32) -> Result<(), BookingError> {
    let user = &candidate.user;
    if user.name.trim().is_empty() || user.name.len() > MAX_NAME_LEN {
        return Err(BookingError::InvalidField("user_name"));
    }
    if user.email.trim().is_empty() || user.email.len() > MAX_EMAIL_LEN {
        return Err(BookingError::InvalidField("user_email"));
    }
    if user.student_id.trim().is_empty() || user.student_id.len() > MAX_STUDENT_ID_LEN {
        return Err(BookingError::InvalidField("student_id"));
    }
    if candidate.number_of_players == 0 || candidate.number_of_players > max_players {
        return Err(BookingError::InvalidField("number_of_players"));
    }
    if let Some(ref requests) = candidate.special_requests
        && requests.len() > MAX_SPECIAL_REQUESTS_LEN {
            return Err(BookingError::InvalidField("special_requests"));
        }
    Ok(())
}
