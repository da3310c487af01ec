use chrono::{Datelike, Days, NaiveDate};

use crate::config::FacilityConfig;
use crate::model::{LedgerState, UserIdentity};

/// Monday through Sunday of the calendar week containing `date`,
/// facility-local. Monday start is the working assumption pending a
/// stakeholder decision on the facility's week definition.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Days::new(6))
}

/// The released booking window as of `today`: today through the end of
/// *next* week. The schedule for a new week opens on Monday.
pub fn booking_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (monday, _) = week_bounds(today);
    (today, monday + Days::new(13))
}

/// Confirmed hours `user` already holds in the week containing `date`.
pub fn booked_hours_in_week(ledger: &LedgerState, user: &UserIdentity, date: NaiveDate) -> i64 {
    let (monday, sunday) = week_bounds(date);
    ledger
        .confirmed_between(monday, sunday)
        .filter(|b| b.user.same_user(user))
        .map(|b| b.duration_hours())
        .sum()
}

/// Hours the user may still book in the week containing `date`, before
/// counting the request at hand. Never negative.
pub fn remaining_hours(
    config: &FacilityConfig,
    ledger: &LedgerState,
    user: &UserIdentity,
    date: NaiveDate,
) -> i64 {
    let booked = booked_hours_in_week(ledger, user, date);
    (i64::from(config.max_booking_hours_per_week) - booked).max(0)
}
