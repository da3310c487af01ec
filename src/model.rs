use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open time-of-day interval `[start, end)`. Grid slots and booking
/// ranges are both just intervals; a booking spans one or more grid slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "TimeSlot start must be before end");
        Self { start, end }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Whole hours; booking ranges are slot-aligned so this never truncates
    /// on the 60-minute grid.
    pub fn duration_hours(&self) -> i64 {
        self.duration_minutes() / 60
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Who holds a booking. Two identities refer to the same user when either
/// the student id or the email matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub name: String,
    pub student_id: String,
    pub email: String,
}

impl UserIdentity {
    pub fn same_user(&self, other: &UserIdentity) -> bool {
        self.student_id == other.student_id || self.email == other.email
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// A committed reservation of the gaming area. Never deleted; cancellation
/// flips `status` and keeps the row for quota history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub user: UserIdentity,
    pub number_of_players: u32,
    /// Optional link into the game catalog, owned externally.
    pub game_id: Option<u64>,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
}

impl Booking {
    pub fn range(&self) -> TimeSlot {
        TimeSlot::new(self.start_time, self.end_time)
    }

    pub fn duration_hours(&self) -> i64 {
        self.range().duration_hours()
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// A booking request as submitted by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBooking {
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub user: UserIdentity,
    pub number_of_players: u32,
    pub game_id: Option<u64>,
    pub special_requests: Option<String>,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingConfirmed {
        id: Ulid,
        booking_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        user_name: String,
        student_id: String,
        user_email: String,
        number_of_players: u32,
        game_id: Option<u64>,
        special_requests: Option<String>,
        created_at: NaiveDateTime,
    },
    BookingCancelled {
        id: Ulid,
        booking_date: NaiveDate,
    },
}

impl Event {
    pub fn booking_date(&self) -> NaiveDate {
        match self {
            Event::BookingConfirmed { booking_date, .. }
            | Event::BookingCancelled { booking_date, .. } => *booking_date,
        }
    }

    pub fn booking_id(&self) -> Ulid {
        match self {
            Event::BookingConfirmed { id, .. } | Event::BookingCancelled { id, .. } => *id,
        }
    }

    pub fn confirmed(booking: &Booking) -> Self {
        Event::BookingConfirmed {
            id: booking.id,
            booking_date: booking.booking_date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            user_name: booking.user.name.clone(),
            student_id: booking.user.student_id.clone(),
            user_email: booking.user.email.clone(),
            number_of_players: booking.number_of_players,
            game_id: booking.game_id,
            special_requests: booking.special_requests.clone(),
            created_at: booking.created_at,
        }
    }
}

/// All bookings ever committed, indexed by id and by date. One instance per
/// facility, guarded by a single `RwLock` — the write lock is the global
/// ordering point for submissions and cancellations.
#[derive(Debug, Default)]
pub struct LedgerState {
    bookings: HashMap<Ulid, Booking>,
    by_date: BTreeMap<NaiveDate, Vec<Ulid>>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn get(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn insert(&mut self, booking: Booking) {
        self.by_date
            .entry(booking.booking_date)
            .or_default()
            .push(booking.id);
        self.bookings.insert(booking.id, booking);
    }

    /// Flip a booking to cancelled. Returns the updated booking, or `None`
    /// for an unknown id. Idempotence checks live in the lifecycle manager,
    /// not here.
    pub fn mark_cancelled(&mut self, id: &Ulid) -> Option<&Booking> {
        let booking = self.bookings.get_mut(id)?;
        booking.status = BookingStatus::Cancelled;
        Some(booking)
    }

    /// Confirmed bookings on one date — the conflict detector's input set.
    pub fn confirmed_on(&self, date: NaiveDate) -> impl Iterator<Item = &Booking> {
        self.by_date
            .get(&date)
            .into_iter()
            .flatten()
            .filter_map(|id| self.bookings.get(id))
            .filter(|b| b.is_confirmed())
    }

    /// Confirmed bookings with `booking_date` in `[from, to]` — the quota
    /// tracker's input set.
    pub fn confirmed_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &Booking> {
        self.by_date
            .range(from..=to)
            .flat_map(|(_, ids)| ids)
            .filter_map(|id| self.bookings.get(id))
            .filter(|b| b.is_confirmed())
    }

    /// All bookings (any status) with `booking_date` in `[from, to]`,
    /// date-ordered.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = &Booking> {
        self.by_date
            .range(from..=to)
            .flat_map(|(_, ids)| ids)
            .filter_map(|id| self.bookings.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.by_date
            .values()
            .flatten()
            .filter_map(|id| self.bookings.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn booking_on(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Booking {
        Booking {
            id: Ulid::new(),
            booking_date: date,
            start_time: start,
            end_time: end,
            user: UserIdentity {
                name: "Sam Chen".into(),
                student_id: "s1000".into(),
                email: "sam@example.edu".into(),
            },
            number_of_players: 2,
            game_id: None,
            special_requests: None,
            status: BookingStatus::Confirmed,
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn slot_duration() {
        let slot = TimeSlot::new(t(9, 0), t(10, 0));
        assert_eq!(slot.duration_minutes(), 60);
        assert_eq!(slot.duration_hours(), 1);

        let range = TimeSlot::new(t(14, 0), t(17, 0));
        assert_eq!(range.duration_hours(), 3);
    }

    #[test]
    fn slot_overlap_half_open() {
        let a = TimeSlot::new(t(9, 0), t(10, 0));
        let b = TimeSlot::new(t(9, 30), t(10, 30));
        let c = TimeSlot::new(t(10, 0), t(11, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn same_user_by_either_key() {
        let a = UserIdentity {
            name: "Sam".into(),
            student_id: "s1".into(),
            email: "sam@example.edu".into(),
        };
        let by_id = UserIdentity {
            name: "Samuel".into(),
            student_id: "s1".into(),
            email: "other@example.edu".into(),
        };
        let by_email = UserIdentity {
            name: "S.".into(),
            student_id: "s2".into(),
            email: "sam@example.edu".into(),
        };
        let neither = UserIdentity {
            name: "Kim".into(),
            student_id: "s3".into(),
            email: "kim@example.edu".into(),
        };
        assert!(a.same_user(&by_id));
        assert!(a.same_user(&by_email));
        assert!(!a.same_user(&neither));
    }

    #[test]
    fn ledger_cancel_keeps_history() {
        let mut ledger = LedgerState::new();
        let booking = booking_on(d("2024-06-10"), t(14, 0), t(15, 0));
        let id = booking.id;
        ledger.insert(booking);

        assert_eq!(ledger.confirmed_on(d("2024-06-10")).count(), 1);

        let cancelled = ledger.mark_cancelled(&id).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // Gone from conflict input, still present in the ledger.
        assert_eq!(ledger.confirmed_on(d("2024-06-10")).count(), 0);
        assert_eq!(ledger.booking_count(), 1);
        assert!(ledger.get(&id).is_some());
    }

    #[test]
    fn ledger_date_range_scan() {
        let mut ledger = LedgerState::new();
        ledger.insert(booking_on(d("2024-06-10"), t(9, 0), t(10, 0)));
        ledger.insert(booking_on(d("2024-06-12"), t(9, 0), t(10, 0)));
        ledger.insert(booking_on(d("2024-06-17"), t(9, 0), t(10, 0)));

        // Mon..Sun of the first week picks up only the first two.
        let hits: Vec<_> = ledger
            .confirmed_between(d("2024-06-10"), d("2024-06-16"))
            .collect();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn mark_cancelled_unknown_id_is_none() {
        let mut ledger = LedgerState::new();
        assert!(ledger.mark_cancelled(&Ulid::new()).is_none());
    }

    #[test]
    fn event_round_trip_through_bincode() {
        let booking = booking_on(d("2024-06-10"), t(14, 0), t(15, 0));
        let event = Event::confirmed(&booking);
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
        assert_eq!(decoded.booking_date(), d("2024-06-10"));
    }
}
