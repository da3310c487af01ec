//! Wire protocol types: one JSON object per line, requests in, responses
//! and watch events out. Dates are `YYYY-MM-DD`, times are `HH:MM`.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::FacilityConfig;
use crate::engine::{BookingError, DayAvailability};
use crate::model::{Booking, BookingStatus, Event, TimeSlot};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Availability {
        date: String,
    },
    Submit {
        booking_date: String,
        start_time: String,
        end_time: String,
        user_name: String,
        user_email: String,
        student_id: String,
        number_of_players: u32,
        #[serde(default)]
        game_id: Option<u64>,
        #[serde(default)]
        special_requests: Option<String>,
    },
    Cancel {
        booking_id: Ulid,
    },
    Get {
        booking_id: Ulid,
    },
    Bookings {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
        #[serde(default)]
        student_id: Option<String>,
    },
    Config,
    Ping,
    Watch {
        date: String,
    },
    Unwatch {
        date: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(Payload),
    Error(ErrorBody),
    Event(EventBody),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Booking(Box<BookingBody>),
    Bookings(Vec<BookingBody>),
    Availability(AvailabilityBody),
    Config(ConfigBody),
    Health(HealthBody),
    Watch(WatchBody),
}

#[derive(Debug, Serialize)]
pub struct BookingBody {
    pub id: Ulid,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub user_name: String,
    pub user_email: String,
    pub student_id: String,
    pub number_of_players: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub created_at: String,
}

impl From<&Booking> for BookingBody {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            booking_date: format_date(b.booking_date),
            start_time: format_time(b.start_time),
            end_time: format_time(b.end_time),
            user_name: b.user.name.clone(),
            user_email: b.user.email.clone(),
            student_id: b.user.student_id.clone(),
            number_of_players: b.number_of_players,
            game_id: b.game_id,
            special_requests: b.special_requests.clone(),
            status: b.status,
            created_at: b.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlotBody {
    pub start: String,
    pub end: String,
}

impl From<&TimeSlot> for SlotBody {
    fn from(slot: &TimeSlot) -> Self {
        Self {
            start: format_time(slot.start),
            end: format_time(slot.end),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailabilityBody {
    pub date: String,
    pub open: String,
    pub close: String,
    pub available_slots: Vec<SlotBody>,
    pub booked_slots: Vec<SlotBody>,
}

impl From<&DayAvailability> for AvailabilityBody {
    fn from(day: &DayAvailability) -> Self {
        Self {
            date: format_date(day.date),
            open: format_time(day.open),
            close: format_time(day.close),
            available_slots: day.available_slots.iter().map(SlotBody::from).collect(),
            booked_slots: day.booked_slots.iter().map(SlotBody::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigBody {
    pub open_hour: u32,
    pub close_hour: u32,
    pub slot_length_minutes: u32,
    pub max_booking_hours_per_week: u32,
    pub max_single_booking_hours: u32,
    pub max_players_per_booking: u32,
}

impl From<&FacilityConfig> for ConfigBody {
    fn from(c: &FacilityConfig) -> Self {
        Self {
            open_hour: c.operating_hours.open_hour,
            close_hour: c.operating_hours.close_hour,
            slot_length_minutes: c.operating_hours.slot_length_minutes,
            max_booking_hours_per_week: c.max_booking_hours_per_week,
            max_single_booking_hours: c.max_single_booking_hours,
            max_players_per_booking: c.max_players_per_booking,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WatchBody {
    pub date: String,
    pub active: bool,
}

/// A committed event pushed to watchers of its date.
#[derive(Debug, Serialize)]
pub struct EventBody {
    pub kind: &'static str,
    pub date: String,
    pub booking_id: Ulid,
}

impl From<&Event> for EventBody {
    fn from(event: &Event) -> Self {
        let kind = match event {
            Event::BookingConfirmed { .. } => "booking_confirmed",
            Event::BookingCancelled { .. } => "booking_cancelled",
        };
        Self {
            kind,
            date: format_date(event.booking_date()),
            booking_id: event.booking_id(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_bookable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_with: Option<Ulid>,
}

impl ErrorBody {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::bare("bad_request", message.into())
    }

    fn bare(kind: &'static str, message: String) -> Self {
        Self {
            kind,
            message,
            last_bookable: None,
            remaining_hours: None,
            requested_hours: None,
            conflict_with: None,
        }
    }
}

impl From<&BookingError> for ErrorBody {
    fn from(e: &BookingError) -> Self {
        let mut body = Self::bare(error_kind(e), e.to_string());
        match e {
            BookingError::OutOfWindow { last_bookable } => {
                body.last_bookable = Some(format_date(*last_bookable));
            }
            BookingError::SlotConflict { booking_id } => {
                body.conflict_with = Some(*booking_id);
            }
            BookingError::SingleBookingLimit {
                requested_hours, ..
            } => {
                body.requested_hours = Some(*requested_hours);
            }
            BookingError::WeeklyQuotaExceeded {
                remaining_hours,
                requested_hours,
            } => {
                body.remaining_hours = Some(*remaining_hours);
                body.requested_hours = Some(*requested_hours);
            }
            _ => {}
        }
        body
    }
}

fn error_kind(e: &BookingError) -> &'static str {
    match e {
        BookingError::OutOfWindow { .. } => "out_of_window",
        BookingError::InvalidRange { .. } => "invalid_range",
        BookingError::SlotConflict { .. } => "slot_conflict",
        BookingError::SingleBookingLimit { .. } => "single_booking_limit",
        BookingError::WeeklyQuotaExceeded { .. } => "weekly_quota_exceeded",
        BookingError::InvalidField(_) => "invalid_field",
        BookingError::AlreadyCancelled(_) => "already_cancelled",
        BookingError::NotFound(_) => "not_found",
        BookingError::LimitExceeded(_) => "limit_exceeded",
        BookingError::WalError(_) => "storage",
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ErrorBody> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| ErrorBody::bad_request(format!("invalid date: {s:?} (expected YYYY-MM-DD)")))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, ErrorBody> {
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .map_err(|_| ErrorBody::bad_request(format!("invalid time: {s:?} (expected HH:MM)")))
}

pub fn parse_status(s: &str) -> Result<BookingStatus, ErrorBody> {
    match s {
        "confirmed" => Ok(BookingStatus::Confirmed),
        "cancelled" => Ok(BookingStatus::Cancelled),
        other => Err(ErrorBody::bad_request(format!("invalid status: {other:?}"))),
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_lines_deserialize() {
        let req: Request =
            serde_json::from_str(r#"{"op":"availability","date":"2024-06-10"}"#).unwrap();
        assert_eq!(
            req,
            Request::Availability {
                date: "2024-06-10".into()
            }
        );

        let req: Request = serde_json::from_str(
            r#"{"op":"submit","booking_date":"2024-06-10","start_time":"14:00",
                "end_time":"15:00","user_name":"Sam","user_email":"sam@example.edu",
                "student_id":"s1","number_of_players":2}"#,
        )
        .unwrap();
        match req {
            Request::Submit {
                game_id,
                special_requests,
                number_of_players,
                ..
            } => {
                assert_eq!(game_id, None);
                assert_eq!(special_requests, None);
                assert_eq!(number_of_players, 2);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn unknown_op_is_an_error() {
        assert!(serde_json::from_str::<Request>(r#"{"op":"drop_tables"}"#).is_err());
    }

    #[test]
    fn response_wire_shapes() {
        let ok = Response::Ok(Payload::Health(HealthBody { status: "healthy" }));
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"ok":{"status":"healthy"}}"#
        );

        let err = Response::Error(ErrorBody::bad_request("nope"));
        let text = serde_json::to_string(&err).unwrap();
        assert!(text.starts_with(r#"{"error":{"kind":"bad_request""#));
        // Unset detail fields stay off the wire.
        assert!(!text.contains("remaining_hours"));
    }

    #[test]
    fn quota_error_carries_detail() {
        let e = BookingError::WeeklyQuotaExceeded {
            remaining_hours: 1,
            requested_hours: 2,
        };
        let body = ErrorBody::from(&e);
        assert_eq!(body.kind, "weekly_quota_exceeded");
        assert_eq!(body.remaining_hours, Some(1));
        assert_eq!(body.requested_hours, Some(2));
    }

    #[test]
    fn time_parsing_round_trip() {
        let t = parse_time("09:30").unwrap();
        assert_eq!(format_time(t), "09:30");
        assert!(parse_time("9am").is_err());
        assert!(parse_date("10/06/2024").is_err());
    }
}
