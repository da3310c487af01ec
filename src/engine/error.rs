use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

/// Malformed facility setup. Fatal: surfaced at startup, never silently
/// recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidOperatingHours { open_hour: u32, close_hour: u32 },
    InvalidSlotLength(u32),
    InvalidLimit(&'static str),
    InvalidEnvVar { name: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidOperatingHours {
                open_hour,
                close_hour,
            } => write!(
                f,
                "invalid operating hours: open {open_hour} must be before close {close_hour} (close at most 23)"
            ),
            ConfigError::InvalidSlotLength(minutes) => {
                write!(f, "slot length {minutes}m must be positive and divide the open span evenly")
            }
            ConfigError::InvalidLimit(name) => write!(f, "{name} must be positive"),
            ConfigError::InvalidEnvVar { name, value } => {
                write!(f, "{name}: cannot parse {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A rejected booking operation. Every variant is recoverable from the
/// caller's perspective and carries what the caller needs to say why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Date is in the past or past the released booking window.
    OutOfWindow { last_bookable: NaiveDate },
    /// Range is empty, misaligned, or outside operating hours.
    InvalidRange { start: NaiveTime, end: NaiveTime },
    /// Overlaps an existing confirmed booking.
    SlotConflict { booking_id: Ulid },
    /// Single booking longer than the per-booking cap.
    SingleBookingLimit {
        max_hours: u32,
        requested_hours: i64,
    },
    /// Request does not fit the user's remaining weekly hours.
    WeeklyQuotaExceeded {
        remaining_hours: i64,
        requested_hours: i64,
    },
    InvalidField(&'static str),
    AlreadyCancelled(Ulid),
    NotFound(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::OutOfWindow { last_bookable } => write!(
                f,
                "date not open for booking; the schedule is released through {last_bookable}"
            ),
            BookingError::InvalidRange { start, end } => write!(
                f,
                "[{start}, {end}) does not decompose into whole slots within operating hours"
            ),
            BookingError::SlotConflict { booking_id } => {
                write!(f, "time range conflicts with booking {booking_id}")
            }
            BookingError::SingleBookingLimit {
                max_hours,
                requested_hours,
            } => write!(
                f,
                "requested {requested_hours}h exceeds the {max_hours}h per-booking limit"
            ),
            BookingError::WeeklyQuotaExceeded {
                remaining_hours,
                requested_hours,
            } => write!(
                f,
                "requested {requested_hours}h exceeds the {remaining_hours}h left this week"
            ),
            BookingError::InvalidField(field) => write!(f, "invalid field: {field}"),
            BookingError::AlreadyCancelled(id) => write!(f, "booking {id} already cancelled"),
            BookingError::NotFound(id) => write!(f, "booking not found: {id}"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}
