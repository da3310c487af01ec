use chrono::NaiveTime;

use crate::config::OperatingHours;
use crate::model::TimeSlot;

use super::ConfigError;

/// Derive the ordered slot grid from operating hours: first slot starts at
/// `open_hour:00`, slots are contiguous and fixed-length, and no slot starts
/// at or after `close_hour:00`. Deterministic and pure — the grid is the
/// same for every date the facility is open.
pub fn generate_slots(hours: &OperatingHours) -> Result<Vec<TimeSlot>, ConfigError> {
    hours.validate()?;

    let mut slots = Vec::with_capacity(
        ((hours.close_minute() - hours.open_minute()) / hours.slot_length_minutes) as usize,
    );
    let mut minute = hours.open_minute();
    while minute + hours.slot_length_minutes <= hours.close_minute() {
        slots.push(TimeSlot::new(
            time_at(minute),
            time_at(minute + hours.slot_length_minutes),
        ));
        minute += hours.slot_length_minutes;
    }
    Ok(slots)
}

/// True iff `[start, end)` is non-empty, lies within operating hours, and
/// both endpoints sit on slot boundaries — i.e. the range decomposes into
/// one or more contiguous generated slots.
pub fn is_slot_aligned(hours: &OperatingHours, start: NaiveTime, end: NaiveTime) -> bool {
    if start >= end {
        return false;
    }
    let open = hours.open_minute() as i64;
    let close = hours.close_minute() as i64;
    let start_minute = minute_of(start);
    let end_minute = minute_of(end);
    if start_minute < open || end_minute > close {
        return false;
    }
    let len = hours.slot_length_minutes as i64;
    (start_minute - open) % len == 0 && (end_minute - open) % len == 0
}

fn minute_of(t: NaiveTime) -> i64 {
    (t - NaiveTime::MIN).num_minutes()
}

fn time_at(minute: u32) -> NaiveTime {
    // Validated hours keep every boundary below 24:00.
    NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0)
        .expect("slot boundary within the day")
}
