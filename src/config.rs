use crate::engine::ConfigError;

/// Facility operating hours. Immutable once loaded; validated at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    /// Opening hour, 24h local time.
    pub open_hour: u32,
    /// Closing hour, 24h local time. Must stay below 24 so the last
    /// slot's end remains a representable time of day.
    pub close_hour: u32,
    /// Fixed slot length. Must divide the open span evenly.
    pub slot_length_minutes: u32,
}

impl OperatingHours {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.open_hour >= self.close_hour {
            return Err(ConfigError::InvalidOperatingHours {
                open_hour: self.open_hour,
                close_hour: self.close_hour,
            });
        }
        if self.close_hour > 23 {
            return Err(ConfigError::InvalidOperatingHours {
                open_hour: self.open_hour,
                close_hour: self.close_hour,
            });
        }
        let span_minutes = (self.close_hour - self.open_hour) * 60;
        if self.slot_length_minutes == 0 || span_minutes % self.slot_length_minutes != 0 {
            return Err(ConfigError::InvalidSlotLength(self.slot_length_minutes));
        }
        Ok(())
    }

    pub fn open_minute(&self) -> u32 {
        self.open_hour * 60
    }

    pub fn close_minute(&self) -> u32 {
        self.close_hour * 60
    }
}

/// Facility-wide booking policy, loaded once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilityConfig {
    pub operating_hours: OperatingHours,
    /// Cumulative confirmed hours one user may hold in a Monday-start week.
    pub max_booking_hours_per_week: u32,
    /// Cap on a single booking's duration, in hours.
    pub max_single_booking_hours: u32,
    pub max_players_per_booking: u32,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            operating_hours: OperatingHours {
                open_hour: 8,
                close_hour: 23,
                slot_length_minutes: 60,
            },
            max_booking_hours_per_week: 4,
            max_single_booking_hours: 4,
            max_players_per_booking: 8,
        }
    }
}

impl FacilityConfig {
    /// Read facility configuration from `FREEPLAY_*` environment variables,
    /// falling back to defaults per field. A present-but-unparsable variable
    /// is a hard error, not a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            operating_hours: OperatingHours {
                open_hour: env_u32("FREEPLAY_OPEN_HOUR", defaults.operating_hours.open_hour)?,
                close_hour: env_u32("FREEPLAY_CLOSE_HOUR", defaults.operating_hours.close_hour)?,
                slot_length_minutes: env_u32(
                    "FREEPLAY_SLOT_MINUTES",
                    defaults.operating_hours.slot_length_minutes,
                )?,
            },
            max_booking_hours_per_week: env_u32(
                "FREEPLAY_MAX_WEEKLY_HOURS",
                defaults.max_booking_hours_per_week,
            )?,
            max_single_booking_hours: env_u32(
                "FREEPLAY_MAX_BOOKING_HOURS",
                defaults.max_single_booking_hours,
            )?,
            max_players_per_booking: env_u32(
                "FREEPLAY_MAX_PLAYERS",
                defaults.max_players_per_booking,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.operating_hours.validate()?;
        if self.max_booking_hours_per_week == 0 {
            return Err(ConfigError::InvalidLimit("FREEPLAY_MAX_WEEKLY_HOURS"));
        }
        if self.max_single_booking_hours == 0 {
            return Err(ConfigError::InvalidLimit("FREEPLAY_MAX_BOOKING_HOURS"));
        }
        if self.max_players_per_booking == 0 {
            return Err(ConfigError::InvalidLimit("FREEPLAY_MAX_PLAYERS"));
        }
        Ok(())
    }
}

fn env_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar { name, value: raw }),
        Err(_) => Ok(default),
    }
}
