//! Configuration management for the queue calling system.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values that do not parse fall back to their default; [`Config::validate`]
//! catches settings that parse but make no sense together.

use crate::bootstrap::Mode;
use crate::model::StationId;
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No stations configured
    #[error("QUEUE_STATIONS must be at least 1")]
    NoStations,

    /// Poll interval of zero
    #[error("QUEUE_POLL_INTERVAL_MS must be positive")]
    ZeroPollInterval,

    /// Offset outside what a timezone can be
    #[error("QUEUE_UTC_OFFSET_HOURS must be within -23..=23, got {0}")]
    InvalidUtcOffset(i32),

    /// Control station not in the configured set
    #[error("QUEUE_CONTROL_STATION {station} is outside 1..={stations}")]
    UnknownControlStation {
        /// The configured control station
        station: u32,
        /// Number of stations
        stations: u32,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of stations; ids run `1..=stations`
    pub stations: u32,
    /// Agent poll interval while disconnected
    pub poll_interval: Duration,
    /// Hours east of UTC used for displayed times
    pub utc_offset_hours: i32,
    /// Per-subscriber bus buffer
    pub bus_capacity: usize,
    /// Launch mode
    pub mode: Mode,
    /// Station the console agent starts on
    pub control_station: u32,
    /// How long shutdown waits for in-flight effects
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            stations: lookup("QUEUE_STATIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stations),
            poll_interval: lookup("QUEUE_POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.poll_interval, Duration::from_millis),
            utc_offset_hours: lookup("QUEUE_UTC_OFFSET_HOURS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.utc_offset_hours),
            bus_capacity: lookup("QUEUE_BUS_CAPACITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bus_capacity),
            mode: lookup("QUEUE_MODE").map_or(defaults.mode, |s| Mode::from_query(&s)),
            control_station: lookup("QUEUE_CONTROL_STATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.control_station),
            shutdown_timeout: lookup("QUEUE_SHUTDOWN_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.shutdown_timeout, Duration::from_secs),
        }
    }

    /// Check that the settings make sense together.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stations == 0 {
            return Err(ConfigError::NoStations);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_hours));
        }
        if self.control_station == 0 || self.control_station > self.stations {
            return Err(ConfigError::UnknownControlStation {
                station: self.control_station,
                stations: self.stations,
            });
        }
        Ok(())
    }

    /// Configured station ids, ascending.
    #[must_use]
    pub fn station_ids(&self) -> Vec<StationId> {
        StationId::range(self.stations).collect()
    }

    /// The console agent's station, or station 1 if misconfigured.
    #[must_use]
    pub fn control_station(&self) -> StationId {
        StationId::new(self.control_station)
            .ok()
            .filter(|station| station.get() <= self.stations)
            .unwrap_or(StationId::FIRST)
    }

    /// Offset used for displayed times, UTC if out of range.
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stations: 5,
            poll_interval: Duration::from_millis(2000),
            utc_offset_hours: 7,
            bus_capacity: 64,
            mode: Mode::Display,
            control_station: 1,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.station_ids().len(), 5);
        assert_eq!(config.utc_offset().local_minus_utc(), 7 * 3600);
        assert_eq!(config.control_station(), StationId::FIRST);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let config = Config::from_lookup(lookup(&[
            ("QUEUE_STATIONS", "3"),
            ("QUEUE_POLL_INTERVAL_MS", "250"),
            ("QUEUE_UTC_OFFSET_HOURS", "not-a-number"),
            ("QUEUE_MODE", "mode=CONTROL"),
            ("QUEUE_CONTROL_STATION", "3"),
        ]));
        assert_eq!(config.stations, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.utc_offset_hours, 7);
        assert_eq!(config.mode, Mode::Control);
        assert_eq!(config.control_station().get(), 3);
    }

    #[test]
    fn test_validation() {
        let no_stations = Config { stations: 0, ..Config::default() };
        assert_eq!(no_stations.validate(), Err(ConfigError::NoStations));

        let no_poll = Config { poll_interval: Duration::ZERO, ..Config::default() };
        assert_eq!(no_poll.validate(), Err(ConfigError::ZeroPollInterval));

        let bad_offset = Config { utc_offset_hours: 30, ..Config::default() };
        assert_eq!(bad_offset.validate(), Err(ConfigError::InvalidUtcOffset(30)));
        assert_eq!(bad_offset.utc_offset().local_minus_utc(), 0);

        let far_station = Config { control_station: 9, ..Config::default() };
        assert_eq!(
            far_station.validate(),
            Err(ConfigError::UnknownControlStation { station: 9, stations: 5 })
        );
        assert_eq!(far_station.control_station(), StationId::FIRST);
    }
}
