//! Queue data model.
//!
//! Everything here is plain data: the two service lines, the per-station
//! record table and the [`Snapshot`] that bundles them for the wire. Only the
//! authority mutates these values; agents hold a wholesale-replaced copy.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One independently sequenced service category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Line {
    /// Visitor registration ("Kunjungan")
    Visit,
    /// Food parcel drop-off ("Makanan")
    Food,
}

impl Line {
    /// Both lines, in display order.
    pub const ALL: [Self; 2] = [Self::Visit, Self::Food];

    /// Upper-case name used inside message tags (`REQUEST_NEXT_VISIT`).
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Visit => "VISIT",
            Self::Food => "FOOD",
        }
    }

    /// Letter spoken before the ticket number.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Visit => "D",
            Self::Food => "A",
        }
    }

    /// Label shown on screens.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Visit => "Kunjungan",
            Self::Food => "Makanan",
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Unknown line name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown line '{0}' (expected visit or food)")]
pub struct ParseLineError(pub String);

impl FromStr for Line {
    type Err = ParseLineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visit" | "kunjungan" | "d" => Ok(Self::Visit),
            "food" | "makanan" | "a" => Ok(Self::Food),
            _ => Err(ParseLineError(s.to_string())),
        }
    }
}

/// Station ids are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("station id must be positive, got {0}")]
pub struct InvalidStationId(pub u32);

/// A physical service point ("Loket"), identified by a small positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StationId(u32);

impl StationId {
    /// Station 1.
    pub const FIRST: Self = Self(1);

    /// Create a station id.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStationId`] for zero.
    pub const fn new(id: u32) -> Result<Self, InvalidStationId> {
        if id == 0 {
            Err(InvalidStationId(id))
        } else {
            Ok(Self(id))
        }
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Stations `1..=count`.
    pub fn range(count: u32) -> impl Iterator<Item = Self> {
        (1..=count).map(Self)
    }
}

impl TryFrom<u32> for StationId {
    type Error = InvalidStationId;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StationId> for u32 {
    fn from(station: StationId) -> Self {
        station.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StationId {
    type Err = InvalidStationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| InvalidStationId(0))
            .and_then(Self::new)
    }
}

/// Format a call time the way the boards show it: `HH.MM` in local time.
#[must_use]
pub fn format_called_at(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%H.%M").to_string()
}

/// Counters for one service line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    /// Highest ticket issued since the last reset
    pub current_number: u32,
    /// Issues since the last reset
    pub total_served: u32,
    /// Station that received the latest issue or recall
    pub active_counter: Option<StationId>,
    /// When the latest issue or recall happened
    pub last_called: Option<String>,
}

impl ServiceLine {
    /// Hand out the next ticket to `station` and return its number.
    ///
    /// Returns `None`, leaving the line untouched, once `u32::MAX` tickets
    /// have been issued since the last reset.
    #[must_use]
    pub fn issue(&mut self, station: StationId, at: String) -> Option<u32> {
        let number = self.current_number.checked_add(1)?;
        self.current_number = number;
        self.total_served = self.total_served.saturating_add(1);
        self.touch(station, at);
        Some(number)
    }

    /// Mark `station` as the latest caller without issuing anything.
    pub fn touch(&mut self, station: StationId, at: String) {
        self.active_counter = Some(station);
        self.last_called = Some(at);
    }

    /// Back to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a station is currently serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Line the ticket belongs to
    pub service: Line,
    /// Ticket number, always positive
    pub number: u32,
    /// Display time of the call
    pub timestamp: String,
}

/// Station id to its latest record, over a fixed set of stations.
///
/// Every configured station is always present as a key so the serialized
/// table lists idle stations as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationTable(BTreeMap<StationId, Option<StationRecord>>);

impl StationTable {
    /// Empty table over the given stations.
    pub fn with_stations(stations: impl IntoIterator<Item = StationId>) -> Self {
        Self(stations.into_iter().map(|station| (station, None)).collect())
    }

    /// Whether `station` is part of the configured set.
    #[must_use]
    pub fn contains(&self, station: StationId) -> bool {
        self.0.contains_key(&station)
    }

    /// Record for `station`, if it has one.
    #[must_use]
    pub fn get(&self, station: StationId) -> Option<&StationRecord> {
        self.0.get(&station).and_then(Option::as_ref)
    }

    /// Overwrite the record of a configured station.
    ///
    /// Returns `false` (and changes nothing) for stations outside the set.
    pub fn record(&mut self, station: StationId, record: StationRecord) -> bool {
        match self.0.get_mut(&station) {
            Some(slot) => {
                *slot = Some(record);
                true
            },
            None => false,
        }
    }

    /// Ticket number held by `station` on `line`, if its record is for that line.
    #[must_use]
    pub fn matches(&self, station: StationId, line: Line) -> Option<u32> {
        self.get(station)
            .filter(|record| record.service == line)
            .map(|record| record.number)
    }

    /// Clear every record belonging to `line`; returns how many were cleared.
    pub fn clear_line(&mut self, line: Line) -> usize {
        let mut cleared = 0;
        for slot in self.0.values_mut() {
            if slot.as_ref().is_some_and(|record| record.service == line) {
                *slot = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Configured stations, ascending.
    pub fn stations(&self) -> impl Iterator<Item = StationId> + '_ {
        self.0.keys().copied()
    }

    /// Every station with its record, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (StationId, Option<&StationRecord>)> {
        self.0.iter().map(|(station, record)| (*station, record.as_ref()))
    }
}

/// The whole authoritative state as broadcast in `SYNC_STATE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The visit line
    pub visit: ServiceLine,
    /// The food line
    pub food: ServiceLine,
    /// Per-station records
    #[serde(alias = "counters")]
    pub stations: StationTable,
}

impl Snapshot {
    /// Counters for `line`.
    #[must_use]
    pub const fn line(&self, line: Line) -> &ServiceLine {
        match line {
            Line::Visit => &self.visit,
            Line::Food => &self.food,
        }
    }
}
