//! Announcement collaborator.
//!
//! Every issue and recall raises an [`Announcement`]. Delivering it (speech,
//! a chime, a log line) is the announcer's business; the authority never
//! waits on it and never rolls back because of it.

use crate::model::{Line, StationId};
use std::future::Future;
use thiserror::Error;

/// A ticket being called to a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Announcement {
    /// Line of the ticket
    pub line: Line,
    /// Ticket number
    pub number: u32,
    /// Station the holder should go to
    pub station: StationId,
}

impl Announcement {
    /// The sentence read out in the waiting room.
    ///
    /// ```
    /// use queue_calling::announcer::Announcement;
    /// use queue_calling::model::{Line, StationId};
    ///
    /// let station = StationId::new(2).unwrap();
    /// let announcement = Announcement { line: Line::Visit, number: 5, station };
    /// assert_eq!(
    ///     announcement.phrase(),
    ///     "Nomor Antrian... D... 5... Silakan menuju... Loket 2"
    /// );
    /// ```
    #[must_use]
    pub fn phrase(&self) -> String {
        format!(
            "Nomor Antrian... {}... {}... Silakan menuju... Loket {}",
            self.line.prefix(),
            self.number,
            self.station
        )
    }
}

/// Announcement delivery errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnounceError {
    /// No output device or engine available
    #[error("Announcer unavailable: {0}")]
    Unavailable(String),

    /// The device refused or dropped the announcement
    #[error("Announcement failed: {0}")]
    Failed(String),
}

/// Announcer trait - delivers announcements somewhere audible
pub trait Announcer: Send + Sync {
    /// Deliver one announcement.
    ///
    /// # Errors
    ///
    /// Returns [`AnnounceError`] if the announcement could not be delivered.
    /// Callers log it and move on.
    fn announce(
        &self,
        announcement: Announcement,
    ) -> impl Future<Output = Result<(), AnnounceError>> + Send;
}

/// Announcer that emits the phrase as a structured `info` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(
        &self,
        announcement: Announcement,
    ) -> impl Future<Output = Result<(), AnnounceError>> + Send {
        async move {
            tracing::info!(
                target: "announcement",
                line = %announcement.line,
                number = announcement.number,
                station = %announcement.station,
                phrase = %announcement.phrase(),
                "Calling ticket"
            );
            Ok(())
        }
    }
}
