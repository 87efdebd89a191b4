//! Mock announcers for testing.

use crate::announcer::{AnnounceError, Announcement, Announcer};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Announcer that remembers everything it was asked to say.
#[derive(Debug, Default)]
pub struct RecordingAnnouncer {
    heard: Mutex<Vec<Announcement>>,
}

impl RecordingAnnouncer {
    /// Create an empty recording announcer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Announcements delivered so far, in order.
    #[must_use]
    pub fn heard(&self) -> Vec<Announcement> {
        self.heard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(
        &self,
        announcement: Announcement,
    ) -> impl Future<Output = Result<(), AnnounceError>> + Send {
        self.heard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(announcement);
        async move { Ok(()) }
    }
}

/// Announcer whose output device is always broken.
#[derive(Debug, Default)]
pub struct FailingAnnouncer {
    attempts: AtomicUsize,
}

impl FailingAnnouncer {
    /// Create a failing announcer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }

    /// How many announcements were attempted.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Announcer for FailingAnnouncer {
    fn announce(
        &self,
        _announcement: Announcement,
    ) -> impl Future<Output = Result<(), AnnounceError>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        async move { Err(AnnounceError::Unavailable("speaker unplugged".to_string())) }
    }
}
