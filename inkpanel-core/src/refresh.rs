//! Hand-off into the refresh scheduler.

use crate::error::RefreshError;

use log::debug;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

/// Stable identifier of a content source (plugin).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentSourceId(String);

impl ContentSourceId {
    /// The AI-quote content source, the only one that reacts to motion.
    pub const AI_TEXT: &'static str = "ai_text";

    /// Wrap a content source id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The AI-quote content source id.
    pub fn ai_text() -> Self {
        Self::new(Self::AI_TEXT)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asks the scheduler to regenerate content immediately.
pub trait RefreshTrigger: Send + Sync {
    /// Request an immediate refresh of `source`.
    fn request_refresh(&self, source: &ContentSourceId) -> Result<(), RefreshError>;
}

/// A manual refresh request as seen by the scheduler side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// The content source to regenerate.
    pub source: ContentSourceId,
}

/// A [`RefreshTrigger`] that queues requests on a channel.
///
/// The scheduler drains the paired [`Receiver`] from its own thread.
#[derive(Debug, Clone)]
pub struct QueuedRefreshTrigger {
    tx: Sender<RefreshRequest>,
}

impl QueuedRefreshTrigger {
    /// Create a trigger and the receiver the scheduler should drain.
    pub fn channel() -> (Self, Receiver<RefreshRequest>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl RefreshTrigger for QueuedRefreshTrigger {
    fn request_refresh(&self, source: &ContentSourceId) -> Result<(), RefreshError> {
        debug!("queueing manual refresh for {}", source);
        self.tx
            .send(RefreshRequest {
                source: source.clone(),
            })
            .map_err(|_| RefreshError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_trigger_delivers_requests() {
        let (trigger, rx) = QueuedRefreshTrigger::channel();
        trigger.request_refresh(&ContentSourceId::ai_text()).unwrap();
        assert_eq!(rx.recv().unwrap().source.as_str(), "ai_text");
    }

    #[test]
    fn test_queued_trigger_reports_closed_scheduler() {
        let (trigger, rx) = QueuedRefreshTrigger::channel();
        drop(rx);
        assert!(matches!(
            trigger.request_refresh(&ContentSourceId::ai_text()),
            Err(RefreshError::Closed)
        ));
    }
}
