//! Progress observers injected through the configuration
//!
//! The engine reports its progress (strategy decisions, fallbacks, failures)
//! to a [`SortObserver`] instead of a process-wide logger. The default
//! observer forwards everything to the `log` facade; callers that want to
//! silence or capture messages plug in their own.

use log::Level;
use parking_lot::Mutex;

/// Receives progress, warning and error messages from a sort invocation
pub trait SortObserver: Send + Sync {
    fn notify(&self, level: Level, message: &str);
}

/// Forwards messages to the `log` facade under the `hyperion_sort` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SortObserver for LogObserver {
    fn notify(&self, level: Level, message: &str) {
        log::log!(target: "hyperion_sort", level, "{message}");
    }
}

/// Keeps every message in memory, mostly useful in tests
#[derive(Debug, Default)]
pub struct RecordingObserver {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages received so far
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().clone()
    }

    /// Whether any message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl SortObserver for RecordingObserver {
    fn notify(&self, level: Level, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}
