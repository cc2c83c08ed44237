// src/latest.rs
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Last-response-wins slot for overlapping requests.
///
/// In-flight requests cannot be cancelled, so responses may complete out of
/// submission order. Each request takes a sequence number with [`begin`] before
/// calling out; when its response arrives it calls [`offer`], which installs
/// the value only if no newer request has already landed.
///
/// [`begin`]: LatestWins::begin
/// [`offer`]: LatestWins::offer
pub struct LatestWins<T> {
    next_seq: AtomicU64,
    slot: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> LatestWins<T> {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            slot: Mutex::new(None),
        }
    }

    /// Allocates the sequence number for a request about to be issued.
    pub fn begin(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Installs `value` unless a response from a newer request already won.
    /// Returns whether the value was installed.
    pub fn offer(&self, seq: u64, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some((installed, _)) if *installed >= seq => false,
            _ => {
                *slot = Some((seq, value));
                true
            }
        }
    }

    pub fn current(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|(_, v)| v.clone())
    }

    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

impl<T: Clone> Default for LatestWins<T> {
    fn default() -> Self {
        Self::new()
    }
}
