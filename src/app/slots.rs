//! Keyed cancellation slots for long-running operations.
//!
//! Each logical operation (catalog fetch, download, prewarm) owns a fixed
//! slot key. Starting a new operation under a key cancels whatever token is
//! currently registered there, so a stale network round-trip can never apply
//! its result over newer state.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TaskSlots {
    slots: Mutex<HashMap<&'static str, CancellationToken>>,
}

impl TaskSlots {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cancel any operation in flight under `key` and register a fresh token
    /// for the new one.
    pub fn begin(&self, key: &'static str) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slots = self.slots.lock();
        if let Some(previous) = slots.insert(key, token.clone()) {
            previous.cancel();
            debug!(slot = key, "Cancelled stale operation");
        }
        token
    }

    /// Cancel the operation under `key`, if any.
    pub fn cancel(&self, key: &'static str) {
        if let Some(token) = self.slots.lock().remove(key) {
            token.cancel();
            debug!(slot = key, "Cancelled operation");
        }
    }

    /// Cancel everything. Used when the active provider changes.
    pub fn cancel_all(&self) {
        let mut slots = self.slots.lock();
        for (key, token) in slots.drain() {
            token.cancel();
            debug!(slot = key, "Cancelled operation");
        }
    }

    /// Deregister `token` if it is still the current occupant of `key`.
    pub fn finish(&self, key: &'static str, token: &CancellationToken) {
        let mut slots = self.slots.lock();
        if slots.get(key).map(|t| t.is_cancelled()) == Some(false)
            && !token.is_cancelled()
        {
            slots.remove(key);
        }
    }
}

impl Default for TaskSlots {
    fn default() -> Self {
        Self::new()
    }
}
