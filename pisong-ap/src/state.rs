//! Shared service state
//!
//! Process-wide session counters, read by `/health` and updated by the
//! WebSocket handlers through [`SessionGuard`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared state accessible by all handlers
#[derive(Debug, Default)]
pub struct SharedState {
    /// Sessions currently running
    active_sessions: AtomicUsize,
    /// Sessions started since launch
    sessions_started: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }

    /// Count a new session; it stays active until the guard drops
    pub fn begin_session(self: &Arc<Self>) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        SessionGuard {
            state: Arc::clone(self),
        }
    }
}

/// Decrements the active count on drop
#[derive(Debug)]
pub struct SessionGuard {
    state: Arc<SharedState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}
