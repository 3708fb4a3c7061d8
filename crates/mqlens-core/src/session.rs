// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-adapter session slot.
//!
//! Every adapter keeps its live broker session in a [`SessionCell`]. Holding
//! the guard returned by [`SessionCell::lock`] for the whole of an operation
//! serializes broker exchanges, so two callers can never interleave cursors or
//! message ids on the same connection.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::MqError;

/// Guard over a connected session.
pub type SessionGuard<'a, S> = MappedMutexGuard<'a, S>;

pub struct SessionCell<S> {
    inner: Mutex<Option<S>>,
    connected: AtomicBool,
}

impl<S> SessionCell<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Locks the session, failing with `NotConnected` when there is none.
    pub async fn lock(&self) -> Result<SessionGuard<'_, S>, MqError> {
        let guard = self.inner.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_mut()).map_err(|_| MqError::NotConnected)
    }

    /// Installs a freshly connected session, returning any session it replaced.
    pub async fn install(&self, session: S) -> Option<S> {
        let mut guard = self.inner.lock().await;
        let previous = guard.replace(session);
        self.connected.store(true, Ordering::SeqCst);
        previous
    }

    /// Removes the session. Subsequent operations fail with `NotConnected`.
    pub async fn take(&self) -> Option<S> {
        let mut guard = self.inner.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        guard.take()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl<S> Default for SessionCell<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for SessionCell<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCell")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lock_before_install_is_not_connected() {
        let cell: SessionCell<u32> = SessionCell::new();
        assert!(!cell.is_connected());
        assert!(matches!(cell.lock().await, Err(MqError::NotConnected)));
    }

    #[tokio::test]
    async fn install_lock_take_lifecycle() {
        let cell = SessionCell::new();
        assert!(cell.install(5u32).await.is_none());
        assert!(cell.is_connected());
        {
            let mut guard = cell.lock().await.unwrap();
            *guard += 1;
        }
        assert_eq!(cell.take().await, Some(6));
        assert!(!cell.is_connected());
        assert!(matches!(cell.lock().await, Err(MqError::NotConnected)));
    }
}
