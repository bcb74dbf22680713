//! Single-flight profile locks
//!
//! At most one run per profile may be active. A second request fails at once
//! with [`BatchportError::LockContention`]; it never waits.

use crate::domain::{BatchportError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Keyed try-lock registry
#[derive(Debug, Clone, Default)]
pub struct ProfileLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ProfileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ProfileLocks> = OnceLock::new();
        GLOBAL.get_or_init(ProfileLocks::new).clone()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Takes the lock of `key` or fails immediately
    ///
    /// # Errors
    ///
    /// Returns [`BatchportError::LockContention`] if the key is already held.
    pub fn try_acquire(&self, key: &str) -> Result<ProfileLockGuard> {
        if !self.held().insert(key.to_string()) {
            return Err(BatchportError::LockContention {
                profile_id: key.to_string(),
            });
        }

        tracing::debug!(profile_id = key, "Acquired profile lock");
        Ok(ProfileLockGuard {
            locks: self.clone(),
            key: key.to_string(),
        })
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.held().contains(key)
    }
}

/// Releases its key when dropped, on every exit path
#[derive(Debug)]
pub struct ProfileLockGuard {
    locks: ProfileLocks,
    key: String,
}

impl Drop for ProfileLockGuard {
    fn drop(&mut self) {
        self.locks.held().remove(&self.key);
        tracing::debug!(profile_id = %self.key, "Released profile lock");
    }
}
