//! Per-monitor evaluation tokens.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One token per monitor id; held for the whole evaluation of that monitor.
#[derive(Default)]
pub struct MonitorLocks {
    tokens: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MonitorLocks {
    /// Returns `None` when an evaluation of `monitor_id` is already in flight.
    pub fn try_acquire(&self, monitor_id: &str) -> Option<OwnedMutexGuard<()>> {
        let token = {
            let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
            tokens
                .entry(monitor_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        token.try_lock_owned().ok()
    }

    /// Drop idle tokens of monitors that are no longer configured.
    pub fn retain(&self, monitor_ids: &HashSet<&str>) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        // A held guard keeps its own reference to the token.
        tokens.retain(|id, token| monitor_ids.contains(id.as_str()) || Arc::strong_count(token) > 1);
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let locks = MonitorLocks::default();

        let guard = locks.try_acquire("api").unwrap();
        assert!(locks.try_acquire("api").is_none());
        assert!(locks.try_acquire("web").is_some());

        drop(guard);
        assert!(locks.try_acquire("api").is_some());
    }

    #[test]
    fn test_retain_keeps_configured_and_held_tokens() {
        let locks = MonitorLocks::default();
        drop(locks.try_acquire("gone"));
        let held = locks.try_acquire("busy").unwrap();
        drop(locks.try_acquire("kept"));

        locks.retain(&HashSet::from(["kept"]));
        assert_eq!(locks.len(), 2);
        assert!(locks.try_acquire("busy").is_none());

        drop(held);
        locks.retain(&HashSet::from(["kept"]));
        assert_eq!(locks.len(), 1);
    }
}
