//! Full history of a single monitor.

use std::sync::Arc;

use crate::db::{CheckHistoryEntry, DbError, StateStore};

pub struct HistoryReader {
    store: Arc<dyn StateStore>,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// All retained entries for `monitor_id`, ascending by timestamp.
    ///
    /// Entries with equal timestamps keep their append order.
    pub fn get_history(&self, monitor_id: &str) -> Result<Vec<CheckHistoryEntry>, DbError> {
        let mut entries = self.store.get_history(monitor_id)?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Status, Store};
    use tempfile::NamedTempFile;

    fn entry(timestamp: i64, status: Status) -> CheckHistoryEntry {
        CheckHistoryEntry {
            id: None,
            monitor_id: "api".to_string(),
            timestamp,
            status,
            latency: 20,
            message: None,
        }
    }

    #[test]
    fn test_history_is_ordered_and_repeatable() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        store.append_history(&entry(2_000, Status::Down)).unwrap();
        store.append_history(&entry(1_000, Status::Up)).unwrap();

        let reader = HistoryReader::new(store.clone());
        let first = reader.get_history("api").unwrap();
        let second = reader.get_history("api").unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|e| e.status).collect::<Vec<_>>(),
            vec![Status::Up, Status::Down]
        );

        store.append_history(&entry(3_000, Status::Up)).unwrap();
        assert_eq!(reader.get_history("api").unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_monitor_is_empty() {
        let tmp = NamedTempFile::new().unwrap();
        let reader = HistoryReader::new(Arc::new(Store::new(tmp.path()).unwrap()));
        assert!(reader.get_history("nope").unwrap().is_empty());
    }
}
