//! Conversion audit records.
//!
//! Every successful conversion may be appended to a history store.
//! Records are immutable once written: the store exposes no update or
//! delete operations, and ids and timestamps are assigned by the store
//! itself. Client metadata (address, user agent) is whatever the
//! caller attached; the core never infers it.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::ConversionResult;

/// Caller-supplied audit metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An immutable audit row for one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: u64,
    pub user: Option<String>,
    pub type_id: u64,
    pub type_slug: String,
    pub input_value: Decimal,
    pub output_value: Decimal,
    pub input_unit: String,
    pub output_unit: String,
    #[serde(flatten)]
    pub client: ClientInfo,
    pub created_at: DateTime<Utc>,
}

/// What a caller hands to the store after a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub result: ConversionResult,
    pub user: Option<String>,
    pub client: ClientInfo,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryError {
    #[error("conversion record not found: {0}")]
    NotFound(u64),

    #[error("history storage failed: {0}")]
    Storage(String),
}

/// Persistence collaborator for conversion records.
pub trait HistoryStore: Send + Sync {
    /// Append a record, assigning its id and creation timestamp.
    fn save(&self, new: NewRecord) -> Result<ConversionRecord, HistoryError>;

    /// Load a record by id.
    fn load(&self, id: u64) -> Result<ConversionRecord, HistoryError>;

    /// The most recent records, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<ConversionRecord>, HistoryError>;
}

/// In-memory reference implementation of [`HistoryStore`].
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<ConversionRecord>>,
    next_id: AtomicU64,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save(&self, new: NewRecord) -> Result<ConversionRecord, HistoryError> {
        let record = ConversionRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            user: new.user,
            type_id: new.result.type_id,
            type_slug: new.result.type_slug,
            input_value: new.result.input_value,
            output_value: new.result.output_value,
            input_unit: new.result.input_unit,
            output_unit: new.result.output_unit,
            client: new.client,
            created_at: Utc::now(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    fn load(&self, id: u64) -> Result<ConversionRecord, HistoryError> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(HistoryError::NotFound(id))
    }

    fn recent(&self, limit: usize) -> Result<Vec<ConversionRecord>, HistoryError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(slug: &str) -> ConversionResult {
        ConversionResult {
            type_id: 1,
            type_slug: slug.to_string(),
            input_value: "100.0000000000".parse().unwrap(),
            output_value: "212.0000000000".parse().unwrap(),
            input_unit: "celsius".into(),
            output_unit: "fahrenheit".into(),
        }
    }

    #[test]
    fn test_save_assigns_id_and_timestamp() {
        let store = MemoryHistoryStore::new();
        let before = Utc::now();
        let first = store
            .save(NewRecord {
                result: make_result("celsius-to-fahrenheit"),
                user: Some("ada".into()),
                client: ClientInfo {
                    ip_address: Some("203.0.113.9".into()),
                    user_agent: Some("converthub-cli/0.1.0".into()),
                },
            })
            .unwrap();
        let second = store
            .save(NewRecord {
                result: make_result("celsius-to-fahrenheit"),
                user: None,
                client: ClientInfo::default(),
            })
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.created_at >= before);
        assert_eq!(first.user.as_deref(), Some("ada"));
        assert_eq!(first.client.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_load_round_trips() {
        let store = MemoryHistoryStore::new();
        let saved = store
            .save(NewRecord {
                result: make_result("celsius-to-fahrenheit"),
                user: None,
                client: ClientInfo::default(),
            })
            .unwrap();
        assert_eq!(store.load(saved.id).unwrap(), saved);
        assert_eq!(store.load(99), Err(HistoryError::NotFound(99)));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let store = MemoryHistoryStore::new();
        for _ in 0..5 {
            store
                .save(NewRecord {
                    result: make_result("celsius-to-fahrenheit"),
                    user: None,
                    client: ClientInfo::default(),
                })
                .unwrap();
        }
        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 5);
        assert_eq!(recent[1].id, 4);
    }
}
