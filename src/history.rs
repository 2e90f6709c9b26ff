//! In-memory download history
//!
//! Written by the embedding application after a successful parse, read by
//! its history UI. Newest-first and capped; persistence beyond the process
//! lifetime is a non-goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::config::HistoryConfig;
use crate::types::Platform;

/// One history entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// The parsed source URL
    pub url: String,
    /// Display title (falls back to the description upstream)
    pub title: String,
    /// When the parse succeeded
    pub timestamp: DateTime<Utc>,
    /// Source platform
    pub platform: Platform,
}

impl DownloadRecord {
    /// Create a record stamped with the current time
    pub fn new(url: impl Into<String>, title: impl Into<String>, platform: Platform) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            timestamp: Utc::now(),
            platform,
        }
    }
}

/// Newest-first, capped record list
///
/// Cheaply cloneable; clones share one list. Concurrent adds are safe.
#[derive(Clone)]
pub struct DownloadHistory {
    records: Arc<Mutex<Vec<DownloadRecord>>>,
    max_entries: usize,
}

impl DownloadHistory {
    /// Create an empty history with the configured capacity
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            max_entries: config.max_entries,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DownloadRecord>> {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Prepend a record, dropping the oldest once over capacity
    pub fn add(&self, record: DownloadRecord) {
        let mut records = self.lock();
        records.insert(0, record);
        records.truncate(self.max_entries);
    }

    /// All records, newest first
    pub fn records(&self) -> Vec<DownloadRecord> {
        self.lock().clone()
    }

    /// Remove every record
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no records are held
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
