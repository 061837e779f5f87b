use super::process::ReplicaProc;
use crate::application::Application;
use crate::error::{DriverError, DriverResult};
use crate::runopts::RunConfig;
use crate::status::AppState;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Mutex;

/// Everything the local scheduler tracks about one submitted app.
pub struct AppRecord {
    pub app: Application,
    pub cfg: RunConfig,
    pub image_roots: HashMap<String, String>,
    pub replicas: Vec<ReplicaProc>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

/// A bounded, insertion-ordered map from `app_id` to [`AppRecord`],
/// evicting the oldest terminal record when full rather than acting as a
/// strict LRU (spec §4.6, §9 design note). The lock is held only for the
/// duration of a map operation, never across a process spawn or `.await`
/// (spec §5).
pub struct AppCache {
    capacity: usize,
    records: Mutex<IndexMap<String, AppRecord>>,
}

impl AppCache {
    pub fn new(capacity: i64) -> DriverResult<Self> {
        if capacity < 1 {
            return Err(DriverError::ValueError(format!(
                "cache_size must be >= 1, got {capacity}"
            )));
        }
        Ok(Self {
            capacity: capacity as usize,
            records: Mutex::new(IndexMap::new()),
        })
    }

    /// If the cache is full, evicts the oldest record whose reconciled
    /// state is terminal. Fails with `CapacityExceeded` if full and
    /// nothing is terminal. No-op if there's room.
    pub fn ensure_capacity(&self, reconcile: impl Fn(&mut AppRecord) -> AppState) -> DriverResult<()> {
        let mut records = self.records.lock().unwrap();
        if records.len() < self.capacity {
            return Ok(());
        }
        let evict_key = records
            .iter_mut()
            .find(|(_, r)| reconcile(r).is_terminal())
            .map(|(k, _)| k.clone());
        match evict_key {
            Some(key) => {
                records.shift_remove(&key);
                Ok(())
            }
            None => Err(DriverError::CapacityExceeded(format!(
                "cache is full at {} entries and no record is terminal",
                self.capacity
            ))),
        }
    }

    pub fn insert(&self, app_id: String, record: AppRecord) {
        self.records.lock().unwrap().insert(app_id, record);
    }

    pub fn with_record_mut<F, R>(&self, app_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut AppRecord) -> R,
    {
        let mut records = self.records.lock().unwrap();
        records.get_mut(app_id).map(f)
    }

    /// Removes `replicas` from the record and marks it cancelled, so the
    /// caller can drive cancellation on them without holding the cache
    /// lock across an `.await` (spec §5).
    pub fn take_for_cancel(&self, app_id: &str) -> Option<Vec<ReplicaProc>> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(app_id)?;
        record.cancelled = true;
        Some(std::mem::take(&mut record.replicas))
    }

    pub fn restore_replicas(&self, app_id: &str, replicas: Vec<ReplicaProc>) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get_mut(app_id) {
            record.replicas = replicas;
        }
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.records.lock().unwrap().contains_key(app_id)
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }
}
