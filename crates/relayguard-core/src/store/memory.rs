// ── In-process status store ──

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{StatusStore, extract_status, extract_status_lenient, merge_status};
use crate::error::CoreError;
use crate::model::StatusRecord;

/// Status store living in process memory.
///
/// Each publish bumps a version counter that readers can await through
/// [`subscribe`](Self::subscribe).
pub struct MemoryStatusStore {
    records: DashMap<String, Map<String, Value>>,
    version: watch::Sender<u64>,
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            records: DashMap::new(),
            version,
        }
    }

    /// Seed a device entry with configuration-owned fields.
    pub fn register(&self, device_id: impl Into<String>, fields: Map<String, Value>) {
        self.records.insert(device_id.into(), fields);
    }

    /// Full entry for one device, status included.
    pub fn record(&self, device_id: &str) -> Option<Map<String, Value>> {
        self.records.get(device_id).map(|entry| entry.value().clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StatusStore for MemoryStatusStore {
    async fn publish_status(
        &self,
        device_id: &str,
        record: &StatusRecord,
    ) -> Result<(), CoreError> {
        {
            let mut entry = self.records.entry(device_id.to_owned()).or_default();
            merge_status(entry.value_mut(), record)?;
        }
        self.version.send_modify(|v| *v += 1);
        Ok(())
    }

    async fn load_status(&self, device_id: &str) -> Result<Option<StatusRecord>, CoreError> {
        match self.records.get(device_id) {
            Some(entry) => extract_status(entry.value()),
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<BTreeMap<String, StatusRecord>, CoreError> {
        let mut all = BTreeMap::new();
        for entry in &self.records {
            if let Some(record) = extract_status_lenient(entry.key(), entry.value()) {
                all.insert(entry.key().clone(), record);
            }
        }
        Ok(all)
    }
}
