// ── JSON file status store ──
//
// One JSON object keyed by device id, rewritten atomically (temp file +
// rename) on every publish. Writers inside one process are serialised by a
// mutex; readers never block and always see a complete document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::{DeviceSource, StatusStore, extract_status, extract_status_lenient, merge_status};
use crate::error::CoreError;
use crate::model::{Device, StatusRecord};

/// Status store persisted to a single JSON document.
///
/// Entries may carry configuration fields (`name`, `serverUrl`, `deviceId`,
/// `authKey`); those survive every publish and let the file double as a
/// [`DeviceSource`].
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, CoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(CoreError::Store {
                    message: format!("cannot read {}: {e}", self.path.display()),
                });
            }
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(CoreError::Store {
                message: format!("{} is not a JSON object", self.path.display()),
            }),
        }
    }

    async fn write_document(&self, doc: &Map<String, Value>) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "status.json".into());
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let body = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl StatusStore for JsonFileStore {
    async fn publish_status(
        &self,
        device_id: &str,
        record: &StatusRecord,
    ) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;

        let entry = doc
            .entry(device_id.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(fields) = entry else {
            return Err(CoreError::Store {
                message: format!("entry for {device_id} is not a JSON object"),
            });
        };
        merge_status(fields, record)?;

        self.write_document(&doc).await?;
        debug!(device = device_id, path = %self.path.display(), "status published");
        Ok(())
    }

    async fn load_status(&self, device_id: &str) -> Result<Option<StatusRecord>, CoreError> {
        let doc = self.read_document().await?;
        match doc.get(device_id) {
            Some(Value::Object(fields)) => extract_status(fields),
            _ => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<BTreeMap<String, StatusRecord>, CoreError> {
        let doc = self.read_document().await?;
        let mut all = BTreeMap::new();
        for (device_id, entry) in &doc {
            if let Value::Object(fields) = entry {
                if let Some(record) = extract_status_lenient(device_id, fields) {
                    all.insert(device_id.clone(), record);
                }
            }
        }
        Ok(all)
    }
}

impl DeviceSource for JsonFileStore {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let doc = self.read_document().await?;
        let text = |fields: &Map<String, Value>, key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        Ok(doc
            .iter()
            .filter_map(|(id, entry)| entry.as_object().map(|fields| (id, fields)))
            .map(|(id, fields)| Device {
                id: id.clone(),
                name: fields.get("name").and_then(Value::as_str).map(str::to_owned),
                server_url: text(fields, "serverUrl"),
                device_id: text(fields, "deviceId"),
                auth_key: SecretString::from(text(fields, "authKey")),
            })
            .collect())
    }
}
