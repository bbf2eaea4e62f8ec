// ── Shared status store ──
//
// Where the central monitor publishes records and passive readers pick them
// up. A publish only ever touches the `status` field of one device's record;
// every other field on that record belongs to the configuration side.

mod file;
mod memory;

use std::collections::BTreeMap;
use std::future::Future;

use serde_json::{Map, Value};

use tracing::warn;

use crate::error::CoreError;
use crate::model::{Device, StatusRecord};

pub use file::JsonFileStore;
pub use memory::MemoryStatusStore;

/// Field holding the published status inside a device record.
pub const STATUS_FIELD: &str = "status";

/// Per-device status persistence.
pub trait StatusStore: Send + Sync + 'static {
    /// Merge `record` into the device's entry, creating it if needed.
    fn publish_status(
        &self,
        device_id: &str,
        record: &StatusRecord,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn load_status(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Option<StatusRecord>, CoreError>> + Send;

    /// Every device that has a readable status, keyed by device id.
    fn load_all(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<String, StatusRecord>, CoreError>> + Send;
}

/// Enumerates the devices a sweep should cover.
pub trait DeviceSource: Send + Sync + 'static {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Device>, CoreError>> + Send;
}

impl DeviceSource for Vec<Device> {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        Ok(self.clone())
    }
}

/// Replace the `status` field of one device entry, leaving the rest alone.
pub(crate) fn merge_status(
    entry: &mut Map<String, Value>,
    record: &StatusRecord,
) -> Result<(), CoreError> {
    let status = serde_json::to_value(record)?;
    entry.insert(STATUS_FIELD.to_owned(), status);
    Ok(())
}

/// Read the `status` field of one device entry.
///
/// An entry without a status yields `None`; a malformed one is an error.
pub(crate) fn extract_status(
    entry: &Map<String, Value>,
) -> Result<Option<StatusRecord>, CoreError> {
    match entry.get(STATUS_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
    }
}

/// Like [`extract_status`], but a malformed record is logged and read as
/// "no status yet" so it cannot hide every other device's status.
pub(crate) fn extract_status_lenient(
    device_id: &str,
    entry: &Map<String, Value>,
) -> Option<StatusRecord> {
    match extract_status(entry) {
        Ok(record) => record,
        Err(err) => {
            warn!(device = device_id, error = %err, "skipping malformed status record");
            None
        }
    }
}
