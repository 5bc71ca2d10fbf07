// MIT License - Copyright (c) 2026 Peter Wright
// Persisted accessory list

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accessory::AccessoryKind;
use crate::error::{BridgeError, Result};

/// An accessory the host registered in a previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAccessory {
    pub uuid: Uuid,
    /// Registry key, see [`DeviceIdentity::key`](crate::identity::DeviceIdentity::key).
    pub identity: String,
    pub kind: AccessoryKind,
    pub display_name: String,
    pub serial_number: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    accessories: Vec<PersistedAccessory>,
}

/// JSON file holding the accessories registered with the host.
#[derive(Debug, Clone)]
pub struct AccessoryCache {
    path: PathBuf,
}

impl AccessoryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load persisted accessories. A missing file is an empty cache.
    ///
    /// A corrupt file is logged and treated as empty so that startup still
    /// proceeds; its accessories are then re-created under the same UUIDs.
    pub fn load(&self) -> Result<Vec<PersistedAccessory>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No accessory cache at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(BridgeError::Cache {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        match serde_json::from_str::<CacheFile>(&text) {
            Ok(file) => Ok(file.accessories),
            Err(e) => {
                warn!("Ignoring unreadable accessory cache {}: {e}", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    /// Replace the cache contents.
    pub fn save(&self, accessories: &[PersistedAccessory]) -> Result<()> {
        let file = CacheFile {
            accessories: accessories.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|source| BridgeError::Cache {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            "Saved {} accessories to {}",
            accessories.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedAccessory {
        PersistedAccessory {
            uuid: Uuid::from_u128(42),
            identity: "contact:1234567:2".to_string(),
            kind: AccessoryKind::ContactSensor,
            display_name: "Front Door".to_string(),
            serial_number: "1234567:2".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AccessoryCache::new(dir.path().join("accessories.json"));
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AccessoryCache::new(dir.path().join("accessories.json"));
        cache.save(&[sample()]).unwrap();
        assert_eq!(cache.load().unwrap(), vec![sample()]);
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accessories.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AccessoryCache::new(path).load().unwrap().is_empty());
    }

    #[test]
    fn test_file_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["kind"], "ContactSensor");
        assert_eq!(json["displayName"], "Front Door");
        assert_eq!(json["serialNumber"], "1234567:2");
    }
}
