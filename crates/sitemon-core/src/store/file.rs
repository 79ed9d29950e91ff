// # File Monitor Store
//
// File-based implementation of MonitorStore with crash recovery.
//
// ## Purpose
//
// Keeps monitors and their snapshot history across daemon restarts so each
// check can diff against the previous run.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "monitors": [
//     {
//       "id": "6f1c...",
//       "url": "https://example.com/sitemap.xml",
//       "enabled": true,
//       "check_interval_minutes": 1440,
//       "last_check": "2025-01-09T12:00:00Z",
//       "next_check": "2025-01-10T12:00:00Z",
//       "created_at": "2025-01-01T08:00:00Z"
//     }
//   ],
//   "snapshots": [
//     {
//       "id": "9a2e...",
//       "monitor_id": "6f1c...",
//       "urls": [{ "loc": "https://example.com/", "lastmod": "2025-01-09" }],
//       "created_at": "2025-01-09T12:00:00Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::StoreData;
use crate::Error;
use crate::model::{Monitor, MonitorUpdate, UrlRecord};
use crate::traits::MonitorStore;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based store with crash recovery
///
/// Every mutation is written through immediately.
///
/// # Example
///
/// ```rust,no_run
/// use sitemon_core::store::FileMonitorStore;
/// use sitemon_core::traits::MonitorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileMonitorStore::new("/var/lib/sitemon/state.json", 20).await?;
///
///     // Atomically written to disk
///     let monitor = store.create_monitor("https://example.com/sitemap.xml", 1440).await?;
///     assert!(store.get_monitor(&monitor.id).await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileMonitorStore {
    path: PathBuf,
    snapshot_retention: usize,
    data: RwLock<StoreData>,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(flatten)]
    data: StoreData,
}

impl FileMonitorStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load the existing store file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start empty
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P, snapshot_retention: usize) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if snapshot_retention == 0 {
            return Err(Error::config("Snapshot retention must be > 0"));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let data = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            snapshot_retention,
            data: RwLock::new(data),
        })
    }

    /// Load the store file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If it is unparseable, try loading backup
    /// 3. If backup also fails, start empty
    async fn load_with_recovery(path: &Path) -> Result<StoreData, Error> {
        match Self::load(path).await {
            Ok(data) => {
                tracing::debug!(
                    monitors = data.monitors.len(),
                    snapshots = data.snapshots.len(),
                    "Loaded store file"
                );
                Ok(data)
            }
            Err(LoadError::Corrupted(e)) => {
                tracing::warn!(
                    "Store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(StoreData::default());
                }

                match Self::load(&backup_path).await {
                    Ok(data) => {
                        tracing::info!(
                            monitors = data.monitors.len(),
                            "Recovered store from backup"
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(data)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unusable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(StoreData::default())
                    }
                }
            }
            Err(LoadError::Io(e)) => Err(e),
        }
    }

    /// Load the store from a file
    async fn load(path: &Path) -> Result<StoreData, LoadError> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(StoreData::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::store(format!(
                "Failed to read store file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupted(Error::store(format!(
                "Failed to parse store file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.data)
    }

    /// Write `data` to disk atomically
    async fn persist(&self, data: &StoreData) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            data: data.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Run a mutation against a copy of the state and swap it in once the
    /// copy is on disk; a failed write leaves memory untouched
    async fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T, Error>) -> Result<T, Error> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let value = f(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(value)
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

/// Distinguishes unreadable files from unparseable ones during load
enum LoadError {
    Io(Error),
    Corrupted(Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) | LoadError::Corrupted(e) => e.fmt(f),
        }
    }
}

#[async_trait]
impl MonitorStore for FileMonitorStore {
    async fn create_monitor(&self, url: &str, check_interval_minutes: u32) -> Result<Monitor, Error> {
        self.mutate(|data| Ok(data.create_monitor(url, check_interval_minutes)))
            .await
    }

    async fn update_monitor(&self, id: &str, update: &MonitorUpdate) -> Result<(), Error> {
        self.mutate(|data| data.update_monitor(id, update)).await
    }

    async fn delete_monitor(&self, id: &str) -> Result<(), Error> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        if !next.delete_monitor(id) {
            return Ok(());
        }
        self.persist(&next).await?;
        *data = next;
        Ok(())
    }

    async fn get_monitor(&self, id: &str) -> Result<Option<Monitor>, Error> {
        Ok(self.data.read().await.get_monitor(id))
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>, Error> {
        Ok(self.data.read().await.list_monitors())
    }

    async fn save_snapshot(&self, monitor_id: &str, urls: Vec<UrlRecord>) -> Result<(), Error> {
        let retention = self.snapshot_retention;
        self.mutate(|data| data.save_snapshot(monitor_id, urls, Some(retention)))
            .await
    }

    async fn latest_snapshot(&self, monitor_id: &str) -> Result<Option<Vec<UrlRecord>>, Error> {
        Ok(self.data.read().await.latest_snapshot(monitor_id))
    }

    async fn flush(&self) -> Result<(), Error> {
        // mutations are on disk before they become visible
        Ok(())
    }
}
