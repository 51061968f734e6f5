//! In-memory settings cache backed by the persistence actor

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::persistence_actor::{write_atomic, PersistenceActor, PersistenceActorHandle};
use super::{Settings, SettingsError};

/// How the settings document was obtained at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// No file existed; defaults were written
    CreatedDefaults,
    /// The file could not be read or parsed; defaults are used in memory
    RecoveredDefaults,
}

/// Durable settings store
///
/// Reads are served from the cache. Updates mutate the cache and queue the
/// resulting document to the persistence actor under the same lock, then wait
/// until it is on disk.
#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    current: Arc<RwLock<Settings>>,
    writer: PersistenceActorHandle,
}

impl SettingsStore {
    /// Load the settings file (or defaults) and start the writer
    ///
    /// Never fails: a missing file is replaced by defaults, a corrupt one is
    /// logged and shadowed by defaults until the next write.
    pub fn open(path: impl Into<PathBuf>) -> (Self, LoadOutcome) {
        let path = path.into();
        let (settings, outcome) = load_or_default(&path);
        let writer = PersistenceActor::spawn(&path);

        let store = Self {
            path,
            current: Arc::new(RwLock::new(settings)),
            writer,
        };
        (store, outcome)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the whole document
    pub fn get_all(&self) -> Settings {
        self.current.read().clone()
    }

    /// Read one value out of the document
    pub fn get<T>(&self, read: impl FnOnce(&Settings) -> T) -> T {
        read(&*self.current.read())
    }

    /// Apply `change` and wait until the resulting document is durable
    pub async fn update<F>(&self, change: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let (snapshot, ack) = {
            let mut current = self.current.write();
            change(&mut *current);
            let snapshot = current.clone();
            let ack = self.writer.save(snapshot.clone())?;
            (snapshot, ack)
        };

        ack.await.map_err(|_| SettingsError::WriterStopped)??;
        Ok(snapshot)
    }

    /// Replace the document with defaults, keeping device identity and Wi-Fi
    pub async fn reset_to_default(&self) -> Result<Settings, SettingsError> {
        let settings = self
            .update(|current| *current = current.reset_from())
            .await?;
        info!("Settings reset to defaults");
        Ok(settings)
    }

    /// Wait for queued writes to land
    pub async fn flush(&self) -> Result<(), SettingsError> {
        self.writer.flush().await
    }

    /// Stop the writer after pending writes
    pub fn shutdown(&self) {
        self.writer.shutdown();
    }
}

fn load_or_default(path: &Path) -> (Settings, LoadOutcome) {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) => (settings, LoadOutcome::Loaded),
            Err(e) => {
                warn!(
                    "Settings file {} is corrupt ({}), using defaults",
                    path.display(),
                    e
                );
                (Settings::default(), LoadOutcome::RecoveredDefaults)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let settings = Settings::default();
            info!("📝 Creating default settings at {}", path.display());
            if let Err(e) = write_atomic(path, &settings) {
                warn!("Failed to write default settings: {}", e);
            }
            (settings, LoadOutcome::CreatedDefaults)
        }
        Err(e) => {
            warn!("Cannot read settings file {} ({}), using defaults", path.display(), e);
            (Settings::default(), LoadOutcome::RecoveredDefaults)
        }
    }
}
