//! Persistence actor for the settings document
//!
//! Every write of the settings file goes through this single actor, so
//! writes land on disk in the order they were requested. Each write goes to
//! a temporary file in the same directory which is then atomically renamed
//! over the target; a crash mid-write leaves the previous document intact.
//!
//! Saves that queue up while a write is in flight are coalesced: only the
//! newest document is written and every waiting caller is acknowledged once
//! it is durable.

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace};

use super::{Settings, SettingsError};

/// Commands sent to the persistence actor
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Write a settings document; the sender is acknowledged once durable
    Save {
        settings: Box<Settings>,
        ack: oneshot::Sender<Result<(), SettingsError>>,
    },
    /// Resolve once everything queued before it has been written
    Flush(oneshot::Sender<()>),
    /// Stop the actor after draining earlier commands
    Shutdown,
}

/// Persistence actor that serializes writes of the settings file
pub struct PersistenceActor {
    path: PathBuf,
    command_rx: mpsc::UnboundedReceiver<PersistenceCommand>,
    /// Command pulled off the channel while coalescing saves
    deferred: Option<PersistenceCommand>,
    write_count: u64,
}

/// Handle to communicate with the persistence actor
///
/// Cheap to clone; sending never blocks, so it may be used while holding a
/// synchronous lock to fix the order of writes.
#[derive(Debug, Clone)]
pub struct PersistenceActorHandle {
    cmd_tx: mpsc::UnboundedSender<PersistenceCommand>,
}

impl PersistenceActor {
    /// Spawn the actor writing to `path`
    pub fn spawn(path: impl Into<PathBuf>) -> PersistenceActorHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let actor = PersistenceActor {
            path: path.into(),
            command_rx,
            deferred: None,
            write_count: 0,
        };

        tokio::spawn(actor.run());

        PersistenceActorHandle { cmd_tx }
    }

    async fn run(mut self) {
        debug!("Settings persistence actor started ({})", self.path.display());

        loop {
            let cmd = match self.deferred.take() {
                Some(cmd) => cmd,
                None => match self.command_rx.recv().await {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            match cmd {
                PersistenceCommand::Save { settings, ack } => {
                    self.save_coalesced(settings, ack).await;
                }
                PersistenceCommand::Flush(done) => {
                    trace!("Flush requested");
                    let _ = done.send(());
                }
                PersistenceCommand::Shutdown => {
                    info!(
                        "Settings persistence actor stopped (total writes: {})",
                        self.write_count
                    );
                    return;
                }
            }
        }

        debug!("Settings persistence channel closed");
    }

    /// Write the newest of the queued saves and acknowledge all of them
    async fn save_coalesced(
        &mut self,
        settings: Box<Settings>,
        ack: oneshot::Sender<Result<(), SettingsError>>,
    ) {
        let mut latest = settings;
        let mut acks = vec![ack];

        while let Ok(next) = self.command_rx.try_recv() {
            match next {
                PersistenceCommand::Save { settings, ack } => {
                    latest = settings;
                    acks.push(ack);
                }
                other => {
                    self.deferred = Some(other);
                    break;
                }
            }
        }

        if acks.len() > 1 {
            trace!("Coalesced {} settings writes", acks.len());
        }

        let path = self.path.clone();
        let result = match tokio::task::spawn_blocking(move || write_atomic(&path, &latest)).await
        {
            Ok(result) => result,
            Err(e) => Err(SettingsError::Persist(format!("writer task failed: {}", e))),
        };

        match &result {
            Ok(()) => {
                self.write_count += 1;
                trace!("Settings written (write #{})", self.write_count);
            }
            Err(e) => error!("Failed to write settings: {}", e),
        }

        for ack in acks {
            let outcome = result
                .as_ref()
                .map(|_| ())
                .map_err(|e| SettingsError::Persist(e.to_string()));
            // Best-effort, caller may have gone away
            let _ = ack.send(outcome);
        }
    }
}

impl PersistenceActorHandle {
    /// Queue a write; the returned receiver resolves once it is durable
    pub fn save(&self, settings: Settings) -> Result<oneshot::Receiver<Result<(), SettingsError>>, SettingsError> {
        let (ack, rx) = oneshot::channel();
        self.cmd_tx
            .send(PersistenceCommand::Save {
                settings: Box::new(settings),
                ack,
            })
            .map_err(|_| SettingsError::WriterStopped)?;
        Ok(rx)
    }

    /// Wait until every write queued so far is on disk
    pub async fn flush(&self) -> Result<(), SettingsError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(PersistenceCommand::Flush(tx))
            .map_err(|_| SettingsError::WriterStopped)?;
        rx.await.map_err(|_| SettingsError::WriterStopped)
    }

    /// Signal the actor to stop once earlier commands are processed
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(PersistenceCommand::Shutdown);
    }
}

/// Serialize `settings` next to `path` and rename it into place
pub(crate) fn write_atomic(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(settings)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SettingsError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_back(path: &Path) -> Settings {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_save_is_durable_on_ack() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        let handle = PersistenceActor::spawn(&path);

        let mut settings = Settings::default();
        settings.volume = 42;
        handle.save(settings).unwrap().await.unwrap().unwrap();

        assert_eq!(read_back(&path).volume, 42);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_last_queued_save_wins() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        let handle = PersistenceActor::spawn(&path);

        let mut acks = Vec::new();
        for volume in 0..10u8 {
            let mut settings = Settings::default();
            settings.volume = volume;
            acks.push(handle.save(settings).unwrap());
        }
        for ack in acks {
            ack.await.unwrap().unwrap();
        }

        assert_eq!(read_back(&path).volume, 9);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_flush_after_saves() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        let handle = PersistenceActor::spawn(&path);

        let mut settings = Settings::default();
        settings.device_name = "Den".into();
        let _ack = handle.save(settings).unwrap();
        handle.flush().await.unwrap();

        assert_eq!(read_back(&path).device_name, "Den");
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        let handle = PersistenceActor::spawn(&path);

        for _ in 0..3 {
            handle.save(Settings::default()).unwrap().await.unwrap().unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_save_after_shutdown_fails() {
        let temp = tempdir().unwrap();
        let handle = PersistenceActor::spawn(temp.path().join("settings.json"));
        handle.shutdown();
        handle.flush().await.ok();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(matches!(
            handle.save(Settings::default()),
            Err(SettingsError::WriterStopped)
        ));
    }
}
