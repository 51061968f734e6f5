//! Secondary source backed by BlueZ over the system D-Bus

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};
use zbus::fdo::{ManagedObjects, ObjectManagerProxy};
use zbus::zvariant::OwnedValue;
use zbus::{proxy, Connection};

use super::{SecondarySource, TrackInfo, TransportCommand};
use crate::config::BluetoothConfig;
use crate::state::{PeerId, PlaybackStatus};

const BLUEZ_SERVICE: &str = "org.bluez";
const DEVICE_IFACE: &str = "org.bluez.Device1";
const TRANSPORT_IFACE: &str = "org.bluez.MediaTransport1";
const PLAYER_IFACE: &str = "org.bluez.MediaPlayer1";

/// Transport volume is 7-bit (AVRCP absolute volume)
const TRANSPORT_VOLUME_MAX: u16 = 127;

#[proxy(interface = "org.bluez.Adapter1", default_service = "org.bluez")]
trait Adapter1 {
    #[zbus(property)]
    fn powered(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_powered(&self, value: bool) -> zbus::Result<()>;
    #[zbus(property)]
    fn discoverable(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_discoverable(&self, value: bool) -> zbus::Result<()>;
    #[zbus(property)]
    fn pairable(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn set_pairable(&self, value: bool) -> zbus::Result<()>;
}

#[proxy(interface = "org.bluez.Device1", default_service = "org.bluez")]
trait Device1 {
    fn disconnect(&self) -> zbus::Result<()>;
    #[zbus(property)]
    fn connected(&self) -> zbus::Result<bool>;
    #[zbus(property)]
    fn address(&self) -> zbus::Result<String>;
}

#[proxy(interface = "org.bluez.MediaTransport1", default_service = "org.bluez")]
trait MediaTransport1 {
    #[zbus(property)]
    fn volume(&self) -> zbus::Result<u16>;
    #[zbus(property)]
    fn set_volume(&self, value: u16) -> zbus::Result<()>;
}

#[proxy(interface = "org.bluez.MediaPlayer1", default_service = "org.bluez")]
trait MediaPlayer1 {
    fn play(&self) -> zbus::Result<()>;
    fn pause(&self) -> zbus::Result<()>;
    fn next(&self) -> zbus::Result<()>;
    fn previous(&self) -> zbus::Result<()>;
    #[zbus(property)]
    fn status(&self) -> zbus::Result<String>;
    #[zbus(property)]
    fn position(&self) -> zbus::Result<u32>;
    #[zbus(property)]
    fn track(&self) -> zbus::Result<HashMap<String, OwnedValue>>;
}

/// BlueZ-backed secondary source on one adapter
pub struct BluezSource {
    conn: Connection,
    adapter_path: String,
}

impl BluezSource {
    pub async fn connect(config: &BluetoothConfig) -> Result<Self> {
        let conn = Connection::system()
            .await
            .context("Failed to connect to the system bus")?;
        let adapter_path = format!("/org/bluez/{}", config.adapter);
        info!("🔌 BlueZ adapter {}", adapter_path);
        Ok(Self { conn, adapter_path })
    }

    async fn adapter(&self) -> Result<Adapter1Proxy<'_>> {
        Ok(Adapter1Proxy::builder(&self.conn)
            .path(self.adapter_path.as_str())?
            .build()
            .await?)
    }

    async fn managed_objects(&self) -> Result<ManagedObjects> {
        let manager = ObjectManagerProxy::builder(&self.conn)
            .destination(BLUEZ_SERVICE)?
            .path("/")?
            .build()
            .await?;
        Ok(manager.get_managed_objects().await?)
    }

    /// Connected devices on this adapter as (object path, address)
    async fn connected_devices(&self) -> Result<Vec<(String, PeerId)>> {
        let objects = self.managed_objects().await?;
        let mut devices = Vec::new();
        for path in paths_with_interface(&objects, DEVICE_IFACE, &self.adapter_path) {
            let device = Device1Proxy::builder(&self.conn)
                .path(path.as_str())?
                .build()
                .await?;
            if device.connected().await.unwrap_or(false) {
                let address = device.address().await?;
                devices.push((path, PeerId::new(address)));
            }
        }
        Ok(devices)
    }

    /// Objects implementing `iface` that belong to a connected device
    async fn connected_objects(&self, iface: &str) -> Result<Vec<String>> {
        let devices = self.connected_devices().await?;
        let objects = self.managed_objects().await?;
        Ok(devices
            .iter()
            .flat_map(|(device_path, _)| paths_with_interface(&objects, iface, device_path))
            .collect())
    }

    async fn player(&self) -> Result<Option<MediaPlayer1Proxy<'static>>> {
        let Some(path) = self.connected_objects(PLAYER_IFACE).await?.into_iter().next() else {
            return Ok(None);
        };
        let player = MediaPlayer1Proxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;
        Ok(Some(player))
    }
}

#[async_trait]
impl SecondarySource for BluezSource {
    async fn connected_peers(&self) -> Result<Vec<PeerId>> {
        Ok(self
            .connected_devices()
            .await?
            .into_iter()
            .map(|(_, peer)| peer)
            .collect())
    }

    async fn disconnect(&self, peer: &PeerId) -> Result<()> {
        let path = device_path(&self.adapter_path, peer);
        let device = Device1Proxy::builder(&self.conn)
            .path(path.as_str())?
            .build()
            .await?;
        device
            .disconnect()
            .await
            .with_context(|| format!("Failed to disconnect {}", peer))?;
        debug!("Disconnected {}", peer);
        Ok(())
    }

    async fn set_discoverable(&self, on: bool) -> Result<()> {
        self.adapter().await?.set_discoverable(on).await?;
        Ok(())
    }

    async fn set_pairable(&self, on: bool) -> Result<()> {
        self.adapter().await?.set_pairable(on).await?;
        Ok(())
    }

    async fn set_radio_power(&self, on: bool) -> Result<()> {
        self.adapter().await?.set_powered(on).await?;
        info!("📡 Bluetooth radio {}", if on { "on" } else { "off" });
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        let raw = percent_to_transport(volume);
        for path in self.connected_objects(TRANSPORT_IFACE).await? {
            let transport = MediaTransport1Proxy::builder(&self.conn)
                .path(path.as_str())?
                .build()
                .await?;
            transport.set_volume(raw).await?;
        }
        Ok(())
    }

    async fn transport(&self, command: TransportCommand) -> Result<()> {
        let Some(player) = self.player().await? else {
            anyhow::bail!("no Bluetooth media player connected");
        };
        match command {
            TransportCommand::PlayPause => {
                let status = PlaybackStatus::parse(&player.status().await.unwrap_or_default());
                if status == PlaybackStatus::Playing {
                    player.pause().await?;
                } else {
                    player.play().await?;
                }
            }
            TransportCommand::Next => player.next().await?,
            TransportCommand::Previous => player.previous().await?,
        }
        Ok(())
    }

    async fn track_info(&self) -> Result<TrackInfo> {
        let Some(player) = self.player().await? else {
            return Ok(TrackInfo::default());
        };
        let track = player.track().await.unwrap_or_default();
        let mut info = TrackInfo::default();
        if let Some(title) = dict_str(&track, "Title") {
            info.title = title;
        }
        if let Some(artist) = dict_str(&track, "Artist") {
            info.artist = artist;
        }
        if let Some(album) = dict_str(&track, "Album") {
            info.album = album;
        }
        info.duration_sec = dict_u32(&track, "Duration").map_or(0.0, |ms| f64::from(ms) / 1000.0);
        info.position_sec = player
            .position()
            .await
            .map_or(0.0, |ms| f64::from(ms) / 1000.0);
        Ok(info)
    }

    async fn status(&self) -> Result<PlaybackStatus> {
        match self.player().await? {
            Some(player) => Ok(PlaybackStatus::parse(&player.status().await?)),
            None => Ok(PlaybackStatus::Unknown),
        }
    }
}

/// `/org/bluez/hci0` + `AA:BB:..` -> `/org/bluez/hci0/dev_AA_BB_..`
fn device_path(adapter_path: &str, peer: &PeerId) -> String {
    format!("{}/dev_{}", adapter_path, peer.as_str().replace(':', "_"))
}

fn percent_to_transport(volume: u8) -> u16 {
    (u16::from(volume.min(100)) * TRANSPORT_VOLUME_MAX + 50) / 100
}

/// Object paths under `prefix` that implement `iface`, sorted
fn paths_with_interface(objects: &ManagedObjects, iface: &str, prefix: &str) -> Vec<String> {
    let child_prefix = format!("{}/", prefix);
    let mut paths: Vec<String> = objects
        .iter()
        .filter(|(_, ifaces)| ifaces.keys().any(|name| name.as_str() == iface))
        .map(|(path, _)| path.as_str().to_string())
        .filter(|path| path.starts_with(&child_prefix))
        .collect();
    paths.sort();
    paths
}

fn dict_str(dict: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    let value = dict.get(key)?;
    let s: &str = value.downcast_ref().ok()?;
    Some(s.to_string())
}

fn dict_u32(dict: &HashMap<String, OwnedValue>, key: &str) -> Option<u32> {
    dict.get(key)?.downcast_ref::<u32>().ok()
}
