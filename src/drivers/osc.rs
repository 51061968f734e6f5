//! Mixer control over OSC/UDP
//!
//! The mixing engine exposes its plugin parameters as
//! `/Carla/<plugin>/set_parameter_value ,if <param> <value>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::trace;

use super::Mixer;
use crate::config::MixerConfig;

/// Fire-and-forget OSC sender for the EQ plugin
pub struct OscMixer {
    socket: UdpSocket,
    target: SocketAddr,
    plugin: i32,
}

impl OscMixer {
    pub async fn bind(config: &MixerConfig) -> Result<Self> {
        let target: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .with_context(|| format!("Invalid mixer address {}:{}", config.host, config.port))?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .context("Failed to bind OSC socket")?;

        Ok(Self {
            socket,
            target,
            plugin: config.eq_plugin,
        })
    }
}

#[async_trait]
impl Mixer for OscMixer {
    async fn set_gain(&self, band_id: i32, value: f32) -> Result<()> {
        let address = format!("/Carla/{}/set_parameter_value", self.plugin);
        let packet = encode_message(&address, band_id, value);
        self.socket
            .send_to(&packet, self.target)
            .await
            .with_context(|| format!("OSC send to {} failed", self.target))?;
        trace!("OSC {} {} {}", address, band_id, value);
        Ok(())
    }
}

/// Encode an OSC message carrying one int32 and one float32 argument
pub fn encode_message(address: &str, param: i32, value: f32) -> Bytes {
    let mut buf = BytesMut::with_capacity(address.len() + 16);
    put_padded_str(&mut buf, address);
    put_padded_str(&mut buf, ",if");
    buf.put_i32(param);
    buf.put_f32(value);
    buf.freeze()
}

/// OSC strings are NUL-terminated and padded to a 4-byte boundary
fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    let pad = 4 - (s.len() % 4);
    buf.put_bytes(0, pad);
}
