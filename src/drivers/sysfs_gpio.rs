//! Minimal Linux sysfs GPIO access (`/sys/class/gpio`)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// One exported GPIO line
#[derive(Debug, Clone)]
pub struct SysfsPin {
    pin: u32,
    dir: PathBuf,
}

impl SysfsPin {
    /// Export `pin` under `root` (if needed) and set its direction
    pub async fn open(root: &Path, pin: u32, direction: Direction) -> Result<Self> {
        let dir = root.join(format!("gpio{}", pin));
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            debug!("Exporting GPIO {}", pin);
            fs::write(root.join("export"), pin.to_string())
                .await
                .with_context(|| format!("Failed to export GPIO {}", pin))?;
        }

        fs::write(dir.join("direction"), direction.as_str())
            .await
            .with_context(|| format!("Failed to set GPIO {} direction", pin))?;

        Ok(Self { pin, dir })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Raw line level
    pub async fn read(&self) -> Result<bool> {
        let raw = fs::read_to_string(self.dir.join("value"))
            .await
            .with_context(|| format!("Failed to read GPIO {}", self.pin))?;
        Ok(raw.trim() == "1")
    }

    pub async fn write(&self, high: bool) -> Result<()> {
        fs::write(self.dir.join("value"), if high { "1" } else { "0" })
            .await
            .with_context(|| format!("Failed to write GPIO {}", self.pin))
    }
}
