use crate::collectors::lsblk::DEFAULT_COLUMNS;
use crate::collectors::mounts::PROC_MOUNTS;
use crate::collectors::usb::DeviceFilter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub filter: DeviceFilter,

    #[serde(default)]
    pub lsblk: LsblkConfig,

    #[serde(default)]
    pub udev: UdevConfig,

    #[serde(default)]
    pub browse: BrowseConfig,
}

/// Which device-enumeration backend to query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// sysfs plus the udev runtime database
    #[default]
    Udev,
    /// the lsblk command
    Lsblk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// List only volumes that have a mount point.
    pub only_mounted: bool,
    pub source:       SourceKind,
    /// Mount table to read; /proc/mounts on Linux.
    pub mounts_path:  PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsblkConfig {
    /// Columns for `--lsblk`; the first one keys each row.
    pub columns: Vec<String>,
    /// Keep only rows on the usb subsystem. `subsystems` is then appended
    /// to `columns` if missing, since the filter reads it.
    pub usb_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdevConfig {
    pub sys_root:  PathBuf,
    pub udev_data: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub show_hidden: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            only_mounted: false,
            source:       SourceKind::Udev,
            mounts_path:  PathBuf::from(PROC_MOUNTS),
        }
    }
}

impl Default for LsblkConfig {
    fn default() -> Self {
        Self {
            columns:  DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            usb_only: true,
        }
    }
}

impl Default for UdevConfig {
    fn default() -> Self {
        Self {
            sys_root:  PathBuf::from("/sys"),
            udev_data: PathBuf::from("/run/udev/data"),
        }
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Config {
    /// Config from the user's config file, or defaults when it is missing
    /// or unreadable. The file is never written.
    pub fn load() -> Self {
        let path = match Config::config_path() {
            Some(p) => p,
            None    => return Config::default(),
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Config::default();
        }
        match Config::load_from(&path) {
            Ok(c)  => c,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("usbvol").join("usbvol.toml"))
    }
}
