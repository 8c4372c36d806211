use crate::models::mount::MountEntry;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A USB-hosted partition, joined against the mount table.
///
/// `mount_point` is `Some` exactly when a mount-table entry's source equals
/// `device`; `mount` then holds that entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsbVolume {
    pub device:      String,
    pub mount_point: Option<PathBuf>,
    pub mount:       Option<MountEntry>,
    pub label:       Option<String>,
    pub uuid:        Option<String>,
    pub model:       Option<String>,
    pub fs_type:     Option<String>,
    pub size_bytes:  Option<u64>,
}

impl UsbVolume {
    /// A volume for `device` with no metadata, mounted per `mount`.
    pub fn new(device: impl Into<String>, mount: Option<&MountEntry>) -> Self {
        Self {
            device:      device.into(),
            mount_point: mount.map(|m| m.target.clone()),
            mount:       mount.cloned(),
            label:       None,
            uuid:        None,
            model:       None,
            fs_type:     None,
            size_bytes:  None,
        }
    }

    pub fn mounted(&self) -> bool {
        self.mount_point.is_some()
    }

    pub fn mount_point(&self) -> Option<&Path> {
        self.mount_point.as_deref()
    }

    /// Label if known, otherwise the short device name.
    pub fn display_name(&self) -> &str {
        self.label
            .as_deref()
            .unwrap_or_else(|| self.device.trim_start_matches("/dev/"))
    }
}
