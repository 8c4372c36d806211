use crate::collectors::mounts::read_mount_table;
use crate::error::Result;
use crate::models::device::DeviceDescriptor;
use crate::models::mount::MountTable;
use crate::models::volume::UsbVolume;
use crate::util::cache::Memo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Something that can list block devices.
pub trait DeviceSource {
    fn name(&self) -> &'static str;
    fn devices(&self) -> Result<Vec<DeviceDescriptor>>;
}

/// Predicates a device must satisfy to count as a USB volume.
/// Unset or empty fields match anything.
///
/// The default accepts any partition with `usb` in its subsystem chain,
/// which includes UAS-attached drives and works with both device sources.
/// This is broader than requiring `ID_USB_DRIVER == usb-storage`; that
/// stricter rule is `DeviceFilter::usb_storage()` (CLI `--usb-storage`,
/// or `driver = "usb-storage"` in `[filter]`), and it matches nothing
/// through lsblk, which does not report driver bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFilter {
    /// Exact device type, e.g. "partition".
    pub devtype:   Option<String>,
    /// Must appear among the device's subsystems, e.g. "usb".
    pub subsystem: Option<String>,
    /// Must be bound somewhere on the parent chain, e.g. "usb-storage".
    pub driver:    Option<String>,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            devtype:   Some("partition".into()),
            subsystem: Some("usb".into()),
            driver:    None,
        }
    }
}

impl DeviceFilter {
    /// Partitions behind the usb-storage (bulk-only) driver. UAS devices
    /// bind "uas" instead and do not match.
    pub fn usb_storage() -> Self {
        Self {
            devtype:   Some("partition".into()),
            subsystem: None,
            driver:    Some("usb-storage".into()),
        }
    }

    pub fn matches(&self, dev: &DeviceDescriptor) -> bool {
        predicate(&self.devtype).map_or(true, |t| dev.devtype == t)
            && predicate(&self.subsystem).map_or(true, |s| dev.has_subsystem(s))
            && predicate(&self.driver).map_or(true, |d| dev.has_driver(d))
    }
}

fn predicate(p: &Option<String>) -> Option<&str> {
    p.as_deref().filter(|s| !s.is_empty())
}

/// Join filtered devices against the mount table, in source order.
/// A device without a mount entry yields a volume with no mount point.
pub fn join_volumes(
    devices:      &[DeviceDescriptor],
    filter:       &DeviceFilter,
    mounts:       &MountTable,
    only_mounted: bool,
) -> Vec<UsbVolume> {
    devices
        .iter()
        .filter(|d| filter.matches(d))
        .map(|d| to_volume(d, mounts))
        .filter(|v| !only_mounted || v.mounted())
        .collect()
}

fn to_volume(dev: &DeviceDescriptor, mounts: &MountTable) -> UsbVolume {
    let mut vol = UsbVolume::new(dev.node.clone(), mounts.find_by_source(&dev.node));
    vol.label      = dev.property("ID_FS_LABEL").map(str::to_string);
    vol.uuid       = dev.property("ID_FS_UUID").map(str::to_string);
    vol.model      = dev.property("ID_MODEL").map(|m| m.replace('_', " "));
    vol.fs_type    = dev
        .property("ID_FS_TYPE")
        .map(str::to_string)
        .or_else(|| vol.mount.as_ref().map(|m| m.fs_type.clone()));
    vol.size_bytes = dev.property("SIZE").and_then(|s| s.parse().ok());
    vol
}

/// One-shot enumeration: list devices, read the mount table, join.
pub fn enumerate(
    source:       &dyn DeviceSource,
    filter:       &DeviceFilter,
    mounts_path:  &Path,
    only_mounted: bool,
) -> Result<Vec<UsbVolume>> {
    let devices = source.devices()?;
    let mounts = read_mount_table(mounts_path)?;
    let vols = join_volumes(&devices, filter, &mounts, only_mounted);
    debug!(source = source.name(), devices = devices.len(), volumes = vols.len(), "enumerated usb volumes");
    Ok(vols)
}

/// USB volumes, enumerated on first access and kept until refreshed.
pub struct UsbVolumes {
    source_name: &'static str,
    cache:       Memo<Vec<UsbVolume>>,
}

impl UsbVolumes {
    pub fn new(
        source:       Box<dyn DeviceSource>,
        filter:       DeviceFilter,
        mounts_path:  PathBuf,
        only_mounted: bool,
    ) -> Self {
        let source_name = source.name();
        let cache = Memo::new(move || {
            enumerate(source.as_ref(), &filter, &mounts_path, only_mounted)
        });
        Self { source_name, cache }
    }

    pub fn source_name(&self) -> &'static str { self.source_name }

    /// Cached volumes; enumerates on first call.
    pub fn volumes(&mut self) -> Result<&[UsbVolume]> {
        self.cache.get().map(Vec::as_slice)
    }

    /// Drop the cached list and enumerate again.
    #[allow(dead_code)]
    pub fn refresh(&mut self) -> Result<&[UsbVolume]> {
        info!(source = self.source_name, cached = self.cache.is_cached(), "refreshing usb volumes");
        self.cache.refresh().map(Vec::as_slice)
    }

    #[allow(dead_code)]
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}
