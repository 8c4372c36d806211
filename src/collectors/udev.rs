//! Block-device enumeration from sysfs and the udev runtime database.
//!
//! Each entry of `/sys/class/block` is a device. Its `uevent` file gives
//! the device node and type; walking the resolved sysfs path upwards gives
//! the subsystem and driver of every parent (scsi, usb, pci, ...); and
//! `/run/udev/data/b<major>:<minor>` adds the properties udev computed,
//! such as `ID_USB_DRIVER` and `ID_FS_LABEL`.

use crate::collectors::usb::DeviceSource;
use crate::error::{Error, Result};
use crate::models::device::DeviceDescriptor;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct UdevDatabase {
    sys_root:  PathBuf,
    udev_data: PathBuf,
}

impl Default for UdevDatabase {
    fn default() -> Self {
        Self::new("/sys", "/run/udev/data")
    }
}

impl UdevDatabase {
    pub fn new(sys_root: impl Into<PathBuf>, udev_data: impl Into<PathBuf>) -> Self {
        Self { sys_root: sys_root.into(), udev_data: udev_data.into() }
    }

    fn describe(&self, class_entry: &Path, name: &str) -> Result<DeviceDescriptor> {
        let uevent_path = class_entry.join("uevent");
        let uevent = fs::read_to_string(&uevent_path)
            .map_err(|e| Error::unavailable(&uevent_path, e))?;
        let mut properties = parse_uevent(&uevent);

        let devname = properties.get("DEVNAME").cloned().unwrap_or_else(|| name.to_string());
        let devtype = properties.remove("DEVTYPE").unwrap_or_default();

        // sysfs `size` counts 512-byte sectors regardless of the logical block size.
        if let Some(sectors) = read_trimmed(&class_entry.join("size")).and_then(|s| s.parse::<u64>().ok()) {
            match sectors.checked_mul(512) {
                Some(bytes) => { properties.insert("SIZE".into(), bytes.to_string()); }
                None        => warn!(device = %name, sectors, "sector count overflows a byte size, ignored"),
            }
        }

        let (subsystems, mut drivers) = self.walk_parents(class_entry);

        if let (Some(major), Some(minor)) = (properties.get("MAJOR"), properties.get("MINOR")) {
            let db_path = self.udev_data.join(format!("b{}:{}", major, minor));
            match fs::read_to_string(&db_path) {
                Ok(text) => properties.extend(parse_udev_db(&text)),
                Err(e)   => debug!(path = %db_path.display(), error = %e, "no udev record"),
            }
        }
        if let Some(drv) = properties.get("ID_USB_DRIVER") {
            if !drivers.contains(drv) {
                drivers.push(drv.clone());
            }
        }

        Ok(DeviceDescriptor {
            node: format!("/dev/{}", devname),
            devtype,
            subsystems,
            drivers,
            properties,
        })
    }

    // Subsystems and drivers from the device itself up to the devices root,
    // nearest first, without duplicates.
    fn walk_parents(&self, class_entry: &Path) -> (Vec<String>, Vec<String>) {
        let mut subsystems = Vec::new();
        let mut drivers = Vec::new();

        let start = match fs::canonicalize(class_entry) {
            Ok(p)  => p,
            Err(e) => {
                warn!(path = %class_entry.display(), error = %e, "cannot resolve sysfs path");
                return (subsystems, drivers);
            }
        };
        let stop = fs::canonicalize(self.sys_root.join("devices"))
            .unwrap_or_else(|_| self.sys_root.clone());

        let mut dir = Some(start.as_path());
        while let Some(d) = dir {
            if d == stop || !d.starts_with(&stop) { break; }
            if let Some(s) = link_name(&d.join("subsystem")) {
                if !subsystems.contains(&s) { subsystems.push(s); }
            }
            if let Some(drv) = link_name(&d.join("driver")) {
                if !drivers.contains(&drv) { drivers.push(drv); }
            }
            dir = d.parent();
        }
        (subsystems, drivers)
    }
}

impl DeviceSource for UdevDatabase {
    fn name(&self) -> &'static str { "udev" }

    fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let class_dir = self.sys_root.join("class").join("block");
        let entries = fs::read_dir(&class_dir).map_err(|e| Error::unavailable(&class_dir, e))?;

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut out = Vec::with_capacity(names.len());
        for name in &names {
            match self.describe(&class_dir.join(name), name) {
                Ok(d)  => out.push(d),
                Err(e) => warn!(device = %name, error = %e, "skipping block device"),
            }
        }
        debug!(devices = out.len(), "enumerated block devices");
        Ok(out)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn link_name(link: &Path) -> Option<String> {
    let target = fs::read_link(link).ok()?;
    target.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// `KEY=VALUE` lines of a sysfs uevent file.
pub fn parse_uevent(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Properties (`E:KEY=VALUE` lines) of a udev database record.
pub fn parse_udev_db(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|l| l.strip_prefix("E:"))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    // Builds a sysfs tree with one SATA disk (sda, sda1) and one USB
    // stick (sdb, sdb1) and a udev record for sdb1.
    fn fake_system() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let sys = root.path().join("sys");
        let udev = root.path().join("udev");
        fs::create_dir_all(sys.join("class/block")).unwrap();
        fs::create_dir_all(&udev).unwrap();

        let pci = sys.join("devices/pci0000:00/0000:00:14.0");
        let ata = pci.join("ata1/host0/target0:0:0/0:0:0:0");
        let usb_dev = pci.join("usb2/2-1");
        let usb_if = usb_dev.join("2-1:1.0");
        let scsi = usb_if.join("host6/target6:0:0/6:0:0:0");
        for d in [&ata, &scsi] {
            fs::create_dir_all(d).unwrap();
        }

        symlink("../../../bus/pci", pci.join("subsystem")).unwrap();
        symlink("../../../../bus/usb", usb_dev.join("subsystem")).unwrap();
        symlink("../../../../bus/usb", usb_if.join("subsystem")).unwrap();
        symlink("../../../../bus/usb/drivers/usb-storage", usb_if.join("driver")).unwrap();
        symlink("../../bus/scsi", scsi.join("subsystem")).unwrap();
        symlink("../../bus/scsi/drivers/sd", scsi.join("driver")).unwrap();
        symlink("../../bus/scsi", ata.join("subsystem")).unwrap();

        let add_block = |parent: &Path, disk: &str, major: u32, minor: u32, part: bool| {
            let mut dir = parent.join("block").join(disk);
            let mut name = disk.to_string();
            if part {
                name = format!("{}1", disk);
                dir = dir.join(&name);
            }
            fs::create_dir_all(&dir).unwrap();
            symlink("/sys/class/block", dir.join("subsystem")).unwrap();
            let devtype = if part { "partition" } else { "disk" };
            fs::write(
                dir.join("uevent"),
                format!("MAJOR={}\nMINOR={}\nDEVNAME={}\nDEVTYPE={}\n", major, minor, name, devtype),
            )
            .unwrap();
            fs::write(dir.join("size"), "2048\n").unwrap();
            symlink(&dir, sys.join("class/block").join(&name)).unwrap();
        };
        add_block(&ata, "sda", 8, 0, false);
        add_block(&ata, "sda", 8, 1, true);
        add_block(&scsi, "sdb", 8, 16, false);
        add_block(&scsi, "sdb", 8, 17, true);

        fs::write(
            udev.join("b8:17"),
            "S:disk/by-label/STICK\nE:ID_USB_DRIVER=usb-storage\nE:ID_FS_LABEL=STICK\nE:ID_FS_UUID=ABCD-1234\nG:systemd\n",
        )
        .unwrap();
        root
    }

    fn db(root: &Path) -> UdevDatabase {
        UdevDatabase::new(root.join("sys"), root.join("udev"))
    }

    #[test]
    fn enumerates_every_block_device_sorted() {
        let root = fake_system();
        let devs = db(root.path()).devices().unwrap();
        let nodes: Vec<&str> = devs.iter().map(|d| d.node.as_str()).collect();
        assert_eq!(nodes, ["/dev/sda", "/dev/sda1", "/dev/sdb", "/dev/sdb1"]);
    }

    #[test]
    fn usb_partition_carries_parent_chain_and_udev_properties() {
        let root = fake_system();
        let devs = db(root.path()).devices().unwrap();
        let sdb1 = devs.iter().find(|d| d.node == "/dev/sdb1").unwrap();
        assert_eq!(sdb1.devtype, "partition");
        assert_eq!(sdb1.subsystems, ["block", "scsi", "usb", "pci"]);
        assert_eq!(sdb1.drivers, ["sd", "usb-storage"]);
        assert_eq!(sdb1.property("ID_FS_LABEL"), Some("STICK"));
        assert_eq!(sdb1.property("SIZE"), Some("1048576"));
        assert!(!sdb1.properties.contains_key("DEVTYPE"));
    }

    #[test]
    fn sata_partition_has_no_usb_in_chain() {
        let root = fake_system();
        let devs = db(root.path()).devices().unwrap();
        let sda1 = devs.iter().find(|d| d.node == "/dev/sda1").unwrap();
        assert!(!sda1.has_subsystem("usb"));
        assert!(sda1.drivers.is_empty());
        assert_eq!(sda1.property("ID_USB_DRIVER"), None);
    }

    #[test]
    fn device_without_uevent_is_skipped() {
        let root = fake_system();
        fs::create_dir(root.path().join("sys/class/block/ghost")).unwrap();
        let devs = db(root.path()).devices().unwrap();
        let nodes: Vec<&str> = devs.iter().map(|d| d.node.as_str()).collect();
        assert_eq!(nodes, ["/dev/sda", "/dev/sda1", "/dev/sdb", "/dev/sdb1"]);
    }

    #[test]
    fn overflowing_sector_count_leaves_size_unset() {
        let root = fake_system();
        fs::write(root.path().join("sys/class/block/sdb1/size"), format!("{}\n", u64::MAX)).unwrap();
        let devs = db(root.path()).devices().unwrap();
        let sdb1 = devs.iter().find(|d| d.node == "/dev/sdb1").unwrap();
        assert_eq!(sdb1.property("SIZE"), None);
        assert_eq!(sdb1.property("ID_FS_LABEL"), Some("STICK"));
    }

    #[test]
    fn missing_sysfs_is_source_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let err = db(root.path()).devices().unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[test]
    fn udev_record_parsing_ignores_non_property_lines() {
        let props = parse_udev_db("S:foo\nE:A=1\nE:B=x=y\nI:123\n");
        assert_eq!(props.len(), 2);
        assert_eq!(props["B"], "x=y");
    }
}
