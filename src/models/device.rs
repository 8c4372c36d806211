use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A block device as reported by a device-enumeration source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceDescriptor {
    /// Device node, e.g. "/dev/sdb1".
    pub node:       String,
    /// "disk" or "partition".
    pub devtype:    String,
    /// Subsystems of the device and all of its parents, nearest first
    /// (e.g. block, scsi, usb, pci).
    pub subsystems: Vec<String>,
    /// Drivers bound anywhere on the parent chain (e.g. "usb-storage", "uas").
    pub drivers:    Vec<String>,
    /// Remaining key/value attributes (ID_FS_LABEL, ID_MODEL, ...).
    pub properties: BTreeMap<String, String>,
}

impl DeviceDescriptor {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn has_subsystem(&self, subsystem: &str) -> bool {
        self.subsystems.iter().any(|s| s == subsystem)
    }

    pub fn has_driver(&self, driver: &str) -> bool {
        self.drivers.iter().any(|d| d == driver)
    }
}

/// One lsblk row: column name (lowercase, as lsblk emits it in JSON) to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LsblkRecord {
    pub fields: BTreeMap<String, Value>,
}

impl LsblkRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column).filter(|v| !v.is_null())
    }

    /// Column rendered as a string; numbers and booleans are stringified.
    pub fn get_str(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b)   => Some(b.to_string()),
            _                => None,
        }
    }

    /// Numeric column. Older lsblk versions emit numbers as strings.
    pub fn get_u64(&self, column: &str) -> Option<u64> {
        match self.get(column)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _                => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_accessors_tolerate_both_number_styles() {
        let mut r = LsblkRecord::default();
        r.fields.insert("size".into(), json!("1024"));
        r.fields.insert("ro".into(), json!(false));
        r.fields.insert("label".into(), json!("  "));
        r.fields.insert("uuid".into(), Value::Null);
        assert_eq!(r.get_u64("size"), Some(1024));
        assert_eq!(r.get_str("ro").as_deref(), Some("false"));
        assert_eq!(r.get_str("label"), None);
        assert!(r.get("uuid").is_none());
    }

    #[test]
    fn descriptor_lookups() {
        let d = DeviceDescriptor {
            node:       "/dev/sdc1".into(),
            devtype:    "partition".into(),
            subsystems: vec!["block".into(), "scsi".into(), "usb".into()],
            drivers:    vec!["sd".into(), "usb-storage".into()],
            properties: BTreeMap::from([("ID_FS_LABEL".into(), "STICK".into())]),
        };
        assert!(d.has_subsystem("usb"));
        assert!(!d.has_subsystem("us"));
        assert!(d.has_driver("usb-storage"));
        assert_eq!(d.property("ID_FS_LABEL"), Some("STICK"));
        assert_eq!(d.property("ID_FS_UUID"), None);
    }
}
