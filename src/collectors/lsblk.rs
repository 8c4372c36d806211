use crate::collectors::usb::DeviceSource;
use crate::error::{Error, Result};
use crate::models::device::{DeviceDescriptor, LsblkRecord};
use crate::util::command;
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, warn};

/// Columns requested when no other set is configured.
pub const DEFAULT_COLUMNS: &[&str] = &["name", "maj:min", "size", "ro", "type", "mountpoint"];

/// Columns the USB device source needs.
pub const VOLUME_COLUMNS: &[&str] = &[
    "kname", "mountpoint", "label", "uuid", "model", "size", "type", "fstype", "subsystems",
];

/// Which columns to ask lsblk for, and which rows to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsblkQuery {
    pub columns:            Vec<String>,
    /// Keep only rows whose colon-separated `subsystems` column contains
    /// this exact token (e.g. "usb").
    pub required_subsystem: Option<String>,
}

impl Default for LsblkQuery {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect())
    }
}

impl LsblkQuery {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, required_subsystem: None }
    }

    pub fn usb(columns: Vec<String>) -> Self {
        Self { columns, required_subsystem: Some("usb".into()) }
    }

    /// The column set actually passed to lsblk: `subsystems` is appended
    /// when filtering needs it.
    pub fn effective_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self.columns.iter().map(|c| c.to_lowercase()).collect();
        if self.required_subsystem.is_some() && !cols.iter().any(|c| c == "subsystems") {
            cols.push("subsystems".into());
        }
        cols
    }

    fn accepts(&self, rec: &LsblkRecord) -> bool {
        match &self.required_subsystem {
            None       => true,
            Some(want) => rec
                .get_str("subsystems")
                .map(|s| s.split(':').any(|t| t == want))
                .unwrap_or(false),
        }
    }
}

/// lsblk rows in output order, addressable by the first requested column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDevices {
    key_column: String,
    records:    Vec<LsblkRecord>,
}

impl BlockDevices {
    pub fn records(&self) -> &[LsblkRecord] { &self.records }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn key_of(&self, rec: &LsblkRecord) -> Option<String> {
        rec.get_str(&self.key_column)
    }

    pub fn by_key(&self, key: &str) -> Option<&LsblkRecord> {
        self.records.iter().find(|r| self.key_of(r).as_deref() == Some(key))
    }

    /// Every row's value for `column`, in row order.
    pub fn column(&self, column: &str) -> Vec<Option<String>> {
        self.records.iter().map(|r| r.get_str(column)).collect()
    }
}

/// Run `lsblk --bytes --json --list -o <columns>` and keep the rows the
/// query accepts. An empty column set returns nothing without running lsblk.
pub fn run_lsblk(query: &LsblkQuery) -> Result<BlockDevices> {
    let columns = query.effective_columns();
    if columns.is_empty() {
        return Ok(BlockDevices::default());
    }
    let column_arg = columns.join(",");
    debug!(columns = %column_arg, "running lsblk");

    let stdout = command::run(
        "lsblk",
        Command::new("lsblk").args(["--bytes", "--json", "--list", "-o", &column_arg]),
    )?;
    parse_lsblk(&stdout, query)
}

/// Parse lsblk's JSON output. Nested `children` arrays (tree mode) are
/// flattened depth-first after their parent.
pub fn parse_lsblk(json: &[u8], query: &LsblkQuery) -> Result<BlockDevices> {
    let v: Value = serde_json::from_slice(json)
        .map_err(|e| Error::parse("lsblk output", 0, e.to_string()))?;
    let devices = v["blockdevices"]
        .as_array()
        .ok_or_else(|| Error::parse("lsblk output", 0, "missing \"blockdevices\" array"))?;

    let mut records = Vec::new();
    for dev in devices {
        flatten(dev, &mut records);
    }
    let total = records.len();
    records.retain(|r| query.accepts(r));
    debug!(total, kept = records.len(), "parsed lsblk output");

    let key_column = query
        .effective_columns()
        .into_iter()
        .next()
        .unwrap_or_default();
    Ok(BlockDevices { key_column, records })
}

fn flatten(dev: &Value, out: &mut Vec<LsblkRecord>) {
    let obj = match dev.as_object() {
        Some(o) => o,
        None    => return,
    };
    let fields: BTreeMap<String, Value> = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "children")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    out.push(LsblkRecord { fields });

    if let Some(children) = obj.get("children").and_then(Value::as_array) {
        for child in children {
            flatten(child, out);
        }
    }
}

/// Device source backed by lsblk. lsblk does not report driver bindings,
/// so descriptors from this source have an empty `drivers` list.
#[derive(Debug, Clone)]
pub struct LsblkSource {
    query: LsblkQuery,
}

impl LsblkSource {
    pub fn new() -> Self {
        Self { query: LsblkQuery::new(VOLUME_COLUMNS.iter().map(|c| c.to_string()).collect()) }
    }
}

impl Default for LsblkSource {
    fn default() -> Self { Self::new() }
}

impl DeviceSource for LsblkSource {
    fn name(&self) -> &'static str { "lsblk" }

    fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let devs = run_lsblk(&self.query)?;
        Ok(descriptors(&devs))
    }
}

pub fn descriptors(devs: &BlockDevices) -> Vec<DeviceDescriptor> {
    devs.records()
        .iter()
        .filter_map(|rec| {
            let d = to_descriptor(rec);
            if d.is_none() {
                warn!("lsblk row without kname or name, skipped");
            }
            d
        })
        .collect()
}

fn to_descriptor(rec: &LsblkRecord) -> Option<DeviceDescriptor> {
    let kname = rec.get_str("kname").or_else(|| rec.get_str("name"))?;
    let devtype = match rec.get_str("type").as_deref() {
        Some("part") => "partition".to_string(),
        Some(t)      => t.to_string(),
        None         => String::new(),
    };
    let subsystems = rec
        .get_str("subsystems")
        .map(|s| s.split(':').map(str::to_string).collect())
        .unwrap_or_default();

    let mut properties = BTreeMap::new();
    for (column, key) in [
        ("label", "ID_FS_LABEL"),
        ("uuid", "ID_FS_UUID"),
        ("model", "ID_MODEL"),
        ("fstype", "ID_FS_TYPE"),
        ("mountpoint", "MOUNTPOINT"),
    ] {
        if let Some(v) = rec.get_str(column) {
            properties.insert(key.to_string(), v);
        }
    }
    if let Some(size) = rec.get_u64("size") {
        properties.insert("SIZE".into(), size.to_string());
    }

    Some(DeviceDescriptor {
        node: format!("/dev/{}", kname),
        devtype,
        subsystems,
        drivers: Vec::new(),
        properties,
    })
}
