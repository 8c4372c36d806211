use serde::Serialize;
use std::path::PathBuf;

/// One row of the `df` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskUsageEntry {
    pub source:          String,
    pub size_bytes:      u64,
    pub used_bytes:      u64,
    pub available_bytes: u64,
    /// As printed by df, e.g. "42%" or "-" for pseudo filesystems.
    pub use_percent:     String,
    pub target:          PathBuf,
}

impl DiskUsageEntry {
    /// Numeric value of `use_percent`, None when df printed "-".
    pub fn use_pct(&self) -> Option<f64> {
        self.use_percent.trim_end_matches('%').parse().ok()
    }
}
