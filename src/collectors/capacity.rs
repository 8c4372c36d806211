use crate::error::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// Space on the filesystem mounted at some path, from statvfs(2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub total_bytes: u64,
    pub used_bytes:  u64,
    pub avail_bytes: u64,
}

impl Capacity {
    pub fn use_pct(&self) -> f64 {
        if self.total_bytes == 0 { return 0.0; }
        self.total_bytes.saturating_sub(self.avail_bytes) as f64 / self.total_bytes as f64 * 100.0
    }
}

pub fn capacity(mount: &Path) -> Result<Capacity> {
    use nix::sys::statvfs::statvfs;
    let stat = statvfs(mount).map_err(|e| Error::unavailable(mount, std::io::Error::from(e)))?;

    let frsize = stat.fragment_size() as u64;
    let total_bytes = stat.blocks() as u64 * frsize;
    let avail_bytes = stat.blocks_available() as u64 * frsize;
    let free_bytes  = stat.blocks_free() as u64 * frsize;

    Ok(Capacity {
        total_bytes,
        used_bytes: total_bytes.saturating_sub(free_bytes),
        avail_bytes,
    })
}
