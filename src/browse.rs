//! Directory listing for the contents of a mounted volume.

use crate::error::{Error, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Directory => "dir",
            EntryKind::File      => "file",
            EntryKind::Symlink   => "link",
            EntryKind::Other     => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Length in bytes for regular files, 0 otherwise.
    pub size: u64,
}

impl Entry {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_hidden(&self) -> bool {
        self.name().starts_with('.')
    }
}

/// Immediate children of `dir`: directories first, then by name.
/// Dot-files are skipped unless `show_hidden`.
pub fn list_dir(dir: &Path, show_hidden: bool) -> Result<Vec<Entry>> {
    let rd = fs::read_dir(dir).map_err(|e| Error::unavailable(dir, e))?;
    let mut out = Vec::new();
    for item in rd {
        let item = item.map_err(|e| Error::unavailable(dir, e))?;
        let path = item.path();
        // symlink_metadata: a link is reported as a link, not its target.
        let meta = match fs::symlink_metadata(&path) {
            Ok(m)  => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat, skipped");
                continue;
            }
        };
        let ft = meta.file_type();
        let kind = if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else if ft.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };
        let entry = Entry { path, kind, size: if ft.is_file() { meta.len() } else { 0 } };
        if show_hidden || !entry.is_hidden() {
            out.push(entry);
        }
    }
    out.sort_by(order);
    Ok(out)
}

/// Every entry below `dir`, depth-first, each directory listed before its
/// contents. Symlinked directories are reported but not descended into.
pub fn walk(dir: &Path, show_hidden: bool) -> Result<Vec<Entry>> {
    let mut out = Vec::new();
    walk_into(dir, show_hidden, &mut out)?;
    Ok(out)
}

fn walk_into(dir: &Path, show_hidden: bool, out: &mut Vec<Entry>) -> Result<()> {
    for entry in list_dir(dir, show_hidden)? {
        let descend = entry.kind == EntryKind::Directory;
        let path = entry.path.clone();
        out.push(entry);
        if descend {
            walk_into(&path, show_hidden, out)?;
        }
    }
    Ok(())
}

fn order(a: &Entry, b: &Entry) -> Ordering {
    let rank = |e: &Entry| if e.kind == EntryKind::Directory { 0 } else { 1 };
    rank(a).cmp(&rank(b)).then_with(|| a.name().cmp(&b.name()))
}
