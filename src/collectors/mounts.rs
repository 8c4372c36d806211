use crate::error::{Error, Result};
use crate::models::mount::{unescape_octal, MountEntry, MountTable};
use crate::util::fields::{split_left_bytes, split_right_bytes};
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Read and parse the mount table at `path` (normally /proc/mounts).
pub fn read_mount_table(path: &Path) -> Result<MountTable> {
    // Mount points are arbitrary bytes; do not require UTF-8.
    let raw = fs::read(path).map_err(|e| Error::unavailable(path, e))?;
    let table = parse_mounts(&raw)?;
    debug!(path = %path.display(), entries = table.len(), "read mount table");
    Ok(table)
}

/// Parse mount-table text. Blank lines are skipped; any other line that
/// does not have six fields is an error. Targets keep their exact bytes;
/// the other fields are decoded lossily.
pub fn parse_mounts(text: impl AsRef<[u8]>) -> Result<MountTable> {
    let mut entries = Vec::new();
    for (idx, line) in text.as_ref().split(|b| *b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) { continue; }
        entries.push(parse_line(line, idx + 1)?);
    }
    Ok(MountTable::new(entries))
}

// The target may contain whitespace (when not octal-escaped), the four
// trailing fields never do: split the source off the left, then the
// remaining fields off the right.
fn parse_line(line: &[u8], lineno: usize) -> Result<MountEntry> {
    let (head, rest) = split_left_bytes(line, 1);
    let source = match head.first() {
        Some(s) => *s,
        None    => return Err(Error::parse("mount entry", lineno, "empty line")),
    };
    let (target, tail) = split_right_bytes(rest, 4);
    if tail.len() < 4 || target.is_empty() {
        return Err(Error::parse(
            "mount entry",
            lineno,
            format!("expected 6 fields in {:?}", String::from_utf8_lossy(line)),
        ));
    }

    Ok(MountEntry {
        source:     lossy(&unescape_octal(source)),
        target:     PathBuf::from(OsString::from_vec(unescape_octal(target))),
        fs_type:    lossy(tail[0]),
        options:    lossy(tail[1]),
        dump_flag:  parse_flag(tail[2], "dump", lineno)?,
        pass_flag:  parse_flag(tail[3], "pass", lineno)?,
        raw_target: Some(lossy(target)),
    })
}

fn lossy(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn parse_flag(field: &[u8], name: &str, lineno: usize) -> Result<u32> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| {
            Error::parse(
                "mount entry",
                lineno,
                format!("{} flag {:?} is not a number", name, String::from_utf8_lossy(field)),
            )
        })
}
