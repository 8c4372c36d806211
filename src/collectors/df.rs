use crate::error::{Error, Result};
use crate::models::usage::DiskUsageEntry;
use crate::util::command;
use crate::util::fields::split_left;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Run `df -P -B1 [paths...]` and parse its report.
/// An empty `paths` reports every mounted filesystem.
pub fn read_disk_usage(paths: &[&Path]) -> Result<Vec<DiskUsageEntry>> {
    let stdout = command::run("df", Command::new("df").args(["-P", "-B1"]).args(paths))?;
    let text = String::from_utf8_lossy(&stdout);
    let entries = parse_df(&text)?;
    debug!(entries = entries.len(), "read df report");
    Ok(entries)
}

/// Parse df's tabular output:
/// `Filesystem 1-blocks Used Available Capacity Mounted on`.
/// The header line is skipped. The mount point is the last column and
/// is kept intact even when it contains whitespace.
pub fn parse_df(text: &str) -> Result<Vec<DiskUsageEntry>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() { continue; }
        out.push(parse_row(line, idx + 1)?);
    }
    Ok(out)
}

fn parse_row(line: &str, lineno: usize) -> Result<DiskUsageEntry> {
    let (f, target) = split_left(line, 5);
    if f.len() < 5 || target.is_empty() {
        return Err(Error::parse("df row", lineno, format!("expected 6 columns in {:?}", line)));
    }

    Ok(DiskUsageEntry {
        source:          f[0].to_string(),
        size_bytes:      parse_bytes(f[1], lineno)?,
        used_bytes:      parse_bytes(f[2], lineno)?,
        available_bytes: parse_bytes(f[3], lineno)?,
        use_percent:     f[4].to_string(),
        target:          PathBuf::from(target.trim_end()),
    })
}

// Pseudo filesystems report "-" for sizes on some df builds.
fn parse_bytes(field: &str, lineno: usize) -> Result<u64> {
    if field == "-" { return Ok(0); }
    field.parse().map_err(|_| Error::parse("df row", lineno, format!("{:?} is not a byte count", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Filesystem     1-blocks      Used Available Capacity Mounted on\n";

    #[test]
    fn parses_report_and_skips_header() {
        let text = format!(
            "{}/dev/sda2 494384795648 120 494384795528 1% /\ntmpfs 8192 0 8192 0% /run/user/1000\n",
            HEADER
        );
        let rows = parse_df(&text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "/dev/sda2");
        assert_eq!(rows[0].size_bytes, 494_384_795_648);
        assert_eq!(rows[0].used_bytes, 120);
        assert_eq!(rows[0].available_bytes, 494_384_795_528);
        assert_eq!(rows[0].use_percent, "1%");
        assert_eq!(rows[1].target, PathBuf::from("/run/user/1000"));
    }

    #[test]
    fn mount_point_with_space_is_not_truncated() {
        let text = format!("{}/dev/sdc1 1000 500 500 50% /mnt/My Drive\n", HEADER);
        let rows = parse_df(&text).unwrap();
        assert_eq!(rows[0].target, PathBuf::from("/mnt/My Drive"));
        assert_eq!(rows[0].use_pct(), Some(50.0));
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_df(HEADER).unwrap().is_empty());
        assert!(parse_df("").unwrap().is_empty());
    }

    #[test]
    fn dash_sizes_are_zero() {
        let text = format!("{}none - - - - /sys/fs/bpf\n", HEADER);
        let rows = parse_df(&text).unwrap();
        assert_eq!(rows[0].size_bytes, 0);
        assert_eq!(rows[0].use_pct(), None);
    }

    #[test]
    fn truncated_row_is_a_parse_error() {
        let text = format!("{}/dev/sda1 100 50 50\n", HEADER);
        assert!(matches!(parse_df(&text), Err(Error::Parse { line: 2, .. })));
    }

    #[test]
    fn garbage_size_is_a_parse_error() {
        let text = format!("{}/dev/sda1 big 50 50 50% /\n", HEADER);
        assert!(matches!(parse_df(&text), Err(Error::Parse { .. })));
    }

    #[test]
    fn df_error_exit_is_tool_failure() {
        let err = read_disk_usage(&[Path::new("/nonexistent/usbvol-df-test")]).unwrap_err();
        match err {
            Error::ToolInvocationFailed { tool, reason } => {
                assert_eq!(tool, "df");
                assert!(reason.contains("usbvol-df-test"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
