use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

/// One line of the kernel mount table:
/// `source target fstype options dump pass`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    pub source:    String,
    pub target:    PathBuf,
    pub fs_type:   String,
    pub options:   String,
    pub dump_flag: u32,
    pub pass_flag: u32,
    /// The target field as it appeared in the table, escapes and literal
    /// whitespace intact. `None` for entries built in code.
    #[serde(skip)]
    pub raw_target: Option<String>,
}

impl MountEntry {
    pub fn is_read_only(&self) -> bool {
        self.options.split(',').any(|o| o == "ro")
    }
}

/// Renders the entry as one mount-table line. A parsed target is written
/// back exactly as it was read; otherwise whitespace and backslashes in the
/// path-like fields are escaped as octal sequences.
impl fmt::Display for MountEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.raw_target {
            Some(raw) => raw.clone(),
            None      => escape_octal(&self.target.to_string_lossy()),
        };
        write!(
            f,
            "{} {} {} {} {} {}",
            escape_octal(&self.source),
            target,
            self.fs_type,
            self.options,
            self.dump_flag,
            self.pass_flag,
        )
    }
}

/// Snapshot of the mount table, in the order the kernel listed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn new(entries: Vec<MountEntry>) -> Self {
        Self { entries }
    }

    /// First entry whose source is exactly `source`.
    pub fn find_by_source(&self, source: &str) -> Option<&MountEntry> {
        self.entries.iter().find(|m| m.source == source)
    }
}

impl Deref for MountTable {
    type Target = [MountEntry];

    fn deref(&self) -> &[MountEntry] { &self.entries }
}

impl<'a> IntoIterator for &'a MountTable {
    type Item = &'a MountEntry;
    type IntoIter = std::slice::Iter<'a, MountEntry>;

    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}

pub(crate) fn escape_octal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' '  => out.push_str("\\040"),
            '\t' => out.push_str("\\011"),
            '\n' => out.push_str("\\012"),
            '\\' => out.push_str("\\134"),
            _    => out.push(c),
        }
    }
    out
}

/// Inverse of `escape_octal`, over raw bytes: decoded escapes may produce
/// bytes that are not valid UTF-8. Unknown or truncated sequences are kept
/// verbatim.
pub(crate) fn unescape_octal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let v = (digits[0] - b'0') as u32 * 64
                    + (digits[1] - b'0') as u32 * 8
                    + (digits[2] - b'0') as u32;
                if v <= 0xff {
                    out.push(v as u8);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}
