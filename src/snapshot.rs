//! Snapshots and their persisted encoding
//!
//! A [`Snapshot`] is the immutable result of one scan: a mapping from
//! relative path to [`FileRecord`], always iterated in ascending path order
//! (byte-wise). Nothing here relies on hash-map iteration order.
//!
//! ## Persisted format
//!
//! ```text
//! "RelPath","SizeBytes","LastWriteUtc","Fingerprint"
//! "docs/a.txt","5","2024-05-01T12:00:00.000000000Z","2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
//! "video.mp4","52428800","2024-05-01T12:00:00.000000000Z","META:52428800:2024-05-01T12:00:00.000000000Z"
//! ```
//!
//! UTF-8, one header row, rows sorted by `RelPath`. Every field is quoted on
//! write and embedded quotes are doubled, so paths may contain commas, quotes
//! or newlines. The reader also accepts unquoted fields, CRLF line endings
//! and a leading byte-order mark.

use crate::error::{Result, SnapdiffError};
use crate::types::{format_timestamp, parse_timestamp, FileRecord, Fingerprint};
use std::collections::btree_map::{self, BTreeMap};
use std::iter::Peekable;
use std::str::Chars;

/// Column names of the persisted format, in order
pub const CSV_COLUMNS: [&str; 4] = ["RelPath", "SizeBytes", "LastWriteUtc", "Fingerprint"];

/// Immutable set of file records keyed by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    /// The empty snapshot used as a bootstrap baseline
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting duplicate relative paths
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let mut map = BTreeMap::new();
        for record in records {
            match map.entry(record.rel_path.clone()) {
                btree_map::Entry::Occupied(_) => {
                    return Err(SnapdiffError::DuplicatePath(record.rel_path));
                }
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
        Ok(Self { records: map })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the snapshot has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by relative path
    pub fn get(&self, rel_path: &str) -> Option<&FileRecord> {
        self.records.get(rel_path)
    }

    /// Whether a relative path is present
    pub fn contains(&self, rel_path: &str) -> bool {
        self.records.contains_key(rel_path)
    }

    /// Records in ascending path order
    pub fn iter(&self) -> btree_map::Values<'_, String, FileRecord> {
        self.records.values()
    }

    /// Consume the snapshot into a path-sorted vector
    pub fn into_records(self) -> Vec<FileRecord> {
        self.records.into_values().collect()
    }

    /// Sum of all file sizes
    pub fn total_size(&self) -> u64 {
        self.iter().map(|r| r.size).sum()
    }

    /// Number of records carrying a metadata-fallback fingerprint
    pub fn metadata_fingerprint_count(&self) -> usize {
        self.iter().filter(|r| r.fingerprint.is_metadata()).count()
    }

    /// Encode to the persisted CSV form
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_row(&mut out, CSV_COLUMNS);
        for record in self.iter() {
            let size = record.size.to_string();
            let modified = format_timestamp(&record.modified);
            let fingerprint = record.fingerprint.to_string();
            push_row(
                &mut out,
                [record.rel_path.as_str(), size.as_str(), modified.as_str(), fingerprint.as_str()],
            );
        }
        out
    }

    /// Decode the persisted CSV form
    ///
    /// Returns `Ok(None)` when the header does not match the expected
    /// columns, which callers treat as an unknown schema.
    ///
    /// # Errors
    ///
    /// - [`SnapdiffError::CorruptSnapshot`] for a malformed row under a
    ///   recognised header
    /// - [`SnapdiffError::DuplicatePath`] if a path occurs twice
    pub fn from_csv(text: &str) -> Result<Option<Self>> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = CsvReader::new(text);

        let header = match reader.next_record()? {
            Some((_, fields)) => fields,
            None => return Ok(None),
        };
        let header_matches = header.len() == CSV_COLUMNS.len()
            && header
                .iter()
                .zip(CSV_COLUMNS)
                .all(|(found, expected)| found.trim().eq_ignore_ascii_case(expected));
        if !header_matches {
            return Ok(None);
        }

        let mut records = Vec::new();
        while let Some((line, fields)) = reader.next_record()? {
            records.push(parse_row(line, fields)?);
        }

        Self::from_records(records).map(Some)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a FileRecord;
    type IntoIter = btree_map::Values<'a, String, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    }
    out.push('\n');
}

fn parse_row(line: usize, fields: Vec<String>) -> Result<FileRecord> {
    let [rel_path, size, modified, fingerprint]: [String; 4] = fields
        .try_into()
        .map_err(|f: Vec<String>| SnapdiffError::corrupt(line, format!("expected 4 columns, found {}", f.len())))?;

    if rel_path.is_empty() {
        return Err(SnapdiffError::corrupt(line, "empty RelPath"));
    }
    let size = size
        .trim()
        .parse::<u64>()
        .map_err(|_| SnapdiffError::corrupt(line, format!("invalid SizeBytes {:?}", size)))?;
    let modified = parse_timestamp(modified.trim())
        .ok_or_else(|| SnapdiffError::corrupt(line, format!("invalid LastWriteUtc {:?}", modified)))?;
    let fingerprint = fingerprint
        .trim()
        .parse::<Fingerprint>()
        .map_err(|e| SnapdiffError::corrupt(line, e.to_string()))?;

    Ok(FileRecord {
        rel_path,
        size,
        modified,
        fingerprint,
    })
}

/// Minimal RFC 4180 record reader that tracks line numbers
struct CsvReader<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> CsvReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    /// Next non-blank record with the line it started on
    fn next_record(&mut self) -> Result<Option<(usize, Vec<String>)>> {
        loop {
            if self.chars.peek().is_none() {
                return Ok(None);
            }
            let start_line = self.line;
            let fields = self.read_fields(start_line)?;
            if fields.len() == 1 && fields[0].is_empty() {
                continue;
            }
            return Ok(Some((start_line, fields)));
        }
    }

    fn read_fields(&mut self, start_line: usize) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut quoted = false;

        loop {
            let Some(c) = self.chars.next() else {
                if in_quotes {
                    return Err(SnapdiffError::corrupt(start_line, "unterminated quoted field"));
                }
                fields.push(field);
                return Ok(fields);
            };

            if in_quotes {
                match c {
                    '"' if self.chars.peek() == Some(&'"') => {
                        self.chars.next();
                        field.push('"');
                    }
                    '"' => in_quotes = false,
                    '\n' => {
                        self.line += 1;
                        field.push(c);
                    }
                    _ => field.push(c),
                }
                continue;
            }

            match c {
                '"' if field.is_empty() && !quoted => {
                    in_quotes = true;
                    quoted = true;
                }
                ',' => {
                    fields.push(std::mem::take(&mut field));
                    quoted = false;
                }
                '\r' | '\n' => {
                    if c == '\r' && self.chars.peek() == Some(&'\n') {
                        self.chars.next();
                    }
                    self.line += 1;
                    fields.push(field);
                    return Ok(fields);
                }
                _ => field.push(c),
            }
        }
    }
}
