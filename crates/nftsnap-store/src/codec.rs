//! Flat snapshot file codec.
//!
//! ## Layout
//!
//! | Snapshot kind | Header                     |
//! |---------------|----------------------------|
//! | ownership     | `address,tokenId`          |
//! | balance       | `address,tokenId,balance`  |
//! | metadata      | `address,tokenId,tokenNumber` |
//!
//! One data row per record in ascending key order. Addresses are written as
//! lowercase `0x` hex; numbers as base-10 text of arbitrary width.
//!
//! Decoding is strict: any malformed row fails the whole load. A snapshot that
//! silently dropped a row would no longer be complete.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use crate::record::SnapshotRecord;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A persisted snapshot could not be read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Filesystem or CSV-library failure.
    Io(String),
    /// Header row missing or not the expected column list.
    MissingHeader { expected: String, found: String },
    /// A data row has the wrong number of fields.
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },
    BadAddress {
        line: u64,
        raw: String,
    },
    BadNumber {
        line: u64,
        field: &'static str,
        raw: String,
    },
    /// Balance rows are sparse; a zero amount never belongs in a file.
    ZeroBalance { line: u64 },
    /// The same key appears twice.
    DuplicateKey { line: u64, key: String },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Io(msg) => write!(f, "snapshot io error: {msg}"),
            FormatError::MissingHeader { expected, found } => {
                write!(
                    f,
                    "snapshot header mismatch: expected '{expected}' found '{found}'"
                )
            }
            FormatError::FieldCount {
                line,
                expected,
                found,
            } => write!(
                f,
                "snapshot line {line}: expected {expected} fields, found {found}"
            ),
            FormatError::BadAddress { line, raw } => {
                write!(f, "snapshot line {line}: invalid address '{raw}'")
            }
            FormatError::BadNumber { line, field, raw } => {
                write!(
                    f,
                    "snapshot line {line}: cannot parse field '{field}' from value '{raw}'"
                )
            }
            FormatError::ZeroBalance { line } => {
                write!(f, "snapshot line {line}: zero balance rows are not allowed")
            }
            FormatError::DuplicateKey { line, key } => {
                write!(f, "snapshot line {line}: duplicate key {key}")
            }
        }
    }
}

impl std::error::Error for FormatError {}

impl From<csv::Error> for FormatError {
    fn from(e: csv::Error) -> Self {
        FormatError::Io(e.to_string())
    }
}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        FormatError::Io(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub(crate) fn write_records<'a, R, W, I>(out: W, records: I) -> Result<(), FormatError>
where
    R: SnapshotRecord + 'a,
    W: Write,
    I: IntoIterator<Item = &'a R>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(R::HEADER)?;
    for rec in records {
        wtr.write_record(rec.to_fields())?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn read_records<R, In>(input: In) -> Result<BTreeMap<R::Key, R>, FormatError>
where
    R: SnapshotRecord,
    In: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut rows = rdr.records();

    let expected = R::HEADER.join(",");
    let header = match rows.next() {
        Some(h) => h?,
        None => {
            return Err(FormatError::MissingHeader {
                expected,
                found: String::new(),
            })
        }
    };
    let found: Vec<String> = header
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let header_ok = found.len() == R::HEADER.len()
        && found
            .iter()
            .zip(R::HEADER.iter())
            .all(|(got, want)| got.eq_ignore_ascii_case(want));
    if !header_ok {
        return Err(FormatError::MissingHeader {
            expected,
            found: found.join(","),
        });
    }

    let mut out: BTreeMap<R::Key, R> = BTreeMap::new();
    for row in rows {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        // Blank trailing lines are skipped by the csv reader; a row of empty
        // fields is still a malformed row.
        if row.len() != R::HEADER.len() {
            return Err(FormatError::FieldCount {
                line,
                expected: R::HEADER.len(),
                found: row.len(),
            });
        }

        let fields: Vec<&str> = row.iter().collect();
        let rec = R::from_fields(line, &fields)?;
        match out.entry(rec.key()) {
            Entry::Occupied(e) => {
                return Err(FormatError::DuplicateKey {
                    line,
                    key: e.key().to_string(),
                })
            }
            Entry::Vacant(v) => {
                v.insert(rec);
            }
        }
    }

    Ok(out)
}
