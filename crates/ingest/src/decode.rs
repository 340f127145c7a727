//! Upload Container Decoding

use record_builder::{RawTable, Scalar, ValidationError};
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::warn;
use zip::ZipArchive;

/// Decoding failures for tables and archives
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("No columns to parse from file")]
    NoHeader,
    #[error("{0}")]
    Row(#[from] ValidationError),
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("Entry exceeds {limit} bytes when decompressed")]
    EntryTooLarge { limit: u64 },
}

/// Container type inferred from a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Flat CSV table
    Table,
    /// ZIP archive of CSV tables
    Archive,
    /// Anything else
    Unsupported,
}

impl FileKind {
    /// Classify by case-insensitive suffix
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            FileKind::Table
        } else if lower.ends_with(".zip") {
            FileKind::Archive
        } else {
            FileKind::Unsupported
        }
    }
}

/// One table entry read from an archive
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Entry path inside the archive
    pub name: String,
    /// Entry bytes, or the error hit while reading them
    pub contents: Result<Vec<u8>, DecodeError>,
}

/// Parse CSV bytes into a table in a single pass.
///
/// Short rows are padded with missing cells; a row wider than the header
/// fails the whole table.
pub fn parse_csv(bytes: &[u8]) -> Result<RawTable, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?;
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(DecodeError::NoHeader);
    }

    let width = headers.len();
    let mut table = RawTable::new(headers.iter().map(str::to_string).collect());
    for result in reader.records() {
        let record = result?;
        let mut row: Vec<Scalar> = record.iter().map(Scalar::parse).collect();
        if row.len() < width {
            row.resize(width, Scalar::Missing);
        }
        table.push_row(row)?;
    }

    Ok(table)
}

/// List and read every CSV entry of a ZIP archive in listing order.
///
/// Entries are classified by name before they are decompressed, so entries
/// that are not tables are never opened. Each table entry may expand to at
/// most `max_entry_bytes`. Fails only when the container itself cannot be
/// opened; per-entry read errors are returned inside each entry.
pub fn decode_archive(bytes: &[u8], max_entry_bytes: u64) -> Result<Vec<ArchiveEntry>, DecodeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::new();

    for index in 0..archive.len() {
        let (name, declared_size) = match archive.by_index_raw(index) {
            Ok(file) => {
                if file.is_dir() || FileKind::from_name(file.name()) != FileKind::Table {
                    continue;
                }
                (file.name().to_string(), file.size())
            }
            Err(e) => {
                warn!("Skipping unreadable ZIP entry #{}: {}", index, e);
                continue;
            }
        };

        let contents = if declared_size > max_entry_bytes {
            Err(DecodeError::EntryTooLarge {
                limit: max_entry_bytes,
            })
        } else {
            read_entry(&mut archive, index, max_entry_bytes)
        };
        entries.push(ArchiveEntry { name, contents });
    }

    Ok(entries)
}

/// Decompress one entry, never holding more than `limit + 1` bytes
fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    index: usize,
    limit: u64,
) -> Result<Vec<u8>, DecodeError> {
    let file = archive.by_index(index)?;
    let mut buf = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut buf)?;

    if buf.len() as u64 > limit {
        return Err(DecodeError::EntryTooLarge { limit });
    }
    Ok(buf)
}
