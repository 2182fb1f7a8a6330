use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use anyhow::{bail, Context, Result};
use zip::ZipArchive;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";

/// Largest uncompressed entry accepted.
pub const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;
/// Most we reserve up front on the strength of the size in the entry header.
const RESERVE_CAP: u64 = 1024 * 1024;

/// Whether `payload` looks like a ZIP archive.
pub fn is_archive(payload: &[u8]) -> bool {
    payload.starts_with(ZIP_MAGIC) || payload.starts_with(ZIP_EMPTY_MAGIC)
}

/// Read every file entry of a ZIP archive, keyed by its full entry path.
///
/// Directory entries are left out; filtering of empty and hidden files is up
/// to the caller.
pub fn read_archive(payload: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = ZipArchive::new(Cursor::new(payload)).context("opening ZIP archive")?;
    let mut files = BTreeMap::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("reading ZIP entry {i}"))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let declared = entry.size();
        let body = read_entry(&mut entry, declared, MAX_ENTRY_BYTES)
            .with_context(|| format!("extracting {name}"))?;
        files.insert(name, body);
    }

    Ok(files)
}

/// Read at most `limit` bytes. `declared` only sizes the initial buffer and is
/// not trusted beyond [`RESERVE_CAP`].
fn read_entry<R: Read>(reader: R, declared: u64, limit: u64) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(declared.min(RESERVE_CAP).min(limit) as usize);
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)?;
    if body.len() as u64 > limit {
        bail!("entry is larger than {limit} bytes");
    }
    Ok(body)
}
