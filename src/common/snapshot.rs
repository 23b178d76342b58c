//! Versioned snapshot files
//!
//! Format: `[MAGIC:8][VERSION:4][LEN:8][PAYLOAD:LEN][CRC32:4]`, integers
//! little-endian, payload encoded with bincode, CRC over the payload.
//! Files are written to a `.tmp` sibling and renamed into place so a crash
//! mid-write never leaves a half-written snapshot behind.

use crate::common::{crc32, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

/// MAGIC + VERSION + LEN before the payload, CRC32 after it.
const FRAMING_SIZE: u64 = 8 + 4 + 8 + 4;

/// Write `value` as a snapshot at `path`.
pub fn write_snapshot<T: Serialize>(path: &Path, magic: &[u8; 8], value: &T) -> Result<()> {
    let payload = bincode::serialize(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = tmp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(magic)?;
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.write_all(&crc32(&payload).to_le_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a snapshot written by [`write_snapshot`]. A missing file is `Ok(None)`.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path, magic: &[u8; 8]) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut found = [0u8; 8];
    reader.read_exact(&mut found)?;
    if &found != magic {
        return Err(Error::Corrupted(format!(
            "invalid snapshot magic in {}",
            path.display()
        )));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != SNAPSHOT_VERSION {
        return Err(Error::Corrupted(format!(
            "unsupported snapshot version {} in {}",
            version,
            path.display()
        )));
    }

    let mut len_bytes = [0u8; 8];
    reader.read_exact(&mut len_bytes)?;
    let len = u64::from_le_bytes(len_bytes);
    // The payload must fill the file exactly; never allocate from an unchecked length
    if Some(len) != file_len.checked_sub(FRAMING_SIZE) {
        return Err(Error::Corrupted(format!(
            "snapshot {} declares {} payload bytes but the file holds {}",
            path.display(),
            len,
            file_len.saturating_sub(FRAMING_SIZE)
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let expected = u32::from_le_bytes(crc_bytes);
    let actual = crc32(&payload);
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    Ok(Some(bincode::deserialize(&payload)?))
}

/// Remove a snapshot if present.
pub fn remove_snapshot(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
