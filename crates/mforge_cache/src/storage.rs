//! Compressed snapshot storage.
//!
//! Every persisted cache file goes through this module: row tables as
//! zstd-compressed JSON, merged content as zstd-compressed text, and the
//! metadata store artifact as zstd-compressed MessagePack. Callers pass
//! logical paths; the on-disk file carries an extra `.zst` suffix so that
//! stale uncompressed leftovers are never picked up by accident.
//!
//! Reads are all-or-nothing. A truncated or corrupt file surfaces as an
//! error and the owning cache discards its state wholesale — there is no
//! partial recovery of a damaged snapshot.

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

const COMPRESSION_LEVEL: i32 = 3;

/// The on-disk path for a logical snapshot path.
pub fn compressed_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut s = path.to_string();
    s.push_str(".zst");
    Utf8PathBuf::from(s)
}

/// Whether a snapshot exists at the logical path.
pub fn exists(path: &Utf8Path) -> bool {
    compressed_path(path).as_std_path().exists()
}

/// Serialize `value` as JSON into a compressed file, creating parent
/// directories as needed.
pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let mut encoder = create(path)?;
    serde_json::to_writer_pretty(&mut encoder, value)?;
    encoder.finish()?;
    Ok(())
}

/// Read a compressed JSON file back into a value.
pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
    let decoder = open(path)?;
    Ok(serde_json::from_reader(decoder)?)
}

/// Write a text blob into a compressed file.
pub fn write_text(path: &Utf8Path, content: &str) -> Result<()> {
    let mut encoder = create(path)?;
    encoder.write_all(content.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Read a compressed text blob.
pub fn read_text(path: &Utf8Path) -> Result<String> {
    let mut decoder = open(path)?;
    let mut content = String::new();
    decoder.read_to_string(&mut content)?;
    Ok(content)
}

/// Serialize `value` as MessagePack into a compressed file.
pub fn write_msgpack<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let mut encoder = create(path)?;
    rmp_serde::encode::write(&mut encoder, value)?;
    encoder.finish()?;
    Ok(())
}

/// Read a compressed MessagePack file back into a value.
pub fn read_msgpack<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
    let decoder = open(path)?;
    Ok(rmp_serde::decode::from_read(decoder)?)
}

/// Remove a directory tree and recreate it empty.
pub fn clean_dir(path: &Utf8Path) -> Result<()> {
    if path.as_std_path().exists() {
        std::fs::remove_dir_all(path.as_std_path())?;
    }
    std::fs::create_dir_all(path.as_std_path())?;
    Ok(())
}

fn create(path: &Utf8Path) -> Result<Encoder<'static, File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent.as_std_path())?;
    }
    let file = File::create(compressed_path(path).as_std_path())?;
    Ok(Encoder::new(file, COMPRESSION_LEVEL)?)
}

fn open(path: &Utf8Path) -> Result<Decoder<'static, std::io::BufReader<File>>> {
    let file = File::open(compressed_path(path).as_std_path())?;
    Ok(Decoder::new(file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempdir().unwrap();
        let path = utf8_dir(&dir).join("table.json");

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);
        value.insert("b".to_string(), 2u32);

        write_json(&path, &value).unwrap();
        assert!(exists(&path));
        assert!(!path.as_std_path().exists(), "only the .zst file is written");

        let back: BTreeMap<String, u32> = read_json(&path).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_text_roundtrip_creates_parents() {
        let dir = tempdir().unwrap();
        let path = utf8_dir(&dir).join("MechDef/atlas");

        write_text(&path, "merged content").unwrap();
        assert_eq!(read_text(&path).unwrap(), "merged content");
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let dir = tempdir().unwrap();
        let path = utf8_dir(&dir).join("metadata.db");

        let value = vec!["x".to_string(), "y".to_string()];
        write_msgpack(&path, &value).unwrap();
        let back: Vec<String> = read_msgpack(&path).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_read_missing_is_error() {
        let dir = tempdir().unwrap();
        let path = utf8_dir(&dir).join("missing.json");
        assert!(!exists(&path));
        assert!(read_json::<BTreeMap<String, u32>>(&path).is_err());
    }

    #[test]
    fn test_read_corrupt_is_error() {
        let dir = tempdir().unwrap();
        let path = utf8_dir(&dir).join("corrupt.json");
        std::fs::write(compressed_path(&path).as_std_path(), b"not zstd").unwrap();
        assert!(read_json::<BTreeMap<String, u32>>(&path).is_err());
    }

    #[test]
    fn test_clean_dir() {
        let dir = tempdir().unwrap();
        let root = utf8_dir(&dir).join("cache");
        let path = root.join("table.json");

        write_json(&path, &1u32).unwrap();
        clean_dir(&root).unwrap();

        assert!(root.as_std_path().exists());
        assert!(!exists(&path));
    }
}
