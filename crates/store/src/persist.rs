//! Fixed-size signature record persistence.
//!
//! Records are packed little-endian, back to back, after a small header:
//!
//! ```text
//! header: magic "WSDB" | version u16 | W u16 | H u16 | N u16 | C u16 | count u64
//! record: user_id u64 | positions C*N*i16 | dc C*f64 | width u16 | height u16
//! ```
//!
//! There are no variable-length fields; file length is
//! `HEADER_SIZE + count * RECORD_SIZE`. Versioning lives in the header only.
//!
//! [`SignatureFile`] keeps the record set in memory and rewrites the file
//! atomically on [`save`](SignatureFile::save); durability is exactly
//! "flush on explicit save".

use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use thiserror::Error;

use signature::{Signature, IMG_SIDE, NUM_CHANNELS, NUM_COEFS};

use crate::{ImageRecord, UserId};

pub const MAGIC: [u8; 4] = *b"WSDB";
pub const FORMAT_VERSION: u16 = 1;

const HEADER_SIZE: usize = 4 + 2 + 2 + 2 + 2 + 2 + 8;
pub const RECORD_SIZE: usize =
    8 + NUM_CHANNELS * NUM_COEFS * 2 + NUM_CHANNELS * 8 + 2 + 2;

/// Errors surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a wavedb signature file")]
    BadMagic { path: PathBuf },
    #[error("{path} uses unsupported format version {version}")]
    UnsupportedVersion { path: PathBuf, version: u16 },
    #[error("{path} was written with different signature geometry")]
    GeometryMismatch { path: PathBuf },
    #[error("{path} is truncated")]
    Truncated { path: PathBuf },
    #[error("signature file is closed")]
    Closed,
    #[error("no image with user id {0}")]
    IdNotFound(UserId),
    #[error("image with user id {0} already present")]
    AlreadyHaveId(UserId),
}

/// On-disk signature database.
///
/// Mirrors the in-memory store minus the query engine: appends and removals
/// act on the in-memory record set and are flushed by [`save`](Self::save).
pub struct SignatureFile {
    path: PathBuf,
    records: Vec<ImageRecord>,
    by_user: HashMap<UserId, usize>,
    dirty: bool,
    open: bool,
}

impl SignatureFile {
    /// Open `path`, loading existing records or starting empty when the file
    /// does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path) {
            Ok(bytes) => parse_file(&path, &bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(PersistError::Io { path, source }),
        };

        let by_user = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.user_id, i))
            .collect();

        Ok(Self {
            path,
            records,
            by_user,
            dirty: false,
            open: true,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether there are unsaved appends or removals.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_image(&self, user_id: UserId) -> Result<&ImageRecord, PersistError> {
        self.by_user
            .get(&user_id)
            .map(|&i| &self.records[i])
            .ok_or(PersistError::IdNotFound(user_id))
    }

    /// Stage a record for the next [`save`](Self::save).
    pub fn append_image(&mut self, record: ImageRecord) -> Result<(), PersistError> {
        if !self.open {
            return Err(PersistError::Closed);
        }
        if self.by_user.contains_key(&record.user_id) {
            return Err(PersistError::AlreadyHaveId(record.user_id));
        }
        self.by_user.insert(record.user_id, self.records.len());
        self.records.push(record);
        self.dirty = true;
        Ok(())
    }

    /// Stage a removal for the next [`save`](Self::save). The record array
    /// stays dense (swap-remove), matching the in-memory store.
    pub fn remove_image(&mut self, user_id: UserId) -> Result<ImageRecord, PersistError> {
        if !self.open {
            return Err(PersistError::Closed);
        }
        let index = self
            .by_user
            .remove(&user_id)
            .ok_or(PersistError::IdNotFound(user_id))?;
        let record = self.records.swap_remove(index);
        if index < self.records.len() {
            self.by_user.insert(self.records[index].user_id, index);
        }
        self.dirty = true;
        Ok(record)
    }

    /// Stored records in internal order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    /// Rewrite the file atomically and clear the dirty flag.
    pub fn save(&mut self) -> Result<(), PersistError> {
        if !self.open {
            return Err(PersistError::Closed);
        }

        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.records.len() * RECORD_SIZE);
        write_header(&mut bytes, self.records.len() as u64);
        for record in &self.records {
            let mut buf = [0u8; RECORD_SIZE];
            encode_record(record, &mut buf);
            bytes.extend_from_slice(&buf);
        }

        let tmp = self.path.with_extension("wsdb.tmp");
        fs::write(&tmp, &bytes).map_err(|source| PersistError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| PersistError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.dirty = false;
        Ok(())
    }

    /// Flush pending changes and mark the file closed. Further mutation
    /// fails with [`PersistError::Closed`].
    pub fn close(&mut self) -> Result<(), PersistError> {
        if !self.open {
            return Ok(());
        }
        if self.dirty {
            self.save()?;
        }
        self.open = false;
        Ok(())
    }
}

fn write_header(out: &mut Vec<u8>, count: u64) {
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(IMG_SIDE as u16).to_le_bytes());
    out.extend_from_slice(&(IMG_SIDE as u16).to_le_bytes());
    out.extend_from_slice(&(NUM_COEFS as u16).to_le_bytes());
    out.extend_from_slice(&(NUM_CHANNELS as u16).to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
}

fn parse_file(path: &Path, bytes: &[u8]) -> Result<Vec<ImageRecord>, PersistError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PersistError::Truncated {
            path: path.to_path_buf(),
        });
    }
    if bytes[0..4] != MAGIC {
        return Err(PersistError::BadMagic {
            path: path.to_path_buf(),
        });
    }

    let u16_at = |off: usize| u16::from_le_bytes([bytes[off], bytes[off + 1]]);
    let version = u16_at(4);
    if version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        });
    }
    if u16_at(6) != IMG_SIDE as u16
        || u16_at(8) != IMG_SIDE as u16
        || u16_at(10) != NUM_COEFS as u16
        || u16_at(12) != NUM_CHANNELS as u16
    {
        return Err(PersistError::GeometryMismatch {
            path: path.to_path_buf(),
        });
    }

    let count = u64::from_le_bytes(bytes[14..22].try_into().expect("header count width"));
    let body = &bytes[HEADER_SIZE..];
    if body.len() != count as usize * RECORD_SIZE {
        return Err(PersistError::Truncated {
            path: path.to_path_buf(),
        });
    }

    let mut records = Vec::with_capacity(count as usize);
    for chunk in body.chunks_exact(RECORD_SIZE) {
        records.push(decode_record(chunk.try_into().expect("record chunk width")));
    }
    Ok(records)
}

fn encode_record(record: &ImageRecord, buf: &mut [u8; RECORD_SIZE]) {
    let mut off = 0;
    buf[off..off + 8].copy_from_slice(&record.user_id.to_le_bytes());
    off += 8;
    for channel in &record.signature.coefs {
        for &coef in channel {
            buf[off..off + 2].copy_from_slice(&coef.to_le_bytes());
            off += 2;
        }
    }
    for &dc in &record.dc {
        buf[off..off + 8].copy_from_slice(&dc.to_le_bytes());
        off += 8;
    }
    buf[off..off + 2].copy_from_slice(&record.width.to_le_bytes());
    off += 2;
    buf[off..off + 2].copy_from_slice(&record.height.to_le_bytes());
    off += 2;
    debug_assert_eq!(off, RECORD_SIZE);
}

fn decode_record(buf: &[u8; RECORD_SIZE]) -> ImageRecord {
    let mut off = 0;
    let user_id = u64::from_le_bytes(buf[off..off + 8].try_into().expect("user id width"));
    off += 8;

    let mut coefs = [[0i16; NUM_COEFS]; NUM_CHANNELS];
    for channel in coefs.iter_mut() {
        for slot in channel.iter_mut() {
            *slot = i16::from_le_bytes([buf[off], buf[off + 1]]);
            off += 2;
        }
    }

    let mut dc = [0.0f64; NUM_CHANNELS];
    for value in dc.iter_mut() {
        *value = f64::from_le_bytes(buf[off..off + 8].try_into().expect("dc width"));
        off += 8;
    }

    let width = u16::from_le_bytes([buf[off], buf[off + 1]]);
    let height = u16::from_le_bytes([buf[off + 2], buf[off + 3]]);

    ImageRecord {
        user_id,
        signature: Signature { coefs },
        dc,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use tempfile::tempdir;

    #[test]
    fn record_size_matches_layout() {
        // 8 + 3*40*2 + 3*8 + 2 + 2
        assert_eq!(RECORD_SIZE, 276);
        assert_eq!(HEADER_SIZE, 22);
    }

    #[test]
    fn record_codec_round_trips() {
        let mut rec = record(42, 100);
        rec.dc = [0.123, -0.004, 0.9];
        rec.width = 1920;
        rec.height = 1080;

        let mut buf = [0u8; RECORD_SIZE];
        encode_record(&rec, &mut buf);
        let decoded = decode_record(&buf);
        assert_eq!(decoded, rec);
    }

    #[test]
    fn save_then_reopen_preserves_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wsdb");

        let mut file = SignatureFile::open(&path).unwrap();
        assert!(file.is_empty());
        assert!(!file.dirty());

        file.append_image(record(1, 10)).unwrap();
        file.append_image(record(2, 300)).unwrap();
        assert!(file.dirty());
        file.save().unwrap();
        assert!(!file.dirty());

        let reopened = SignatureFile::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(*reopened.get_image(1).unwrap(), record(1, 10));
        assert_eq!(*reopened.get_image(2).unwrap(), record(2, 300));
    }

    #[test]
    fn file_length_is_header_plus_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wsdb");

        let mut file = SignatureFile::open(&path).unwrap();
        for uid in 1..=3u64 {
            file.append_image(record(uid, uid as i16 * 100)).unwrap();
        }
        file.save().unwrap();

        let len = std::fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(len, HEADER_SIZE + 3 * RECORD_SIZE);
    }

    #[test]
    fn duplicate_append_rejected() {
        let dir = tempdir().unwrap();
        let mut file = SignatureFile::open(dir.path().join("db.wsdb")).unwrap();
        file.append_image(record(1, 10)).unwrap();
        assert!(matches!(
            file.append_image(record(1, 20)),
            Err(PersistError::AlreadyHaveId(1))
        ));
        assert_eq!(file.len(), 1);
    }

    #[test]
    fn remove_missing_rejected() {
        let dir = tempdir().unwrap();
        let mut file = SignatureFile::open(dir.path().join("db.wsdb")).unwrap();
        assert!(matches!(
            file.remove_image(9),
            Err(PersistError::IdNotFound(9))
        ));
    }

    #[test]
    fn remove_keeps_remaining_records_addressable() {
        let dir = tempdir().unwrap();
        let mut file = SignatureFile::open(dir.path().join("db.wsdb")).unwrap();
        for uid in 1..=3u64 {
            file.append_image(record(uid, uid as i16 * 100)).unwrap();
        }

        let removed = file.remove_image(1).unwrap();
        assert_eq!(removed, record(1, 100));
        assert_eq!(file.len(), 2);
        assert!(file.get_image(2).is_ok());
        assert!(file.get_image(3).is_ok());
        assert!(matches!(
            file.get_image(1),
            Err(PersistError::IdNotFound(1))
        ));
    }

    #[test]
    fn close_flushes_and_blocks_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.wsdb");

        let mut file = SignatureFile::open(&path).unwrap();
        file.append_image(record(1, 10)).unwrap();
        file.close().unwrap();
        assert!(!file.is_open());
        assert!(matches!(
            file.append_image(record(2, 20)),
            Err(PersistError::Closed)
        ));

        // The pending append was flushed by close.
        let reopened = SignatureFile::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn foreign_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-db.wsdb");
        std::fs::write(&path, b"JPEGnot really a database header........").unwrap();
        assert!(matches!(
            SignatureFile::open(&path),
            Err(PersistError::BadMagic { .. })
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.wsdb");

        let mut bytes = Vec::new();
        write_header(&mut bytes, 0);
        bytes[4..6].copy_from_slice(&99u16.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            SignatureFile::open(&path),
            Err(PersistError::UnsupportedVersion { version: 99, .. })
        ));
    }

    #[test]
    fn geometry_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other-geometry.wsdb");

        let mut bytes = Vec::new();
        write_header(&mut bytes, 0);
        bytes[10..12].copy_from_slice(&64u16.to_le_bytes()); // different N
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            SignatureFile::open(&path),
            Err(PersistError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn truncated_body_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cut.wsdb");

        let mut bytes = Vec::new();
        write_header(&mut bytes, 2);
        bytes.extend_from_slice(&[0u8; RECORD_SIZE]); // only one of two records
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            SignatureFile::open(&path),
            Err(PersistError::Truncated { .. })
        ));
    }
}
