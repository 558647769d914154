//! Append-only table log.
//!
//! Each entry is one frame:
//! `magic(4) | version(1) | body_len(u32 LE) | body (MessagePack) | crc32(body) (u32 LE)`

use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Magic bytes for every frame.
const FRAME_MAGIC: &[u8; 4] = b"ROW\0";

/// Current frame format version.
const FRAME_VERSION: u8 = 1;

/// Bytes before the body: magic + version + length.
const FRAME_HEADER_SIZE: usize = 4 + 1 + 4;

/// Bytes after the body: checksum.
const FRAME_TRAILER_SIZE: usize = 4;

/// Largest body a frame may declare. Anything bigger is a damaged header.
const MAX_FRAME_BODY: usize = 16 * 1024 * 1024;

struct Writer {
    file: File,
    /// End of the last complete frame.
    size: u64,
    writes_since_sync: u64,
}

/// Append-only log of serialized table entries.
pub struct TableLog<E> {
    path: PathBuf,
    writer: Mutex<Writer>,
    /// Sync every N writes (0 is treated as 1).
    sync_interval: u64,
    #[cfg(test)]
    sync_fault: std::sync::atomic::AtomicBool,
    _entry: PhantomData<fn() -> E>,
}

impl<E: Serialize + DeserializeOwned> TableLog<E> {
    /// Open or create a log, returning it along with every entry already in it.
    ///
    /// An incomplete frame at the end (a write torn by a crash) is cut off.
    /// Damage anywhere else is an error.
    pub fn open(path: impl AsRef<Path>, sync_interval: u64) -> Result<(Self, Vec<E>)> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (entries, valid_len) = Self::decode_all(&bytes)?;
        if valid_len < bytes.len() {
            warn!(
                path = %path.display(),
                discarded = bytes.len() - valid_len,
                "truncating torn frame at end of log"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        let log = Self {
            path,
            writer: Mutex::new(Writer {
                file,
                size: valid_len as u64,
                writes_since_sync: 0,
            }),
            sync_interval: sync_interval.max(1),
            #[cfg(test)]
            sync_fault: std::sync::atomic::AtomicBool::new(false),
            _entry: PhantomData,
        };

        Ok((log, entries))
    }

    /// Append one entry. Returns the offset it was written at.
    ///
    /// A failed write or sync is rolled back, so an entry reported as failed
    /// never reappears on the next open.
    pub fn append(&self, entry: &E) -> Result<u64> {
        let frame = Self::encode(entry)?;
        let mut writer = self.writer.lock();
        let offset = writer.size;
        let sync_due = writer.writes_since_sync + 1 >= self.sync_interval;

        let mut written = Self::write_frame(&mut writer.file, offset, &frame);
        if written.is_ok() && sync_due {
            written = self.sync_data(&writer.file);
        }
        if let Err(err) = written {
            if let Err(truncate_err) = writer.file.set_len(offset) {
                warn!(
                    path = %self.path.display(),
                    offset,
                    error = %truncate_err,
                    "failed to roll back log tail"
                );
            }
            return Err(err);
        }

        writer.size = offset + frame.len() as u64;
        writer.writes_since_sync = if sync_due {
            0
        } else {
            writer.writes_since_sync + 1
        };

        Ok(offset)
    }

    /// Force pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    /// Current log size in bytes.
    pub fn size(&self) -> u64 {
        self.writer.lock().size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync_data(&self, file: &File) -> Result<()> {
        self.sync_fault()?;
        file.sync_data()?;
        Ok(())
    }

    #[cfg(not(test))]
    fn sync_fault(&self) -> Result<()> {
        Ok(())
    }

    #[cfg(test)]
    fn sync_fault(&self) -> Result<()> {
        if self.sync_fault.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "sync failed",
            )));
        }
        Ok(())
    }

    /// Make the next sync inside `append` fail.
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&self) {
        self.sync_fault
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn write_frame(file: &mut File, offset: u64, frame: &[u8]) -> Result<()> {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(frame)?;
        Ok(())
    }

    fn encode(entry: &E) -> Result<Vec<u8>> {
        let body = rmp_serde::to_vec(entry)?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| StoreError::Serialization("entry too large for one frame".into()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len() + FRAME_TRAILER_SIZE);
        frame.extend_from_slice(FRAME_MAGIC);
        frame.push(FRAME_VERSION);
        frame.extend_from_slice(&body_len.to_le_bytes());
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        Ok(frame)
    }

    /// Decode every complete frame. Returns the entries and how many bytes they span.
    ///
    /// Only the last frame may be incomplete. A short frame followed by
    /// anything that looks like another frame means the header is damaged.
    fn decode_all(bytes: &[u8]) -> Result<(Vec<E>, usize)> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let rest = &bytes[pos..];
            if rest.len() < FRAME_HEADER_SIZE {
                break;
            }

            if &rest[0..4] != FRAME_MAGIC {
                return Err(StoreError::InvalidFormat(format!(
                    "invalid frame magic at offset {}",
                    pos
                )));
            }
            if rest[4] != FRAME_VERSION {
                return Err(StoreError::InvalidFormat(format!(
                    "unsupported frame version: {}",
                    rest[4]
                )));
            }

            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&rest[5..9]);
            let body_len = u32::from_le_bytes(len_bytes) as usize;

            if body_len > MAX_FRAME_BODY {
                return Err(StoreError::InvalidFormat(format!(
                    "frame at offset {} declares {} body bytes",
                    pos, body_len
                )));
            }

            let frame_len = FRAME_HEADER_SIZE + body_len + FRAME_TRAILER_SIZE;
            if rest.len() < frame_len {
                if Self::contains_frame_start(&rest[FRAME_HEADER_SIZE..]) {
                    return Err(StoreError::InvalidFormat(format!(
                        "frame at offset {} overruns the frames after it",
                        pos
                    )));
                }
                break;
            }

            let body = &rest[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + body_len];
            let mut crc_bytes = [0u8; 4];
            crc_bytes.copy_from_slice(&rest[FRAME_HEADER_SIZE + body_len..frame_len]);
            let expected = u32::from_le_bytes(crc_bytes);
            let got = crc32fast::hash(body);
            if expected != got {
                return Err(StoreError::ChecksumMismatch { expected, got });
            }

            entries.push(rmp_serde::from_slice(body)?);
            pos += frame_len;
        }

        Ok((entries, pos))
    }

    fn contains_frame_start(bytes: &[u8]) -> bool {
        bytes
            .windows(FRAME_MAGIC.len() + 1)
            .any(|w| &w[..FRAME_MAGIC.len()] == FRAME_MAGIC && w[FRAME_MAGIC.len()] == FRAME_VERSION)
    }
}
