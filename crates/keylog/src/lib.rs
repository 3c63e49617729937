//! # KeyLog - Deferred Write Log
//!
//! Holds writes that do not need to be searchable yet. The engine appends to
//! a [`KeyLog`] on every deferred write and replays the whole log into its
//! write buffer at the next compaction, then clears it.
//!
//! Two implementations are provided: [`FileKeyLog`], an append-only file that
//! survives process restarts, and [`MemKeyLog`], an in-memory stub.
//!
//! ## Binary Record Format
//!
//! ```text
//! [record_len: u32 LE][crc32: u32 LE][body ...]
//! ```
//!
//! Body: `[seq: u64][key_len: u32][key][value: u64]`
//!
//! `record_len` includes the 4-byte CRC but not itself.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Upper bound on a single framed record.
const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Body bytes besides the key: seq, key_len, value.
const BODY_FIXED_LEN: usize = 8 + 4 + 8;

/// One deferred write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence number assigned by the engine.
    pub seq: u64,
    pub key: Vec<u8>,
    pub value: u64,
}

#[derive(Debug, Error)]
pub enum KeyLogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record failed CRC validation or its body did not parse.
    #[error("corrupt record")]
    Corrupt,
}

/// Append/replay contract the engine relies on.
///
/// The engine never looks at how records are stored. Replay yields records
/// in append order.
pub trait KeyLog: Send {
    fn append(&mut self, record: &LogRecord) -> Result<(), KeyLogError>;

    /// Every record appended since the last [`clear`](KeyLog::clear).
    fn replay_all(&mut self) -> Result<Vec<LogRecord>, KeyLogError>;

    /// Discards every record.
    fn clear(&mut self) -> Result<(), KeyLogError>;

    /// Highest sequence number among the pending records, `0` if there are
    /// none.
    fn max_seq(&mut self) -> Result<u64, KeyLogError> {
        Ok(self.replay_all()?.iter().map(|r| r.seq).max().unwrap_or(0))
    }
}

// -------------------- In-memory --------------------

/// In-memory [`KeyLog`]. Contents are lost with the process.
#[derive(Debug, Default, Clone)]
pub struct MemKeyLog {
    records: Vec<LogRecord>,
}

impl MemKeyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl KeyLog for MemKeyLog {
    fn append(&mut self, record: &LogRecord) -> Result<(), KeyLogError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn replay_all(&mut self) -> Result<Vec<LogRecord>, KeyLogError> {
        Ok(self.records.clone())
    }

    fn clear(&mut self) -> Result<(), KeyLogError> {
        self.records.clear();
        Ok(())
    }
}

// -------------------- File-backed --------------------

/// Append-only log file.
///
/// Records are framed in a scratch buffer and written with a single
/// `write_all`. When `sync` is `true`, every append is followed by
/// `sync_all()`.
#[derive(Debug)]
pub struct FileKeyLog {
    path: PathBuf,
    file: File,
    sync: bool,
    buf: Vec<u8>,
}

impl FileKeyLog {
    /// Opens (or creates) a log file. Existing records are kept and will be
    /// returned by the next replay.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, KeyLogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            sync,
            buf: Vec::with_capacity(256),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces appended data to disk.
    pub fn sync_to_disk(&mut self) -> Result<(), KeyLogError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

impl KeyLog for FileKeyLog {
    fn append(&mut self, record: &LogRecord) -> Result<(), KeyLogError> {
        self.buf.clear();
        // Frame header filled in once the body is known.
        self.buf.extend_from_slice(&[0u8; 8]);

        self.buf.write_u64::<LittleEndian>(record.seq)?;
        self.buf.write_u32::<LittleEndian>(record.key.len() as u32)?;
        self.buf.extend_from_slice(&record.key);
        self.buf.write_u64::<LittleEndian>(record.value)?;

        let body = &self.buf[8..];
        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();

        let record_len = body.len() as u64 + 4;
        if record_len > MAX_RECORD_SIZE as u64 {
            return Err(KeyLogError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "key log record too large",
            )));
        }

        self.buf[0..4].copy_from_slice(&(record_len as u32).to_le_bytes());
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn replay_all(&mut self) -> Result<Vec<LogRecord>, KeyLogError> {
        let mut reader = KeyLogReader::from_reader(File::open(&self.path)?);
        let mut records = Vec::new();
        reader.replay(|r| records.push(r))?;
        Ok(records)
    }

    fn clear(&mut self) -> Result<(), KeyLogError> {
        // Append mode keeps writing at the new end.
        self.file.set_len(0)?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

// -------------------- Reader --------------------

/// Sequential reader over a framed log.
///
/// A truncated tail record (a crash mid-append) ends the replay cleanly; all
/// complete records before it are still returned.
pub struct KeyLogReader<R: Read> {
    rdr: BufReader<R>,
}

impl KeyLogReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KeyLogError> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> KeyLogReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every valid record, calling `apply` for each one.
    ///
    /// - Clean EOF or truncated tail -> `Ok(())`.
    /// - CRC mismatch or malformed body -> `Err(KeyLogError::Corrupt)`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), KeyLogError>
    where
        F: FnMut(LogRecord),
    {
        let mut body = Vec::with_capacity(256);

        loop {
            let record_len = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(KeyLogError::Io(e)),
            };
            if record_len <= 4 || record_len > MAX_RECORD_SIZE {
                return Err(KeyLogError::Corrupt);
            }

            let crc = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(KeyLogError::Io(e)),
            };

            let body_len = (record_len - 4) as usize;
            body.clear();
            body.resize(body_len, 0);
            match self.rdr.read_exact(&mut body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(KeyLogError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&body);
            if hasher.finalize() != crc {
                return Err(KeyLogError::Corrupt);
            }

            apply(parse_body(&body)?);
        }
    }
}

fn parse_body(body: &[u8]) -> Result<LogRecord, KeyLogError> {
    if body.len() < BODY_FIXED_LEN {
        return Err(KeyLogError::Corrupt);
    }
    let mut br = body;
    let seq = br.read_u64::<LittleEndian>()?;
    let key_len = br.read_u32::<LittleEndian>()? as usize;
    if key_len + BODY_FIXED_LEN != body.len() {
        return Err(KeyLogError::Corrupt);
    }
    let (key, mut rest) = br.split_at(key_len);
    let value = rest.read_u64::<LittleEndian>()?;
    Ok(LogRecord {
        seq,
        key: key.to_vec(),
        value,
    })
}
