//! # Persist - Saved Map Files
//!
//! ## File Format
//!
//! ```text
//! [magic "SMAP": u32][version: u32]
//! [seed: u64][fp_len: u32][buffer_threshold: u64][partition_count: u64]
//! [encoding: u8][load_factor bits: u64][max_build_attempts: u32][seq: u64]
//! [value table: count u64, values u64 * count]
//! [generation_count: u32][BlockSet] * generation_count
//! [buffer_count: u64]([key_len: u32][key][value: u64][seq: u64]) * buffer_count
//! [crc32 of everything above: u32]
//! ```
//!
//! All integers are little-endian. Blocks are restored from their stored
//! slots and seeds; nothing is rebuilt.
//!
//! ## Crash Safety
//!
//! The file is written to `<path>.tmp`, fsynced, then renamed over `path`.
//! Loading parses and checks the whole file before any engine state is
//! replaced.

use block::BlockSet;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use config::{MapConfig, ValueEncoding};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use writebuf::WriteBuffer;

use crate::{Engine, MapError, ValueTable, MAX_KEY_SIZE};

/// `"SMAP"` read as a little-endian `u32`.
pub const MAGIC: u32 = u32::from_le_bytes(*b"SMAP");
pub const FORMAT_VERSION: u32 = 1;

/// State decoded from a file, swapped into the engine in one step.
struct Snapshot {
    config: MapConfig,
    seq: u64,
    values: ValueTable,
    generations: Vec<BlockSet>,
    buffer: WriteBuffer,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Any read failure while parsing an in-memory image means a bad file.
fn malformed(e: io::Error) -> MapError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => MapError::format("unexpected end of file"),
        _ => MapError::format(e.to_string()),
    }
}

impl Engine {
    /// Serializes configuration, value table, every generation and the
    /// write buffer to `path`.
    ///
    /// Deferred writes stay in the deferred log; they are not part of the
    /// file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MapError> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        let crc = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(crc)?;

        let tmp = tmp_path(path);
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            f.write_all(&buf)?;
            f.flush()?;
            f.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            "saved map to {}: {} generations, {} buffered, {} bytes",
            path.display(),
            self.generations.len(),
            self.buffer.len(),
            buf.len()
        );
        Ok(())
    }

    /// Replaces this engine's state with the map saved at `path`.
    ///
    /// The deferred log is kept, and the sequence counter resumes after
    /// whichever is higher: the saved counter or the newest pending log
    /// record. On any error the engine is unchanged.
    ///
    /// # Errors
    ///
    /// [`MapError::Io`] if the file cannot be read; [`MapError::Format`] if
    /// it is truncated, fails its checksum, has an unknown magic or version,
    /// or contains an inconsistent structure.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MapError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let snapshot = decode(&data)?;
        let log_seq = self.log.max_seq()?;

        self.config = snapshot.config;
        self.seq = snapshot.seq.max(log_seq);
        self.values = snapshot.values;
        self.generations = snapshot.generations;
        self.buffer = snapshot.buffer;

        info!(
            "loaded map from {}: {} generations, {} keys",
            path.display(),
            self.generations.len(),
            self.get_key_num()
        );
        Ok(())
    }

    /// Opens a map saved at `path` with an in-memory deferred log.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let mut engine = Engine::new(MapConfig::default())?;
        engine.load(path)?;
        Ok(engine)
    }

    fn encode(&self, w: &mut Vec<u8>) -> io::Result<()> {
        w.write_u32::<LittleEndian>(MAGIC)?;
        w.write_u32::<LittleEndian>(FORMAT_VERSION)?;

        let c = &self.config;
        w.write_u64::<LittleEndian>(c.seed)?;
        w.write_u32::<LittleEndian>(c.fp_len)?;
        w.write_u64::<LittleEndian>(c.buffer_threshold as u64)?;
        w.write_u64::<LittleEndian>(c.partition_count as u64)?;
        w.write_u8(c.encoding.id())?;
        w.write_u64::<LittleEndian>(c.load_factor.to_bits())?;
        w.write_u32::<LittleEndian>(c.max_build_attempts)?;
        w.write_u64::<LittleEndian>(self.seq)?;

        self.values.write_to(w)?;

        w.write_u32::<LittleEndian>(self.generations.len() as u32)?;
        for set in &self.generations {
            set.write_to(w)?;
        }

        w.write_u64::<LittleEndian>(self.buffer.len() as u64)?;
        for (key, e) in self.buffer.iter() {
            w.write_u32::<LittleEndian>(key.len() as u32)?;
            w.write_all(key)?;
            w.write_u64::<LittleEndian>(e.value)?;
            w.write_u64::<LittleEndian>(e.seq)?;
        }
        Ok(())
    }
}

fn decode(data: &[u8]) -> Result<Snapshot, MapError> {
    if data.len() < 12 {
        return Err(MapError::format("file too short"));
    }
    let (body, tail) = data.split_at(data.len() - 4);
    let mut r = Cursor::new(body);

    let magic = r.read_u32::<LittleEndian>().map_err(malformed)?;
    if magic != MAGIC {
        return Err(MapError::format(format!("bad magic {:#010x}", magic)));
    }
    let version = r.read_u32::<LittleEndian>().map_err(malformed)?;
    if version != FORMAT_VERSION {
        return Err(MapError::format(format!(
            "unsupported version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let stored_crc = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if crc32fast::hash(body) != stored_crc {
        return Err(MapError::format("checksum mismatch"));
    }

    let (config, seq) = read_config(&mut r).map_err(malformed)?;
    config
        .validate()
        .map_err(|e| MapError::format(format!("invalid configuration: {}", e)))?;

    let remaining = (body.len() as u64).saturating_sub(r.position());
    let values = ValueTable::read_from(&mut r, remaining / 8).map_err(malformed)?;

    let generation_count = r.read_u32::<LittleEndian>().map_err(malformed)?;
    let mut generations = Vec::new();
    for g in 0..generation_count {
        let set = BlockSet::read_from(&mut r).map_err(malformed)?;
        if let Some(block) = set.blocks().find(|b| b.encoding() != config.encoding) {
            return Err(MapError::format(format!(
                "generation {} uses {} blocks under a {} map",
                g,
                block.encoding(),
                config.encoding
            )));
        }
        generations.push(set);
    }

    let buffer = read_buffer(&mut r, seq).map_err(malformed)?;

    if r.position() != body.len() as u64 {
        return Err(MapError::format(format!(
            "{} trailing bytes",
            body.len() as u64 - r.position()
        )));
    }

    Ok(Snapshot {
        config,
        seq,
        values,
        generations,
        buffer,
    })
}

fn read_config<R: Read>(r: &mut R) -> io::Result<(MapConfig, u64)> {
    let seed = r.read_u64::<LittleEndian>()?;
    let fp_len = r.read_u32::<LittleEndian>()?;
    let buffer_threshold = r.read_u64::<LittleEndian>()?;
    let partition_count = r.read_u64::<LittleEndian>()?;
    let encoding_id = r.read_u8()?;
    let load_factor = f64::from_bits(r.read_u64::<LittleEndian>()?);
    let max_build_attempts = r.read_u32::<LittleEndian>()?;
    let seq = r.read_u64::<LittleEndian>()?;

    let encoding = ValueEncoding::from_id(encoding_id).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown encoding id {}", encoding_id),
        )
    })?;
    let to_usize = |v: u64, what: &str| {
        usize::try_from(v).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("{} {} too large", what, v))
        })
    };

    let config = MapConfig {
        seed,
        fp_len,
        buffer_threshold: to_usize(buffer_threshold, "buffer threshold")?,
        partition_count: to_usize(partition_count, "partition count")?,
        encoding,
        load_factor,
        max_build_attempts,
    };
    Ok((config, seq))
}

fn read_buffer(r: &mut Cursor<&[u8]>, max_seq: u64) -> io::Result<WriteBuffer> {
    let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidData, msg);

    let count = r.read_u64::<LittleEndian>()?;
    let mut buffer = WriteBuffer::new();
    for _ in 0..count {
        let key_len = r.read_u32::<LittleEndian>()? as usize;
        if key_len > MAX_KEY_SIZE {
            return Err(invalid(format!("buffered key of {} bytes", key_len)));
        }
        let mut key = vec![0u8; key_len];
        r.read_exact(&mut key)?;
        let value = r.read_u64::<LittleEndian>()?;
        let seq = r.read_u64::<LittleEndian>()?;
        if seq == 0 || seq > max_seq {
            return Err(invalid(format!(
                "buffered entry seq {} outside 1..={}",
                seq, max_seq
            )));
        }
        if buffer.get_entry(&key).is_some() {
            return Err(invalid("duplicate buffered key".to_string()));
        }
        buffer.put(key, value, seq);
    }
    Ok(buffer)
}
