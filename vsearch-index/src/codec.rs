//! # Index Codec
//!
//! Versioned binary format for `ExactIndex`.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────┬───────────────┬──────────────────────────────────────┐
//! │ version: u8 │ count: uvarint│ entry × count                        │
//! └─────────────┴───────────────┴──────────────────────────────────────┘
//!
//! entry = [len: uvarint][f32 LE × len][payload?]
//! payload = [len: uvarint][bytes]     (text and byte-blob payloads only)
//! ```
//!
//! Unsigned varints are LEB128, at most 10 bytes. Payload kinds the codec
//! does not recognize are skipped on write and come back as
//! `Default::default()` on read.
//!
//! Files written by `save` are wrapped in raw DEFLATE.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use tracing::{debug, info};

use vsearch_core::config::{Compression, PersistenceConfig};
use vsearch_core::error::{ensure_dimension, Error, Result};
use vsearch_core::types::Entry;

use crate::exact::ExactIndex;

/// Current format version
pub const FORMAT_VERSION: u8 = 1;

/// Maximum number of bytes a u64 varint can occupy
pub const MAX_VARINT_LEN: usize = 10;

/// How a payload type is represented on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// UTF-8 text, length-prefixed
    Text,
    /// Raw bytes, length-prefixed
    Bytes,
    /// Not persisted; restored as the type's default
    Opaque,
}

/// Payload types an `ExactIndex` can persist.
///
/// The kind is an associated constant, so every index is monomorphic in
/// how its payloads are encoded.
pub trait Payload: Sized {
    const KIND: PayloadKind;

    /// Bytes written for `Text` / `Bytes` kinds
    fn wire_bytes(&self) -> &[u8] {
        &[]
    }

    /// Rebuild from wire bytes; `Opaque` kinds receive an empty buffer
    fn from_wire(bytes: Vec<u8>) -> Result<Self>;
}

impl Payload for String {
    const KIND: PayloadKind = PayloadKind::Text;

    fn wire_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn from_wire(bytes: Vec<u8>) -> Result<Self> {
        String::from_utf8(bytes).map_err(|e| Error::Corrupted {
            details: format!("payload is not valid UTF-8: {}", e),
        })
    }
}

impl Payload for Box<str> {
    const KIND: PayloadKind = PayloadKind::Text;

    fn wire_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn from_wire(bytes: Vec<u8>) -> Result<Self> {
        String::from_wire(bytes).map(String::into_boxed_str)
    }
}

impl Payload for Vec<u8> {
    const KIND: PayloadKind = PayloadKind::Bytes;

    fn wire_bytes(&self) -> &[u8] {
        self
    }

    fn from_wire(bytes: Vec<u8>) -> Result<Self> {
        Ok(bytes)
    }
}

macro_rules! opaque_payload {
    ($($t:ty),* $(,)?) => {
        $(
            impl Payload for $t {
                const KIND: PayloadKind = PayloadKind::Opaque;

                fn from_wire(_bytes: Vec<u8>) -> Result<Self> {
                    Ok(<$t>::default())
                }
            }
        )*
    };
}

opaque_payload!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, ());

// ============================================================================
// Wire primitives
// ============================================================================

/// Encode `value` as LEB128 into `buf`, returning the bytes used
pub fn encode_uvarint(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Writer that tracks how many bytes went through it
struct WireWriter<W> {
    inner: W,
    offset: u64,
}

impl<W: Write> WireWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        self.offset += 1;
        Ok(())
    }

    fn write_uvarint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let n = encode_uvarint(value, &mut buf);
        self.inner.write_all(&buf[..n])?;
        self.offset += n as u64;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_uvarint(bytes.len() as u64)?;
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn write_f32s(&mut self, values: &[f32]) -> Result<()> {
        self.write_uvarint(values.len() as u64)?;
        let mut buf = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut buf);
        self.inner.write_all(&buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }
}

/// Reader that tracks how many bytes came through it
struct WireReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> Read for WireReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl<R: Read> WireReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    fn read_uvarint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for i in 0..MAX_VARINT_LEN {
            let byte = ReadBytesExt::read_u8(self)?;
            if byte < 0x80 {
                if i == MAX_VARINT_LEN - 1 && byte > 1 {
                    break;
                }
                return Ok(value | (byte as u64) << shift);
            }
            value |= ((byte & 0x7F) as u64) << shift;
            shift += 7;
        }
        Err(Error::Corrupted {
            details: "varint overflows u64".to_string(),
        })
    }

    /// Read exactly `len` bytes without trusting `len` for preallocation
    fn read_exact_len(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.by_ref().take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", len, buf.len()),
            )
            .into());
        }
        Ok(buf)
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_uvarint()?;
        self.read_exact_len(len)
    }

    fn read_f32s(&mut self) -> Result<Vec<f32>> {
        let len = self.read_uvarint()?;
        let byte_len = len.checked_mul(4).ok_or_else(|| Error::Corrupted {
            details: format!("vector length {} too large", len),
        })?;
        let bytes = self.read_exact_len(byte_len)?;
        let mut values = vec![0f32; len as usize];
        LittleEndian::read_f32_into(&bytes, &mut values);
        Ok(values)
    }
}

// ============================================================================
// Stream codec
// ============================================================================

impl<T: Payload> ExactIndex<T> {
    /// Serialize the index to `dst`, returning the number of bytes written
    pub fn write_to<W: Write>(&self, dst: W) -> Result<u64> {
        let mut w = WireWriter::new(dst);
        w.write_u8(FORMAT_VERSION)?;
        w.write_uvarint(self.entries.len() as u64)?;

        let persist_payload = T::KIND != PayloadKind::Opaque;
        for entry in &self.entries {
            w.write_f32s(&entry.vector)?;
            if persist_payload {
                w.write_bytes(entry.payload.wire_bytes())?;
            }
        }

        w.inner.flush()?;
        Ok(w.offset)
    }

    /// Replace the index contents with entries read from `src`, returning
    /// the number of bytes consumed.
    ///
    /// After an error the index must be discarded.
    pub fn read_from<R: Read>(&mut self, src: R) -> Result<u64> {
        let mut r = WireReader::new(src);

        let version = ReadBytesExt::read_u8(&mut r)?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion { version });
        }

        let count = r.read_uvarint()?;
        let mut entries = Vec::with_capacity(count.min(4096) as usize);
        let mut dimension = self.dimension;

        for _ in 0..count {
            let vector = r.read_f32s()?;
            match dimension {
                Some(dim) => ensure_dimension(dim, vector.len())?,
                None => dimension = Some(vector.len()),
            }

            let payload = match T::KIND {
                PayloadKind::Opaque => T::from_wire(Vec::new())?,
                PayloadKind::Text | PayloadKind::Bytes => T::from_wire(r.read_bytes()?)?,
            };
            entries.push(Entry::new(vector, payload));
        }

        self.entries = entries;
        self.dimension = dimension;
        Ok(r.offset)
    }

    /// Deserialize a fresh index from `src`
    pub fn from_reader<R: Read>(src: R) -> Result<Self> {
        let mut index = Self::new();
        index.read_from(src)?;
        Ok(index)
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Save index to a DEFLATE-compressed file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.save_with(path, &PersistenceConfig::default())
    }

    /// Load index from a DEFLATE-compressed file
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, &PersistenceConfig::default())
    }

    pub fn save_with(&self, path: &Path, config: &PersistenceConfig) -> Result<()> {
        config.validate()?;
        let file = BufWriter::new(File::create(path)?);

        let written = match config.compression {
            Compression::None => {
                let mut file = file;
                let n = self.write_to(&mut file)?;
                file.flush()?;
                n
            }
            Compression::Deflate => {
                let mut encoder = DeflateEncoder::new(file, flate2::Compression::new(config.level));
                let n = self.write_to(&mut encoder)?;
                encoder.finish()?.flush()?;
                n
            }
        };

        info!(
            "Saved index: {} entries, {} bytes uncompressed -> {:?}",
            self.entries.len(),
            written,
            path
        );
        Ok(())
    }

    pub fn load_with(path: &Path, config: &PersistenceConfig) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        let mut index = Self::new();

        let read = match config.compression {
            Compression::None => index.read_from(file)?,
            Compression::Deflate => index.read_from(DeflateDecoder::new(file))?,
        };

        debug!("Read {} bytes from {:?}", read, path);
        info!("Loaded index: {} entries from {:?}", index.len(), path);
        Ok(index)
    }
}
