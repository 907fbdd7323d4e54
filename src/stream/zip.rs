//! Incremental ZIP encoder.
//!
//! Produces a ZIP container front to back without seeking, so it can be
//! written straight into an HTTP body:
//!
//! ```text
//! ┌──────────────┬──────────┬────────────┐
//! │ local header │   data   │ descriptor │  × N entries
//! └──────────────┴──────────┴────────────┘
//! ┌───────────────────┬──────────────────────────────┐
//! │ central directory │ [ZIP64 end + locator] + end  │
//! └───────────────────┴──────────────────────────────┘
//! ```
//!
//! CRC and sizes are not known when the local header goes out, so every
//! entry sets general purpose bit 3 and carries a data descriptor. Entries
//! declared larger than 32-bit limits get ZIP64 extra fields.

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use flate2::{Compress, Compression, Crc, FlushCompress, Status};

use crate::error::ArchiveError;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
const ZIP64_END_SIGNATURE: u32 = 0x0606_4b50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Bit 3: sizes and CRC follow the data. Bit 11: names are UTF-8.
const FLAGS: u16 = (1 << 3) | (1 << 11);

const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;

/// Largest payload of a DEFLATE stored block.
const DEFLATE_STORED_BLOCK: u64 = 0xFFFF;

/// Header bytes per DEFLATE stored block.
const DEFLATE_BLOCK_OVERHEAD: u64 = 5;

/// Extra slack on top of the deflate bound.
const DEFLATE_SLACK: u64 = 64 * 1024;

const U32_MARKER: u32 = 0xFFFF_FFFF;
const U16_MARKER: u16 = 0xFFFF;

/// Output reserved per deflate call.
const DEFLATE_CHUNK: usize = 32 * 1024;

/// Compression method applied to archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CompressionMethod {
    /// No compression; media files rarely shrink
    #[default]
    Stored,

    /// Raw DEFLATE
    Deflate,
}

impl CompressionMethod {
    fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
        }
    }

    /// Upper bound on the bytes an entry of `declared_length` can occupy.
    ///
    /// Incompressible input falls back to stored blocks, each adding a
    /// small header.
    fn worst_case_size(&self, declared_length: u64) -> u64 {
        match self {
            CompressionMethod::Stored => declared_length,
            CompressionMethod::Deflate => {
                let blocks = declared_length / DEFLATE_STORED_BLOCK + 1;
                declared_length
                    .saturating_add(blocks * DEFLATE_BLOCK_OVERHEAD)
                    .saturating_add(DEFLATE_SLACK)
            }
        }
    }

    /// True when an entry of `declared_length` needs ZIP64 sizes.
    fn needs_zip64(&self, declared_length: u64) -> bool {
        self.worst_case_size(declared_length) >= U32_MARKER as u64
    }
}

/// State of the entry currently being written.
struct OpenEntry {
    name: String,
    header_offset: u64,
    zip64: bool,
    crc: Crc,
    uncompressed: u64,
    compressed: u64,
    deflater: Option<Compress>,
}

/// What the central directory needs to know about a finished entry.
struct CentralEntry {
    name: String,
    header_offset: u64,
    zip64: bool,
    crc: u32,
    uncompressed: u64,
    compressed: u64,
}

/// Streaming ZIP writer. Each call returns the bytes to emit next.
pub struct ZipEncoder {
    method: CompressionMethod,
    dos_time: u16,
    dos_date: u16,
    offset: u64,
    current: Option<OpenEntry>,
    entries: Vec<CentralEntry>,
}

impl ZipEncoder {
    /// Create an encoder stamping entries with the current local time.
    pub fn new(method: CompressionMethod) -> Self {
        Self::with_timestamp(method, Local::now().naive_local())
    }

    /// Create an encoder stamping entries with a fixed time.
    pub fn with_timestamp(method: CompressionMethod, timestamp: NaiveDateTime) -> Self {
        let (dos_time, dos_date) = dos_timestamp(timestamp);
        Self {
            method,
            dos_time,
            dos_date,
            offset: 0,
            current: None,
            entries: Vec::new(),
        }
    }

    /// Total bytes emitted so far.
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Number of completed entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Begin a new entry and return its local file header.
    pub fn start_entry(&mut self, name: &str, declared_length: u64) -> Result<Bytes, ArchiveError> {
        if self.current.is_some() {
            return Err(ArchiveError::EntryInProgress);
        }
        if name.len() > u16::MAX as usize {
            return Err(ArchiveError::NameTooLong(name.len()));
        }

        let zip64 = self.method.needs_zip64(declared_length);
        let mut buf = Vec::with_capacity(30 + name.len() + 20);

        buf.write_u32::<LittleEndian>(LOCAL_HEADER_SIGNATURE)?;
        buf.write_u16::<LittleEndian>(version_needed(zip64))?;
        buf.write_u16::<LittleEndian>(FLAGS)?;
        buf.write_u16::<LittleEndian>(self.method.as_u16())?;
        buf.write_u16::<LittleEndian>(self.dos_time)?;
        buf.write_u16::<LittleEndian>(self.dos_date)?;
        buf.write_u32::<LittleEndian>(0)?; // crc, in descriptor
        if zip64 {
            buf.write_u32::<LittleEndian>(U32_MARKER)?;
            buf.write_u32::<LittleEndian>(U32_MARKER)?;
        } else {
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u32::<LittleEndian>(0)?;
        }
        buf.write_u16::<LittleEndian>(name.len() as u16)?;
        buf.write_u16::<LittleEndian>(if zip64 { 20 } else { 0 })?;
        buf.extend_from_slice(name.as_bytes());
        if zip64 {
            buf.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
            buf.write_u16::<LittleEndian>(16)?;
            buf.write_u64::<LittleEndian>(0)?;
            buf.write_u64::<LittleEndian>(0)?;
        }

        let deflater = match self.method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(Compress::new(Compression::default(), false)),
        };

        self.current = Some(OpenEntry {
            name: name.to_string(),
            header_offset: self.offset,
            zip64,
            crc: Crc::new(),
            uncompressed: 0,
            compressed: 0,
            deflater,
        });

        Ok(self.emit(buf))
    }

    /// Feed entry data; returns whatever compressed output is ready.
    pub fn write(&mut self, data: &[u8]) -> Result<Bytes, ArchiveError> {
        let entry = self.current.as_mut().ok_or(ArchiveError::NoEntry)?;
        entry.crc.update(data);
        entry.uncompressed += data.len() as u64;

        let out = match entry.deflater.as_mut() {
            None => data.to_vec(),
            Some(deflater) => {
                let mut out = Vec::new();
                deflate(deflater, data, FlushCompress::None, &mut out)?;
                out
            }
        };
        entry.compressed += out.len() as u64;

        Ok(self.emit(out))
    }

    /// Close the current entry and return the trailing bytes and descriptor.
    pub fn finish_entry(&mut self) -> Result<Bytes, ArchiveError> {
        let mut entry = self.current.take().ok_or(ArchiveError::NoEntry)?;

        let mut buf = Vec::new();
        if let Some(deflater) = entry.deflater.as_mut() {
            deflate(deflater, &[], FlushCompress::Finish, &mut buf)?;
            entry.compressed += buf.len() as u64;
        }

        if !entry.zip64 {
            let largest = entry.compressed.max(entry.uncompressed);
            if largest > u32::MAX as u64 {
                return Err(ArchiveError::EntryTooLarge {
                    name: entry.name,
                    size: largest,
                });
            }
        }

        let crc = entry.crc.sum();
        buf.write_u32::<LittleEndian>(DATA_DESCRIPTOR_SIGNATURE)?;
        buf.write_u32::<LittleEndian>(crc)?;
        if entry.zip64 {
            buf.write_u64::<LittleEndian>(entry.compressed)?;
            buf.write_u64::<LittleEndian>(entry.uncompressed)?;
        } else {
            buf.write_u32::<LittleEndian>(entry.compressed as u32)?;
            buf.write_u32::<LittleEndian>(entry.uncompressed as u32)?;
        }

        self.entries.push(CentralEntry {
            name: entry.name,
            header_offset: entry.header_offset,
            zip64: entry.zip64,
            crc,
            uncompressed: entry.uncompressed,
            compressed: entry.compressed,
        });

        Ok(self.emit(buf))
    }

    /// Write the central directory and end records.
    pub fn finish(&mut self) -> Result<Bytes, ArchiveError> {
        if self.current.is_some() {
            return Err(ArchiveError::EntryInProgress);
        }

        let cd_offset = self.offset;
        let mut buf = Vec::new();

        for entry in &self.entries {
            let zip64 = entry.zip64 || entry.header_offset >= U32_MARKER as u64;

            buf.write_u32::<LittleEndian>(CENTRAL_HEADER_SIGNATURE)?;
            buf.write_u16::<LittleEndian>(VERSION_ZIP64)?; // made by
            buf.write_u16::<LittleEndian>(version_needed(zip64))?;
            buf.write_u16::<LittleEndian>(FLAGS)?;
            buf.write_u16::<LittleEndian>(self.method.as_u16())?;
            buf.write_u16::<LittleEndian>(self.dos_time)?;
            buf.write_u16::<LittleEndian>(self.dos_date)?;
            buf.write_u32::<LittleEndian>(entry.crc)?;
            if zip64 {
                buf.write_u32::<LittleEndian>(U32_MARKER)?;
                buf.write_u32::<LittleEndian>(U32_MARKER)?;
            } else {
                buf.write_u32::<LittleEndian>(entry.compressed as u32)?;
                buf.write_u32::<LittleEndian>(entry.uncompressed as u32)?;
            }
            buf.write_u16::<LittleEndian>(entry.name.len() as u16)?;
            buf.write_u16::<LittleEndian>(if zip64 { 28 } else { 0 })?;
            buf.write_u16::<LittleEndian>(0)?; // comment
            buf.write_u16::<LittleEndian>(0)?; // disk
            buf.write_u16::<LittleEndian>(0)?; // internal attributes
            buf.write_u32::<LittleEndian>(0)?; // external attributes
            if zip64 {
                buf.write_u32::<LittleEndian>(U32_MARKER)?;
            } else {
                buf.write_u32::<LittleEndian>(entry.header_offset as u32)?;
            }
            buf.extend_from_slice(entry.name.as_bytes());
            if zip64 {
                buf.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
                buf.write_u16::<LittleEndian>(24)?;
                buf.write_u64::<LittleEndian>(entry.uncompressed)?;
                buf.write_u64::<LittleEndian>(entry.compressed)?;
                buf.write_u64::<LittleEndian>(entry.header_offset)?;
            }
        }

        let cd_size = buf.len() as u64;
        let count = self.entries.len() as u64;
        let needs_zip64_end = count >= U16_MARKER as u64
            || cd_size >= U32_MARKER as u64
            || cd_offset >= U32_MARKER as u64;

        if needs_zip64_end {
            let zip64_end_offset = cd_offset + cd_size;

            buf.write_u32::<LittleEndian>(ZIP64_END_SIGNATURE)?;
            buf.write_u64::<LittleEndian>(44)?; // remaining record size
            buf.write_u16::<LittleEndian>(VERSION_ZIP64)?;
            buf.write_u16::<LittleEndian>(VERSION_ZIP64)?;
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u64::<LittleEndian>(count)?;
            buf.write_u64::<LittleEndian>(count)?;
            buf.write_u64::<LittleEndian>(cd_size)?;
            buf.write_u64::<LittleEndian>(cd_offset)?;

            buf.write_u32::<LittleEndian>(ZIP64_LOCATOR_SIGNATURE)?;
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u64::<LittleEndian>(zip64_end_offset)?;
            buf.write_u32::<LittleEndian>(1)?;
        }

        buf.write_u32::<LittleEndian>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_u16::<LittleEndian>(count.min(U16_MARKER as u64) as u16)?;
        buf.write_u16::<LittleEndian>(count.min(U16_MARKER as u64) as u16)?;
        buf.write_u32::<LittleEndian>(cd_size.min(U32_MARKER as u64) as u32)?;
        buf.write_u32::<LittleEndian>(cd_offset.min(U32_MARKER as u64) as u32)?;
        buf.write_u16::<LittleEndian>(0)?; // comment

        Ok(self.emit(buf))
    }

    fn emit(&mut self, buf: Vec<u8>) -> Bytes {
        self.offset += buf.len() as u64;
        Bytes::from(buf)
    }
}

fn version_needed(zip64: bool) -> u16 {
    if zip64 {
        VERSION_ZIP64
    } else {
        VERSION_DEFAULT
    }
}

/// Run the deflater until `input` is consumed (or the stream ends on finish).
fn deflate(
    deflater: &mut Compress,
    mut input: &[u8],
    flush: FlushCompress,
    out: &mut Vec<u8>,
) -> Result<(), ArchiveError> {
    loop {
        if out.capacity() - out.len() < DEFLATE_CHUNK / 4 {
            out.reserve(DEFLATE_CHUNK);
        }

        let before = deflater.total_in();
        let status = deflater
            .compress_vec(input, out, flush)
            .map_err(|e| ArchiveError::Compression(e.to_string()))?;
        let consumed = (deflater.total_in() - before) as usize;
        input = &input[consumed..];

        match flush {
            FlushCompress::Finish => {
                if status == Status::StreamEnd {
                    return Ok(());
                }
            }
            _ => {
                if input.is_empty() {
                    return Ok(());
                }
            }
        }
    }
}

/// Pack a timestamp into MS-DOS `(time, date)` fields.
fn dos_timestamp(timestamp: NaiveDateTime) -> (u16, u16) {
    if timestamp.year() < 1980 {
        return (0, (1 << 5) | 1);
    }

    let year = (timestamp.year() - 1980).min(127) as u16;
    let date = (year << 9) | ((timestamp.month() as u16) << 5) | timestamp.day() as u16;
    let time = ((timestamp.hour() as u16) << 11)
        | ((timestamp.minute() as u16) << 5)
        | (timestamp.second() as u16 / 2);
    (time, date)
}
