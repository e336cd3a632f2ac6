//! ZIP header structures, reader and writer.

use crate::codec::Codec;
use crate::store::{ArchiveSink, ArchiveSource, ArchiveSummary, EntryInfo};
use oxiarc_core::Crc32;
use srpack_core::error::{Result, SrpackError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// ZIP local file header signature.
pub const LOCAL_FILE_HEADER_SIG: u32 = 0x04034B50;

/// ZIP central directory header signature.
pub const CENTRAL_DIR_HEADER_SIG: u32 = 0x02014B50;

/// ZIP end of central directory signature.
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054B50;

/// ZIP64 end of central directory signature.
pub const ZIP64_END_OF_CENTRAL_DIR_SIG: u32 = 0x06064B50;

/// ZIP64 end of central directory locator signature.
pub const ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG: u32 = 0x07064B50;

/// ZIP64 extra field header ID.
pub const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;

/// Marker value for Zip64 (0xFFFFFFFF for 32-bit fields).
pub const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

/// Marker value for Zip64 (0xFFFF for 16-bit fields).
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// Flag bit for encrypted entries.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Flag bit for UTF-8 file names.
pub const FLAG_UTF8: u16 = 0x0800;

/// Fixed part of a local file header.
const LOCAL_HEADER_LEN: u64 = 30;

/// Fixed part of a central directory header.
const CENTRAL_HEADER_LEN: usize = 46;

/// Fixed part of the end of central directory record.
const EOCD_LEN: usize = 22;

/// Version made by: Unix, APPNOTE 6.3.
const VERSION_MADE_BY: u16 = 0x033F;

/// Version needed for Zip64 structures.
const ZIP64_VERSION: u16 = 45;

#[inline]
fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline]
fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Parse the Zip64 extra field, returning `(uncompressed, compressed, offset)`
/// for the fields whose 32-bit value was the Zip64 marker.
fn parse_zip64_extra(
    extra: &[u8],
    uncompressed: u32,
    compressed: u32,
    offset: u32,
) -> (Option<u64>, Option<u64>, Option<u64>) {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let header_id = le_u16(extra, pos);
        let data_size = le_u16(extra, pos + 2) as usize;
        pos += 4;
        let end = (pos + data_size).min(extra.len());

        if header_id == ZIP64_EXTRA_FIELD_ID {
            let mut field = pos;
            let mut next = |marked: bool| {
                if marked && field + 8 <= end {
                    let value = le_u64(extra, field);
                    field += 8;
                    Some(value)
                } else {
                    None
                }
            };
            let uncompressed_64 = next(uncompressed == ZIP64_MARKER_32);
            let compressed_64 = next(compressed == ZIP64_MARKER_32);
            let offset_64 = next(offset == ZIP64_MARKER_32);
            return (uncompressed_64, compressed_64, offset_64);
        }

        pos = end;
    }
    (None, None, None)
}

/// ZIP archive reader.
///
/// Entries are taken from the central directory.
pub struct ZipReader<R: Read + Seek> {
    reader: R,
    entries: Vec<EntryInfo>,
    data_offsets: Vec<u64>,
    flags: Vec<u16>,
}

impl ZipReader<BufReader<File>> {
    /// Open a ZIP file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ZipReader<R> {
    /// Create a new ZIP reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let (cd_offset, total_entries) = Self::locate_central_directory(&mut reader)?;

        reader.seek(SeekFrom::Start(cd_offset))?;
        let mut entries = Vec::with_capacity(total_entries.min(1 << 16) as usize);
        let mut headers = Vec::with_capacity(entries.capacity());
        for _ in 0..total_entries {
            let (entry, flags, header_offset) = Self::read_central_dir_entry(&mut reader)?;
            entries.push(entry);
            headers.push((flags, header_offset));
        }

        // Local headers may carry a different extra field than the central one.
        let mut data_offsets = Vec::with_capacity(entries.len());
        let mut flags = Vec::with_capacity(entries.len());
        for (entry_flags, header_offset) in headers {
            reader.seek(SeekFrom::Start(header_offset))?;
            let mut local = [0u8; LOCAL_HEADER_LEN as usize];
            reader.read_exact(&mut local)?;
            if le_u32(&local, 0) != LOCAL_FILE_HEADER_SIG {
                return Err(SrpackError::invalid_header(format!(
                    "bad local header signature at offset {}",
                    header_offset
                )));
            }
            let name_len = le_u16(&local, 26) as u64;
            let extra_len = le_u16(&local, 28) as u64;
            data_offsets.push(header_offset + LOCAL_HEADER_LEN + name_len + extra_len);
            flags.push(entry_flags);
        }

        debug!(entries = entries.len(), "read ZIP central directory");
        Ok(Self {
            reader,
            entries,
            data_offsets,
            flags,
        })
    }

    /// Find the central directory: `(offset, entry count)`.
    fn locate_central_directory(reader: &mut R) -> Result<(u64, u64)> {
        let file_size = reader.seek(SeekFrom::End(0))?;

        // Search for EOCD signature (max comment is 65535 bytes)
        let search_start = file_size.saturating_sub(65535 + EOCD_LEN as u64);
        reader.seek(SeekFrom::Start(search_start))?;
        let mut buf = vec![0u8; (file_size - search_start) as usize];
        reader.read_exact(&mut buf)?;

        let eocd_sig = END_OF_CENTRAL_DIR_SIG.to_le_bytes();
        let eocd_offset = buf
            .windows(4)
            .rposition(|w| w == eocd_sig)
            .filter(|&pos| pos + EOCD_LEN <= buf.len())
            .ok_or_else(|| SrpackError::invalid_header("End of central directory not found"))?;
        let eocd = &buf[eocd_offset..];
        let eocd_pos = search_start + eocd_offset as u64;

        let entries_16 = le_u16(eocd, 10);
        let cd_offset_32 = le_u32(eocd, 16);

        // Zip64 EOCD locator sits right before the EOCD
        if eocd_pos >= 20 {
            reader.seek(SeekFrom::Start(eocd_pos - 20))?;
            let mut locator = [0u8; 20];
            reader.read_exact(&mut locator)?;

            if le_u32(&locator, 0) == ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG {
                let zip64_eocd_offset = le_u64(&locator, 8);
                reader.seek(SeekFrom::Start(zip64_eocd_offset))?;
                let mut zip64_eocd = [0u8; 56];
                reader.read_exact(&mut zip64_eocd)?;
                if le_u32(&zip64_eocd, 0) != ZIP64_END_OF_CENTRAL_DIR_SIG {
                    return Err(SrpackError::invalid_header("bad Zip64 end of central directory"));
                }
                return Ok((le_u64(&zip64_eocd, 48), le_u64(&zip64_eocd, 32)));
            }
        }

        Ok((cd_offset_32 as u64, entries_16 as u64))
    }

    /// Read one central directory header: `(entry, flags, local header offset)`.
    fn read_central_dir_entry(reader: &mut R) -> Result<(EntryInfo, u16, u64)> {
        let mut buf = [0u8; CENTRAL_HEADER_LEN];
        reader.read_exact(&mut buf)?;

        let signature = le_u32(&buf, 0);
        if signature != CENTRAL_DIR_HEADER_SIG {
            return Err(SrpackError::invalid_header(format!(
                "bad central directory signature {:#010x}",
                signature
            )));
        }

        let flags = le_u16(&buf, 8);
        let method = le_u16(&buf, 10);
        let crc32 = le_u32(&buf, 16);
        let compressed_size = le_u32(&buf, 20);
        let uncompressed_size = le_u32(&buf, 24);
        let filename_len = le_u16(&buf, 28) as usize;
        let extra_len = le_u16(&buf, 30) as usize;
        let comment_len = le_u16(&buf, 32) as usize;
        let local_header_offset = le_u32(&buf, 42);

        let mut filename = vec![0u8; filename_len];
        reader.read_exact(&mut filename)?;
        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;
        reader.seek(SeekFrom::Current(comment_len as i64))?;

        let (size_64, compressed_64, offset_64) =
            parse_zip64_extra(&extra, uncompressed_size, compressed_size, local_header_offset);

        let entry = EntryInfo {
            name: String::from_utf8_lossy(&filename).into_owned(),
            size: size_64.unwrap_or(uncompressed_size as u64),
            compressed_size: compressed_64.unwrap_or(compressed_size as u64),
            method,
            crc32,
        };
        Ok((
            entry,
            flags,
            offset_64.unwrap_or(local_header_offset as u64),
        ))
    }

    /// Read and decompress the entry at `index`.
    pub fn read_index(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = &self.entries[index];
        if self.flags[index] & FLAG_ENCRYPTED != 0 {
            return Err(SrpackError::unsupported_method(format!(
                "encrypted entry '{}'",
                entry.name
            )));
        }
        let codec = entry.codec().ok_or_else(|| {
            SrpackError::unsupported_method(format!("ZIP method {}", entry.method))
        })?;

        self.reader.seek(SeekFrom::Start(self.data_offsets[index]))?;
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(entry.compressed_size)
            .read_to_end(&mut payload)?;
        if payload.len() as u64 != entry.compressed_size {
            return Err(SrpackError::invalid_header(format!(
                "entry '{}' truncated: {} of {} bytes",
                entry.name,
                payload.len(),
                entry.compressed_size
            )));
        }

        let data = codec.decompress(&payload, entry.size)?;

        let actual_crc = Crc32::compute(&data);
        if actual_crc != entry.crc32 {
            return Err(SrpackError::crc_mismatch(&entry.name, entry.crc32, actual_crc));
        }
        Ok(data)
    }
}

impl<R: Read + Seek> ArchiveSource for ZipReader<R> {
    fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| SrpackError::entry_not_found(name))?;
        self.read_index(index)
    }
}

/// Central directory entry for ZIP writing.
#[derive(Debug, Clone)]
struct CentralDirEntry {
    version_needed: u16,
    flags: u16,
    method: u16,
    mtime: u16,
    mdate: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    filename: String,
    local_header_offset: u64,
}

impl CentralDirEntry {
    /// Check if this entry requires Zip64.
    fn needs_zip64(&self) -> bool {
        self.compressed_size >= ZIP64_MARKER_32 as u64
            || self.uncompressed_size >= ZIP64_MARKER_32 as u64
            || self.local_header_offset >= ZIP64_MARKER_32 as u64
    }

    /// Build Zip64 extra field if needed.
    fn build_zip64_extra(&self) -> Vec<u8> {
        let values: Vec<u64> = [
            self.uncompressed_size,
            self.compressed_size,
            self.local_header_offset,
        ]
        .into_iter()
        .filter(|&v| v >= ZIP64_MARKER_32 as u64)
        .collect();
        if values.is_empty() {
            return Vec::new();
        }

        let mut extra = Vec::with_capacity(4 + 8 * values.len());
        extra.extend_from_slice(&ZIP64_EXTRA_FIELD_ID.to_le_bytes());
        extra.extend_from_slice(&((8 * values.len()) as u16).to_le_bytes());
        for value in values {
            extra.extend_from_slice(&value.to_le_bytes());
        }
        extra
    }

    /// Write the central directory entry, returning its size.
    fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let filename_bytes = self.filename.as_bytes();
        let zip64_extra = self.build_zip64_extra();
        let clamp = |v: u64| v.min(ZIP64_MARKER_32 as u64) as u32;
        let version_needed = if self.needs_zip64() {
            self.version_needed.max(ZIP64_VERSION)
        } else {
            self.version_needed
        };

        let mut header = Vec::with_capacity(CENTRAL_HEADER_LEN + filename_bytes.len());
        header.extend_from_slice(&CENTRAL_DIR_HEADER_SIG.to_le_bytes());
        header.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
        header.extend_from_slice(&version_needed.to_le_bytes());
        header.extend_from_slice(&self.flags.to_le_bytes());
        header.extend_from_slice(&self.method.to_le_bytes());
        header.extend_from_slice(&self.mtime.to_le_bytes());
        header.extend_from_slice(&self.mdate.to_le_bytes());
        header.extend_from_slice(&self.crc32.to_le_bytes());
        header.extend_from_slice(&clamp(self.compressed_size).to_le_bytes());
        header.extend_from_slice(&clamp(self.uncompressed_size).to_le_bytes());
        header.extend_from_slice(&(filename_bytes.len() as u16).to_le_bytes());
        header.extend_from_slice(&(zip64_extra.len() as u16).to_le_bytes());
        // Comment length, disk number start, internal attributes
        header.extend_from_slice(&[0u8; 6]);
        // External attributes: regular file, rw-r--r--
        header.extend_from_slice(&(0o100644u32 << 16).to_le_bytes());
        header.extend_from_slice(&clamp(self.local_header_offset).to_le_bytes());
        header.extend_from_slice(filename_bytes);
        header.extend_from_slice(&zip64_extra);

        writer.write_all(&header)?;
        Ok(header.len() as u64)
    }
}

/// ZIP archive writer.
///
/// Entries are streamed to the underlying writer as they are added; the
/// central directory is written by [`ArchiveSink::finish`] (or on drop).
pub struct ZipWriter<W: Write> {
    writer: W,
    entries: Vec<CentralDirEntry>,
    offset: u64,
    mtime: u16,
    mdate: u16,
    summary: ArchiveSummary,
    finished: bool,
}

impl ZipWriter<BufWriter<File>> {
    /// Create a ZIP file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ZipWriter<W> {
    /// Create a new ZIP writer stamping entries with the current time.
    pub fn new(writer: W) -> Self {
        let (mtime, mdate) = dos_datetime(SystemTime::now());
        Self {
            writer,
            entries: Vec::new(),
            offset: 0,
            mtime,
            mdate,
            summary: ArchiveSummary::default(),
            finished: false,
        }
    }

    /// Set the modification time recorded for subsequent entries.
    pub fn set_modified(&mut self, time: SystemTime) {
        (self.mtime, self.mdate) = dos_datetime(time);
    }

    /// Totals of the entries written so far.
    pub fn summary(&self) -> ArchiveSummary {
        self.summary
    }

    /// Stop writing without a central directory.
    ///
    /// The output is left without end records, so no reader mistakes it for
    /// a complete archive. Later `add_entry` calls fail and `finish` and drop
    /// write nothing.
    pub fn abort(&mut self) {
        if !self.finished {
            debug!(entries = self.entries.len(), "aborted ZIP archive");
        }
        self.finished = true;
    }

    fn write_local_header(&mut self, entry: &CentralDirEntry) -> Result<u64> {
        let filename_bytes = entry.filename.as_bytes();
        let needs_zip64 = entry.needs_zip64();

        // Local Zip64 extra always carries both sizes
        let mut local_extra = Vec::new();
        if needs_zip64 {
            local_extra.extend_from_slice(&ZIP64_EXTRA_FIELD_ID.to_le_bytes());
            local_extra.extend_from_slice(&16u16.to_le_bytes());
            local_extra.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            local_extra.extend_from_slice(&entry.compressed_size.to_le_bytes());
        }
        let (compressed_32, uncompressed_32, version_needed) = if needs_zip64 {
            (
                ZIP64_MARKER_32,
                ZIP64_MARKER_32,
                entry.version_needed.max(ZIP64_VERSION),
            )
        } else {
            (
                entry.compressed_size as u32,
                entry.uncompressed_size as u32,
                entry.version_needed,
            )
        };

        let mut header = Vec::with_capacity(LOCAL_HEADER_LEN as usize + filename_bytes.len());
        header.extend_from_slice(&LOCAL_FILE_HEADER_SIG.to_le_bytes());
        header.extend_from_slice(&version_needed.to_le_bytes());
        header.extend_from_slice(&entry.flags.to_le_bytes());
        header.extend_from_slice(&entry.method.to_le_bytes());
        header.extend_from_slice(&entry.mtime.to_le_bytes());
        header.extend_from_slice(&entry.mdate.to_le_bytes());
        header.extend_from_slice(&entry.crc32.to_le_bytes());
        header.extend_from_slice(&compressed_32.to_le_bytes());
        header.extend_from_slice(&uncompressed_32.to_le_bytes());
        header.extend_from_slice(&(filename_bytes.len() as u16).to_le_bytes());
        header.extend_from_slice(&(local_extra.len() as u16).to_le_bytes());
        header.extend_from_slice(filename_bytes);
        header.extend_from_slice(&local_extra);

        self.writer.write_all(&header)?;
        Ok(header.len() as u64)
    }

    fn write_end_records(&mut self, cd_offset: u64, cd_size: u64) -> Result<()> {
        let num_entries = self.entries.len() as u64;
        let needs_zip64 = num_entries >= ZIP64_MARKER_16 as u64
            || cd_size >= ZIP64_MARKER_32 as u64
            || cd_offset >= ZIP64_MARKER_32 as u64;

        let mut tail = Vec::with_capacity(98);
        if needs_zip64 {
            let zip64_eocd_offset = cd_offset + cd_size;

            // Zip64 end of central directory record
            tail.extend_from_slice(&ZIP64_END_OF_CENTRAL_DIR_SIG.to_le_bytes());
            tail.extend_from_slice(&44u64.to_le_bytes());
            tail.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
            tail.extend_from_slice(&ZIP64_VERSION.to_le_bytes());
            tail.extend_from_slice(&0u32.to_le_bytes());
            tail.extend_from_slice(&0u32.to_le_bytes());
            tail.extend_from_slice(&num_entries.to_le_bytes());
            tail.extend_from_slice(&num_entries.to_le_bytes());
            tail.extend_from_slice(&cd_size.to_le_bytes());
            tail.extend_from_slice(&cd_offset.to_le_bytes());

            // Zip64 end of central directory locator
            tail.extend_from_slice(&ZIP64_END_OF_CENTRAL_DIR_LOCATOR_SIG.to_le_bytes());
            tail.extend_from_slice(&0u32.to_le_bytes());
            tail.extend_from_slice(&zip64_eocd_offset.to_le_bytes());
            tail.extend_from_slice(&1u32.to_le_bytes());
        }

        let entries_16 = num_entries.min(ZIP64_MARKER_16 as u64) as u16;
        tail.extend_from_slice(&END_OF_CENTRAL_DIR_SIG.to_le_bytes());
        tail.extend_from_slice(&0u16.to_le_bytes());
        tail.extend_from_slice(&0u16.to_le_bytes());
        tail.extend_from_slice(&entries_16.to_le_bytes());
        tail.extend_from_slice(&entries_16.to_le_bytes());
        tail.extend_from_slice(&(cd_size.min(ZIP64_MARKER_32 as u64) as u32).to_le_bytes());
        tail.extend_from_slice(&(cd_offset.min(ZIP64_MARKER_32 as u64) as u32).to_le_bytes());
        tail.extend_from_slice(&0u16.to_le_bytes());

        self.writer.write_all(&tail)?;
        Ok(())
    }
}

impl<W: Write> ArchiveSink for ZipWriter<W> {
    fn add_entry(&mut self, name: &str, data: &[u8], codec: Codec) -> Result<EntryInfo> {
        if self.finished {
            return Err(SrpackError::invalid_header("archive already finished"));
        }

        let crc32 = Crc32::compute(data);

        // Only keep compressed output when it is smaller
        let (payload, codec) = match codec {
            Codec::Store => (data.to_vec(), Codec::Store),
            _ => {
                let compressed = codec.compress(data)?;
                if compressed.len() < data.len() {
                    (compressed, codec)
                } else {
                    (data.to_vec(), Codec::Store)
                }
            }
        };

        let entry = CentralDirEntry {
            version_needed: codec.version_needed(),
            flags: if name.is_ascii() { 0 } else { FLAG_UTF8 },
            method: codec.zip_method(),
            mtime: self.mtime,
            mdate: self.mdate,
            crc32,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            filename: name.to_string(),
            local_header_offset: self.offset,
        };

        let header_len = self.write_local_header(&entry)?;
        self.writer.write_all(&payload)?;
        self.offset += header_len + payload.len() as u64;

        let info = EntryInfo {
            name: entry.filename.clone(),
            size: entry.uncompressed_size,
            compressed_size: entry.compressed_size,
            method: entry.method,
            crc32,
        };
        debug!(
            name,
            method = %codec,
            size = info.size,
            compressed = info.compressed_size,
            "added ZIP entry"
        );
        self.summary.add(&info);
        self.entries.push(entry);
        Ok(info)
    }

    fn finish(&mut self) -> Result<ArchiveSummary> {
        if self.finished {
            return Ok(self.summary);
        }

        let cd_offset = self.offset;
        let mut cd_size = 0u64;
        for entry in &self.entries {
            cd_size += entry.write(&mut self.writer)?;
        }
        self.write_end_records(cd_offset, cd_size)?;

        self.writer.flush()?;
        self.finished = true;
        Ok(self.summary)
    }
}

impl<W: Write> Drop for ZipWriter<W> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// Convert a timestamp to DOS `(time, date)` fields.
///
/// Dates before 1980 clamp to 1980-01-01.
pub fn dos_datetime(time: SystemTime) -> (u16, u16) {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let time_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);

    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;
    let mtime = ((hours << 11) | (minutes << 5) | (seconds / 2)) as u16;
    let mdate = if year < 1980 {
        (1 << 5) | 1
    } else {
        let years = (year - 1980).min(127) as u16;
        (years << 9) | ((month as u16) << 5) | day as u16
    };
    (mtime, mdate)
}

/// Days since 1970-01-01 to a proleptic Gregorian `(year, month, day)`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
