//! Zip-style container reading for package archives.
//!
//! Minimal Zip32 reader: EOCD search, central directory walk, local
//! header validation, stored and deflate payloads. All sizes and offsets
//! are untrusted and validated against the file length before use.
//! Zip64 sentinels and multi-disk archives are rejected as invalid.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::DeflateDecoder;
use tracing::debug;

use crate::error::{Result, ScanError};

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_MIN_LEN: usize = 22;
// 64 KiB comment + header margin
const EOCD_SEARCH_MAX: usize = 66 * 1024;

/// Central directory fixed header length.
const CDFH_LEN: usize = 46;
/// Local file header fixed length.
const LFH_LEN: usize = 30;

/// Entry names longer than this are rejected as corrupt.
const MAX_NAME_LEN: usize = 4096;

/// Central-directory facts for one archive entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub method: u16,
    pub flags: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_encrypted(&self) -> bool {
        (self.flags & 0x0001) != 0
    }
}

/// An opened package archive with its central directory parsed.
///
/// Entry metadata is held in memory; payloads are read one at a time on
/// demand through [`ZipArchive::read_entry`].
pub struct ZipArchive {
    file: File,
    file_len: u64,
    entries: Vec<ZipEntry>,
}

impl std::fmt::Debug for ZipArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("file_len", &self.file_len)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ZipArchive {
    /// Open an archive and parse its central directory.
    ///
    /// A missing path maps to [`ScanError::NotFound`]; anything that is
    /// not a parsable Zip32 container maps to [`ScanError::InvalidFormat`].
    pub fn open(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_file(file, path)
    }

    fn from_file(mut file: File, path: &Path) -> Result<Self> {
        let file_len = file.metadata()?.len();
        if file_len < EOCD_MIN_LEN as u64 {
            return Err(ScanError::InvalidFormat(format!(
                "{}: too small for a zip container",
                path.display()
            )));
        }

        // Read the tail window and scan backwards for the EOCD record.
        let win_len = (file_len as usize).min(EOCD_SEARCH_MAX);
        let win_off = file_len - win_len as u64;
        file.seek(SeekFrom::Start(win_off))?;
        let mut win = vec![0u8; win_len];
        file.read_exact(&mut win)?;

        let eocd_rel = find_eocd(&win).ok_or_else(|| {
            ScanError::InvalidFormat(format!(
                "{}: end of central directory not found",
                path.display()
            ))
        })?;
        let eocd = &win[eocd_rel..];

        let disk_no = le_u16(&eocd[4..6]);
        let cd_disk = le_u16(&eocd[6..8]);
        let entries_disk = le_u16(&eocd[8..10]);
        let entries_total = le_u16(&eocd[10..12]);
        let cd_size = le_u32(&eocd[12..16]) as u64;
        let cd_off = le_u32(&eocd[16..20]) as u64;

        if disk_no != 0 || cd_disk != 0 || entries_disk != entries_total {
            return Err(ScanError::InvalidFormat(
                "multi-disk archives are not supported".to_string(),
            ));
        }
        // Zip64 sentinel values in the EOCD.
        if entries_total == 0xFFFF || cd_size == u64::from(u32::MAX) || cd_off == u64::from(u32::MAX)
        {
            return Err(ScanError::InvalidFormat(
                "zip64 archives are not supported".to_string(),
            ));
        }
        let cd_end = cd_off.saturating_add(cd_size);
        if cd_off > file_len || cd_end > file_len {
            return Err(ScanError::InvalidFormat(
                "central directory out of bounds".to_string(),
            ));
        }

        let entries = read_central_directory(&mut file, file_len, cd_off, cd_end, entries_total)?;
        debug!(
            archive = %path.display(),
            entries = entries.len(),
            "parsed central directory"
        );

        Ok(Self {
            file,
            file_len,
            entries,
        })
    }

    /// Entries in central-directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn entry_by_name(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Read and decompress one entry's full payload.
    pub fn read_entry(&mut self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let mut reader = self.entry_reader(entry)?;
        let mut out = Vec::with_capacity(entry.uncompressed_size.min(1 << 20) as usize);
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Read at most `n` decompressed bytes from an entry, for cheap
    /// content sniffing without materializing the payload.
    pub fn read_entry_prefix(&mut self, entry: &ZipEntry, n: usize) -> Result<Vec<u8>> {
        let mut reader = self.entry_reader(entry)?.take(n as u64);
        let mut out = Vec::with_capacity(n);
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    fn entry_reader(&mut self, entry: &ZipEntry) -> Result<Box<dyn Read + '_>> {
        if entry.is_encrypted() {
            return Err(ScanError::InvalidFormat(format!(
                "{}: encrypted entries are not supported",
                entry.name
            )));
        }
        if entry.local_header_offset.saturating_add(LFH_LEN as u64) > self.file_len {
            return Err(ScanError::InvalidFormat(format!(
                "{}: local header out of bounds",
                entry.name
            )));
        }

        self.file.seek(SeekFrom::Start(entry.local_header_offset))?;
        let mut lfh = [0u8; LFH_LEN];
        self.file.read_exact(&mut lfh)?;
        if le_u32(&lfh[0..4]) != SIG_LFH {
            return Err(ScanError::InvalidFormat(format!(
                "{}: bad local header signature",
                entry.name
            )));
        }
        let name_len = le_u16(&lfh[26..28]) as u64;
        let extra_len = le_u16(&lfh[28..30]) as u64;

        let data_start = entry
            .local_header_offset
            .saturating_add(LFH_LEN as u64)
            .saturating_add(name_len)
            .saturating_add(extra_len);
        let data_end = data_start.saturating_add(entry.compressed_size);
        if data_start > self.file_len || data_end > self.file_len {
            return Err(ScanError::InvalidFormat(format!(
                "{}: payload out of bounds",
                entry.name
            )));
        }

        self.file.seek(SeekFrom::Start(data_start))?;
        let limited = (&mut self.file).take(entry.compressed_size);
        match entry.method {
            0 => Ok(Box::new(limited)),
            8 => Ok(Box::new(DeflateDecoder::new(limited))),
            m => Err(ScanError::InvalidFormat(format!(
                "{}: unsupported compression method {}",
                entry.name, m
            ))),
        }
    }
}

fn read_central_directory(
    file: &mut File,
    file_len: u64,
    cd_off: u64,
    cd_end: u64,
    entries_total: u16,
) -> Result<Vec<ZipEntry>> {
    let mut entries = Vec::with_capacity(entries_total as usize);
    let mut pos = cd_off;
    file.seek(SeekFrom::Start(pos))?;

    for _ in 0..entries_total {
        if pos.saturating_add(CDFH_LEN as u64) > cd_end {
            return Err(ScanError::InvalidFormat(
                "central directory truncated".to_string(),
            ));
        }
        let mut hdr = [0u8; CDFH_LEN];
        file.read_exact(&mut hdr)?;
        if le_u32(&hdr[0..4]) != SIG_CDFH {
            return Err(ScanError::InvalidFormat(
                "bad central directory signature".to_string(),
            ));
        }

        let flags = le_u16(&hdr[8..10]);
        let method = le_u16(&hdr[10..12]);
        let compressed_size = le_u32(&hdr[20..24]) as u64;
        let uncompressed_size = le_u32(&hdr[24..28]) as u64;
        let name_len = le_u16(&hdr[28..30]) as usize;
        let extra_len = le_u16(&hdr[30..32]) as usize;
        let comment_len = le_u16(&hdr[32..34]) as usize;
        let local_header_offset = le_u32(&hdr[42..46]) as u64;

        if compressed_size == u64::from(u32::MAX)
            || uncompressed_size == u64::from(u32::MAX)
            || local_header_offset == u64::from(u32::MAX)
        {
            return Err(ScanError::InvalidFormat(
                "zip64 entries are not supported".to_string(),
            ));
        }
        if name_len > MAX_NAME_LEN {
            return Err(ScanError::InvalidFormat(
                "entry name exceeds sane length".to_string(),
            ));
        }
        if local_header_offset > file_len {
            return Err(ScanError::InvalidFormat(
                "entry local header beyond file end".to_string(),
            ));
        }

        let mut name_buf = vec![0u8; name_len];
        file.read_exact(&mut name_buf)?;
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        // Skip extra and comment fields without storing them.
        let skip = (extra_len + comment_len) as i64;
        if skip > 0 {
            file.seek(SeekFrom::Current(skip))?;
        }
        pos = pos.saturating_add((CDFH_LEN + name_len + extra_len + comment_len) as u64);

        entries.push(ZipEntry {
            name,
            method,
            flags,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        });
    }
    Ok(entries)
}

/// Scan backwards for an EOCD record whose comment length fits the window.
fn find_eocd(win: &[u8]) -> Option<usize> {
    if win.len() < EOCD_MIN_LEN {
        return None;
    }
    let mut i = win.len() - EOCD_MIN_LEN;
    loop {
        if le_u32(&win[i..i + 4]) == SIG_EOCD {
            let comment_len = le_u16(&win[i + 20..i + 22]) as usize;
            if i + EOCD_MIN_LEN + comment_len <= win.len() {
                return Some(i);
            }
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
}

#[inline(always)]
fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

#[inline(always)]
fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
