//! Minimal DEX class-table parsing.
//!
//! Only the structure needed to enumerate class names and superclass
//! references is read: the header, the string and type id tables, and
//! the class definition table. Header checksum and signature fields are
//! not verified; structural bounds checks guard every read instead.

use crate::error::{Result, ScanError};

/// dex magic: `dex\n<3 ascii digits>\0`
pub(crate) const DEX_MAGIC: &[u8; 4] = b"dex\n";
const HEADER_LEN: usize = 0x70;
const ENDIAN_CONSTANT: u32 = 0x1234_5678;
const CLASS_DEF_LEN: usize = 32;

/// Sentinel for "no superclass" in a class definition.
pub const NO_INDEX: u32 = 0xffff_ffff;

/// Instruction-set dialect selected by the minimum platform version.
///
/// The dialect fixes the newest container version the enumerator will
/// accept; the class-table layout itself is identical across versions
/// for the fields read here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DexDialect {
    max_version: u32,
}

impl DexDialect {
    /// Dialect for a platform API level.
    pub fn for_api(api: u32) -> Self {
        let max_version = match api {
            0..=23 => 35,
            24..=25 => 37,
            26..=27 => 38,
            28..=33 => 39,
            34 => 40,
            _ => 41,
        };
        Self { max_version }
    }

    pub fn accepts(&self, version: u32) -> bool {
        (35..=self.max_version).contains(&version)
    }
}

impl Default for DexDialect {
    fn default() -> Self {
        Self { max_version: 41 }
    }
}

/// One class definition: internal descriptor plus its declared
/// superclass descriptor, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub descriptor: String,
    pub superclass: Option<String>,
}

/// A parsed DEX container backed by its decoded bytes.
#[derive(Debug)]
pub struct DexFile {
    data: Vec<u8>,
    version: u32,
    string_ids_off: usize,
    string_ids_size: u32,
    type_ids_off: usize,
    type_ids_size: u32,
    class_defs_off: usize,
    class_defs_size: u32,
}

impl DexFile {
    /// Parse header and table locations from decoded container bytes.
    pub fn parse(data: Vec<u8>, dialect: DexDialect) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ScanError::InvalidFormat(
                "dex container smaller than header".to_string(),
            ));
        }
        if &data[0..4] != DEX_MAGIC || data[7] != 0 {
            return Err(ScanError::InvalidFormat("bad dex magic".to_string()));
        }
        let version = std::str::from_utf8(&data[4..7])
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| ScanError::InvalidFormat("bad dex version digits".to_string()))?;
        if !dialect.accepts(version) {
            return Err(ScanError::InvalidFormat(format!(
                "dex version {:03} not accepted by selected dialect",
                version
            )));
        }
        if le_u32(&data, 40) != ENDIAN_CONSTANT {
            return Err(ScanError::InvalidFormat(
                "unsupported dex endianness".to_string(),
            ));
        }

        let string_ids_size = le_u32(&data, 56);
        let string_ids_off = le_u32(&data, 60) as usize;
        let type_ids_size = le_u32(&data, 64);
        let type_ids_off = le_u32(&data, 68) as usize;
        let class_defs_size = le_u32(&data, 96);
        let class_defs_off = le_u32(&data, 100) as usize;

        let check_table = |off: usize, count: u32, width: usize, what: &str| -> Result<()> {
            let end = (count as usize)
                .checked_mul(width)
                .and_then(|len| off.checked_add(len));
            match end {
                Some(end) if end <= data.len() => Ok(()),
                _ => Err(ScanError::InvalidFormat(format!(
                    "{} table out of bounds",
                    what
                ))),
            }
        };
        check_table(string_ids_off, string_ids_size, 4, "string id")?;
        check_table(type_ids_off, type_ids_size, 4, "type id")?;
        check_table(class_defs_off, class_defs_size, CLASS_DEF_LEN, "class def")?;

        Ok(Self {
            data,
            version,
            string_ids_off,
            string_ids_size,
            type_ids_off,
            type_ids_size,
            class_defs_off,
            class_defs_size,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Size in bytes of the decoded container.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn class_count(&self) -> u32 {
        self.class_defs_size
    }

    /// Read the class definition at table index `i`.
    pub fn class_def(&self, i: u32) -> Result<ClassDef> {
        if i >= self.class_defs_size {
            return Err(ScanError::InvalidFormat(format!(
                "class def index {} out of range",
                i
            )));
        }
        let off = self.class_defs_off + (i as usize) * CLASS_DEF_LEN;
        let class_idx = le_u32(&self.data, off);
        let superclass_idx = le_u32(&self.data, off + 8);

        let descriptor = self.type_descriptor(class_idx)?;
        let superclass = if superclass_idx == NO_INDEX {
            None
        } else {
            Some(self.type_descriptor(superclass_idx)?)
        };
        Ok(ClassDef {
            descriptor,
            superclass,
        })
    }

    /// Iterate all class definitions in table order.
    pub fn classes(&self) -> impl Iterator<Item = Result<ClassDef>> + '_ {
        (0..self.class_defs_size).map(move |i| self.class_def(i))
    }

    fn type_descriptor(&self, type_idx: u32) -> Result<String> {
        if type_idx >= self.type_ids_size {
            return Err(ScanError::InvalidFormat(format!(
                "type index {} out of range",
                type_idx
            )));
        }
        let string_idx = le_u32(&self.data, self.type_ids_off + (type_idx as usize) * 4);
        self.string_at(string_idx)
    }

    fn string_at(&self, string_idx: u32) -> Result<String> {
        if string_idx >= self.string_ids_size {
            return Err(ScanError::InvalidFormat(format!(
                "string index {} out of range",
                string_idx
            )));
        }
        let data_off =
            le_u32(&self.data, self.string_ids_off + (string_idx as usize) * 4) as usize;
        if data_off >= self.data.len() {
            return Err(ScanError::InvalidFormat(
                "string data offset out of bounds".to_string(),
            ));
        }
        let (_, rest) = read_uleb128(&self.data[data_off..]).ok_or_else(|| {
            ScanError::InvalidFormat("truncated string length".to_string())
        })?;
        let nul = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            ScanError::InvalidFormat("unterminated string data".to_string())
        })?;
        Ok(decode_mutf8(&rest[..nul]))
    }
}

#[inline(always)]
fn le_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// Decode one unsigned LEB128 value; returns the value and the rest.
pub(crate) fn read_uleb128(data: &[u8]) -> Option<(u32, &[u8])> {
    let mut value: u32 = 0;
    for (i, &b) in data.iter().take(5).enumerate() {
        value |= u32::from(b & 0x7f) << (7 * i);
        if b & 0x80 == 0 {
            return Some((value, &data[i + 1..]));
        }
    }
    None
}

/// Decode modified UTF-8 (MUTF-8): `C0 80` encodes NUL, supplementary
/// characters arrive as CESU-8 surrogate pairs. Invalid sequences are
/// replaced rather than rejected; descriptors are ASCII in practice.
pub(crate) fn decode_mutf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            out.push(b as char);
            i += 1;
        } else if b & 0xe0 == 0xc0 && i + 1 < bytes.len() {
            let code = (u32::from(b & 0x1f) << 6) | u32::from(bytes[i + 1] & 0x3f);
            out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            i += 2;
        } else if b & 0xf0 == 0xe0 && i + 2 < bytes.len() {
            let unit = (u32::from(b & 0x0f) << 12)
                | (u32::from(bytes[i + 1] & 0x3f) << 6)
                | u32::from(bytes[i + 2] & 0x3f);
            // High surrogate: try to combine with the following CESU-8 unit.
            if (0xd800..0xdc00).contains(&unit) && i + 5 < bytes.len() && bytes[i + 3] & 0xf0 == 0xe0
            {
                let low = (u32::from(bytes[i + 3] & 0x0f) << 12)
                    | (u32::from(bytes[i + 4] & 0x3f) << 6)
                    | u32::from(bytes[i + 5] & 0x3f);
                if (0xdc00..0xe000).contains(&low) {
                    let code = 0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00);
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                    i += 6;
                    continue;
                }
            }
            out.push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
            i += 3;
        } else {
            out.push(char::REPLACEMENT_CHARACTER);
            i += 1;
        }
    }
    out
}
