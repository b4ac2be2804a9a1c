//! On-disk layout
//!
//! Encode/decode for the file header block and grid records, plus the
//! file-name template expansion.

use bytes::{Buf, BufMut};

use crate::error::{GridError, Result};
use crate::keys::MAX_KEY_LEN;

/// Fixed size of the header block at the start of every grid file.
pub const FILE_HEADER_SIZE: usize = 1024;

/// Fixed size of the per-grid header. Only the first four bytes (write
/// timestamp) are meaningful; the rest is reserved padding.
pub const GRID_HEADER_SIZE: usize = 32;

/// Bytes of a grid consumed by framing: grid header + tag + key length
/// field + value length field.
pub const RECORD_OVERHEAD: usize = GRID_HEADER_SIZE + 1 + 2 + 2;

/// Total encoded length of a record with the given key and value sizes.
pub fn encoded_len(key_len: usize, value_len: usize) -> usize {
    RECORD_OVERHEAD + key_len + value_len
}

// =============================================================================
// File Header
// =============================================================================

/// Identity and geometry of a grid file, stored in its header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub file_type: u16,
    pub file_no: u16,
    pub grid_count: u32,
    pub grid_size: u32,
}

impl FileHeader {
    /// Encode into a full header block: fields little-endian, CRC32 of
    /// the 12 field bytes, zero padding to [`FILE_HEADER_SIZE`].
    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut block = [0u8; FILE_HEADER_SIZE];
        {
            let mut cursor = &mut block[..];
            cursor.put_u16_le(self.file_type);
            cursor.put_u16_le(self.file_no);
            cursor.put_u32_le(self.grid_count);
            cursor.put_u32_le(self.grid_size);
        }
        let crc = crc32fast::hash(&block[..12]);
        (&mut block[12..16]).put_u32_le(crc);
        block
    }

    /// Decode and checksum-validate a header block.
    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.len() < FILE_HEADER_SIZE {
            return Err(GridError::CorruptRecord(format!(
                "file header truncated: {} of {} bytes",
                block.len(),
                FILE_HEADER_SIZE
            )));
        }

        let expected = crc32fast::hash(&block[..12]);
        let stored = (&block[12..16]).get_u32_le();
        if stored != expected {
            return Err(GridError::CorruptRecord(format!(
                "file header checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored, expected
            )));
        }

        let mut cursor = &block[..12];
        Ok(Self {
            file_type: cursor.get_u16_le(),
            file_no: cursor.get_u16_le(),
            grid_count: cursor.get_u32_le(),
            grid_size: cursor.get_u32_le(),
        })
    }
}

// =============================================================================
// Grid Records
// =============================================================================

/// A record parsed out of a grid during the recovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    pub write_time: u32,
    pub tag: u8,
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Encode a record into `buf` (cleared first). The caller has already
/// checked that the total fits the destination grid.
pub fn encode_record(buf: &mut Vec<u8>, write_time: u32, tag: u8, key: &[u8], value: &[u8]) {
    buf.clear();
    buf.reserve(encoded_len(key.len(), value.len()));

    buf.put_u32_le(write_time);
    buf.put_bytes(0, GRID_HEADER_SIZE - 4);
    buf.put_u8(tag);
    buf.put_u16_le(key.len() as u16);
    buf.put_slice(key);
    buf.put_u16_le(value.len() as u16);
    buf.put_slice(value);
}

/// Strictly parse a grid's bytes, classifying empty and malformed grids
/// as `None`: zero tag, zero or oversized key length, zero value length,
/// or fields running past the grid all mean "nothing live here".
pub fn decode_record(bytes: &[u8]) -> Option<DecodedRecord<'_>> {
    if bytes.len() < RECORD_OVERHEAD {
        return None;
    }

    let write_time = (&bytes[..4]).get_u32_le();

    let tag = bytes[GRID_HEADER_SIZE];
    if tag == 0 {
        return None;
    }

    let mut pos = GRID_HEADER_SIZE + 1;
    let key_len = (&bytes[pos..pos + 2]).get_u16_le() as usize;
    pos += 2;
    if key_len == 0 || key_len > MAX_KEY_LEN || bytes.len() < pos + key_len + 2 {
        return None;
    }
    let key = &bytes[pos..pos + key_len];
    pos += key_len;

    let value_len = (&bytes[pos..pos + 2]).get_u16_le() as usize;
    pos += 2;
    if value_len == 0 || bytes.len() < pos + value_len {
        return None;
    }
    let value = &bytes[pos..pos + value_len];

    Some(DecodedRecord {
        write_time,
        tag,
        key,
        value,
    })
}

// =============================================================================
// File Names
// =============================================================================

/// Expand a file-name template, substituting `$(file_type)`, `$(file_no)`,
/// `$(grid_num)` and `$(grid_size)` verbatim.
pub fn expand_file_name(template: &str, header: &FileHeader) -> String {
    template
        .replace("$(file_type)", &header.file_type.to_string())
        .replace("$(file_no)", &header.file_no.to_string())
        .replace("$(grid_num)", &header.grid_count.to_string())
        .replace("$(grid_size)", &header.grid_size.to_string())
}
