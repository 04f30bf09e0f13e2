//! Header page parsing and bounds-checked byte access.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::{FrameError, FrameResult};

/// First 32 bytes of every SAS7BDAT file.
pub(super) const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc2, 0xea, 0x81,
    0x60, 0xb3, 0x14, 0x11, 0xcf, 0xbd, 0x92, 0x08, 0x00, 0x09, 0xc7, 0x31, 0x8c, 0x18, 0x1f,
    0x10, 0x11,
];

const U64_FLAG_OFFSET: usize = 32;
const ALIGN_FLAG_OFFSET: usize = 35;
const ENDIANNESS_OFFSET: usize = 37;
const ENCODING_OFFSET: usize = 70;
const DATASET_NAME_OFFSET: usize = 92;
const DATASET_NAME_LEN: usize = 64;
const DATE_CREATED_OFFSET: usize = 164;
const HEADER_LENGTH_OFFSET: usize = 196;
const PAGE_SIZE_OFFSET: usize = 200;
const PAGE_COUNT_OFFSET: usize = 204;

/// Byte order of every multi-byte field in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Bounds-checked reads of fixed-width fields in file byte order.
#[derive(Debug, Clone, Copy)]
pub(super) struct ByteReader<'a> {
    buf: &'a [u8],
    endian: Endianness,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    pub(super) fn new(buf: &'a [u8], endian: Endianness, what: &'static str) -> Self {
        Self { buf, endian, what }
    }

    pub(super) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(super) fn bytes(&self, offset: usize, len: usize) -> FrameResult<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.buf.get(offset..end))
            .ok_or_else(|| {
                FrameError::format(format!(
                    "truncated {}: need bytes {offset}..{} of {}",
                    self.what,
                    offset.saturating_add(len),
                    self.buf.len()
                ))
            })
    }

    fn array<const N: usize>(&self, offset: usize) -> FrameResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub(super) fn u8(&self, offset: usize) -> FrameResult<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub(super) fn u16(&self, offset: usize) -> FrameResult<u16> {
        let b = self.array::<2>(offset)?;
        Ok(match self.endian {
            Endianness::Little => u16::from_le_bytes(b),
            Endianness::Big => u16::from_be_bytes(b),
        })
    }

    pub(super) fn u32(&self, offset: usize) -> FrameResult<u32> {
        let b = self.array::<4>(offset)?;
        Ok(match self.endian {
            Endianness::Little => u32::from_le_bytes(b),
            Endianness::Big => u32::from_be_bytes(b),
        })
    }

    pub(super) fn u64(&self, offset: usize) -> FrameResult<u64> {
        let b = self.array::<8>(offset)?;
        Ok(match self.endian {
            Endianness::Little => u64::from_le_bytes(b),
            Endianness::Big => u64::from_be_bytes(b),
        })
    }

    pub(super) fn f64(&self, offset: usize) -> FrameResult<f64> {
        Ok(f64::from_bits(self.u64(offset)?))
    }

    /// Unsigned integer of `width` bytes (4 or 8, the file's integer length).
    pub(super) fn uint(&self, offset: usize, width: usize) -> FrameResult<usize> {
        let v = match width {
            4 => u64::from(self.u32(offset)?),
            _ => self.u64(offset)?,
        };
        usize::try_from(v).map_err(|_| {
            FrameError::format(format!("{} field at {offset} does not fit in usize", self.what))
        })
    }

    /// `u16` field widened to `usize`.
    pub(super) fn short(&self, offset: usize) -> FrameResult<usize> {
        Ok(usize::from(self.u16(offset)?))
    }
}

/// Fields of the header page.
#[derive(Debug, Clone, PartialEq)]
pub struct SasHeader {
    /// 64-bit layout (8-byte integers, 24-byte subheader pointers).
    pub is_u64: bool,
    pub endianness: Endianness,
    /// Character encoding declared in the header, when recognized.
    pub encoding: Option<&'static str>,
    pub dataset_name: String,
    pub created: Option<NaiveDateTime>,
    pub header_length: usize,
    pub page_size: usize,
    pub page_count: usize,
}

impl SasHeader {
    /// Parse and validate the header, including that the file holds exactly `page_count`
    /// pages after the header.
    pub(super) fn parse(bytes: &[u8]) -> FrameResult<Self> {
        if bytes.get(..MAGIC.len()) != Some(&MAGIC[..]) {
            return Err(FrameError::format("not a SAS7BDAT file: bad magic number"));
        }
        let flag = |offset: usize| -> FrameResult<u8> {
            bytes
                .get(offset)
                .copied()
                .ok_or_else(|| FrameError::format("truncated header"))
        };
        let is_u64 = flag(U64_FLAG_OFFSET)? == b'3';
        let align = if flag(ALIGN_FLAG_OFFSET)? == b'3' { 4 } else { 0 };
        let endianness = if flag(ENDIANNESS_OFFSET)? == 0x01 {
            Endianness::Little
        } else {
            Endianness::Big
        };
        let int_len = if is_u64 { 8 } else { 4 };

        let r = ByteReader::new(bytes, endianness, "header");
        let encoding = encoding_name(r.u8(ENCODING_OFFSET)?);
        let dataset_name = decode_text(r.bytes(DATASET_NAME_OFFSET, DATASET_NAME_LEN)?);
        let created = seconds_since_1960(r.f64(DATE_CREATED_OFFSET + align)?);
        let header_length = r.u32(HEADER_LENGTH_OFFSET + align)? as usize;
        let page_size = r.u32(PAGE_SIZE_OFFSET + align)? as usize;
        let page_count = r.uint(PAGE_COUNT_OFFSET + align, int_len)?;

        if page_size == 0 {
            return Err(FrameError::format("header declares a page size of 0"));
        }
        if header_length < PAGE_COUNT_OFFSET + align + int_len {
            return Err(FrameError::format(format!(
                "header length {header_length} is smaller than the header fields"
            )));
        }
        let expected = page_count
            .checked_mul(page_size)
            .and_then(|n| n.checked_add(header_length))
            .ok_or_else(|| FrameError::format("page count overflows the addressable size"))?;
        if bytes.len() != expected {
            let present = bytes.len().saturating_sub(header_length) / page_size;
            let what = if bytes.len() < expected {
                "truncated file"
            } else {
                "page count mismatch"
            };
            return Err(FrameError::format(format!(
                "{what}: header declares {page_count} pages of {page_size} bytes, \
                 file holds {present} complete pages ({} bytes)",
                bytes.len()
            )));
        }

        Ok(Self {
            is_u64,
            endianness,
            encoding,
            dataset_name,
            created,
            header_length,
            page_size,
            page_count,
        })
    }

    /// Width of integer fields (4 or 8 bytes).
    pub(super) fn int_len(&self) -> usize {
        if self.is_u64 { 8 } else { 4 }
    }

    /// Offset of the page header fields within each page.
    pub(super) fn page_bit_offset(&self) -> usize {
        if self.is_u64 { 32 } else { 16 }
    }

    pub(super) fn subheader_pointer_len(&self) -> usize {
        if self.is_u64 { 24 } else { 12 }
    }

    /// Bytes of page `index`. `parse` already checked the file length.
    pub(super) fn page<'a>(&self, bytes: &'a [u8], index: usize) -> FrameResult<&'a [u8]> {
        let start = self.header_length + index * self.page_size;
        bytes
            .get(start..start + self.page_size)
            .ok_or_else(|| FrameError::format(format!("page {index} is out of bounds")))
    }
}

fn encoding_name(code: u8) -> Option<&'static str> {
    match code {
        20 => Some("utf-8"),
        28 => Some("us-ascii"),
        29 => Some("latin1"),
        30 => Some("latin2"),
        40 => Some("latin9"),
        61 => Some("wlatin2"),
        62 => Some("wlatin1"),
        _ => None,
    }
}

/// Decode fixed-width text: trailing NULs and spaces are padding; UTF-8 with a Latin-1
/// fallback.
pub(super) fn decode_text(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |i| i + 1);
    let raw = &raw[..end];
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}

fn sas_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1960, 1, 1)?.and_hms_opt(0, 0, 0)
}

/// SAS datetime values count seconds since 1960-01-01.
pub(super) fn seconds_since_1960(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1_000_000.0).round();
    if micros.abs() > i64::MAX as f64 {
        return None;
    }
    sas_epoch()?.checked_add_signed(Duration::microseconds(micros as i64))
}

/// SAS date values count days since 1960-01-01.
pub(super) fn days_since_1960(days: f64) -> Option<NaiveDateTime> {
    seconds_since_1960(days * 86_400.0)
}
