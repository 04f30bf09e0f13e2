//! Page headers, subheader pointers and the column directory.
//!
//! Metadata pages (and the subheader area of mix pages) hold a list of subheader pointers.
//! Each pointer addresses a subheader inside the same page; the first integer of a
//! subheader is its signature. The column directory is assembled from:
//!
//! - row size: row length, row count, rows on the mix page
//! - column size: number of columns
//! - column text: blocks of text that other subheaders index into
//! - column name: (text block, offset, length) per column
//! - column attributes: (row offset, width, type) per column
//! - format and label: format name and label per column

use crate::error::{FrameError, FrameResult};

use super::header::{decode_text, ByteReader, Endianness, SasHeader};

const SIG_ROW_SIZE: u32 = 0xF7F7_F7F7;
const SIG_COLUMN_SIZE: u32 = 0xF6F6_F6F6;
const SIG_SUBHEADER_COUNTS: u32 = 0xFFFF_FC00;
const SIG_COLUMN_TEXT: u32 = 0xFFFF_FFFD;
const SIG_COLUMN_NAME: u32 = 0xFFFF_FFFF;
const SIG_COLUMN_ATTRIBUTES: u32 = 0xFFFF_FFFC;
const SIG_FORMAT_AND_LABEL: u32 = 0xFFFF_FBFE;
const SIG_COLUMN_LIST: u32 = 0xFFFF_FFFE;

const COMPRESSION_TRUNCATED: u8 = 1;
const COMPRESSION_COMPRESSED: u8 = 4;
const COMPRESSED_ROW_TYPE: u8 = 1;

const COMPRESSION_LITERALS: [&[u8]; 2] = [b"SASYZCRL", b"SASYZCR2"];

const PAGE_TYPE_MASK: u16 = 0xF700;

/// Page kinds, after masking the page type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PageKind {
    Meta,
    Data,
    Mix,
    Amd,
    Compressed,
}

impl PageKind {
    fn from_code(code: u16) -> Option<Self> {
        match code & PAGE_TYPE_MASK {
            0 | 16384 => Some(Self::Meta),
            256 => Some(Self::Data),
            512 => Some(Self::Mix),
            1024 => Some(Self::Amd),
            0x9000 => Some(Self::Compressed),
            _ => None,
        }
    }

    pub(super) fn has_subheaders(self) -> bool {
        matches!(self, Self::Meta | Self::Mix | Self::Amd)
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct PageHeader {
    pub(super) kind: PageKind,
    pub(super) block_count: usize,
    pub(super) subheader_count: usize,
}

pub(super) fn page_header(header: &SasHeader, page: &[u8], index: usize) -> FrameResult<PageHeader> {
    let r = ByteReader::new(page, header.endianness, "page");
    let base = header.page_bit_offset();
    let code = r.u16(base)?;
    let kind = PageKind::from_code(code).ok_or_else(|| {
        FrameError::format(format!("page {index}: unrecognized page type {code:#06x}"))
    })?;
    Ok(PageHeader {
        kind,
        block_count: r.short(base + 2)?,
        subheader_count: r.short(base + 4)?,
    })
}

#[derive(Debug, Clone, Copy)]
struct SubheaderPointer {
    offset: usize,
    length: usize,
    compression: u8,
    kind: u8,
}

fn subheader_pointers(
    header: &SasHeader,
    r: &ByteReader<'_>,
    ph: &PageHeader,
) -> FrameResult<Vec<SubheaderPointer>> {
    let int_len = header.int_len();
    let start = header.page_bit_offset() + 8;
    (0..ph.subheader_count)
        .map(|i| {
            let at = start + i * header.subheader_pointer_len();
            Ok(SubheaderPointer {
                offset: r.uint(at, int_len)?,
                length: r.uint(at + int_len, int_len)?,
                compression: r.u8(at + 2 * int_len)?,
                kind: r.u8(at + 2 * int_len + 1)?,
            })
        })
        .collect()
}

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasColumnKind {
    /// IEEE double, possibly truncated to fewer than 8 bytes.
    Numeric,
    /// Fixed-width, space padded text.
    Character,
}

/// One entry of the column directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasColumn {
    pub name: String,
    pub label: String,
    /// SAS format name, e.g. `DATE` or `DATETIME`; empty when none is set.
    pub format: String,
    pub kind: SasColumnKind,
    /// Byte offset of the value within a row.
    pub offset: usize,
    /// Byte width of the value within a row.
    pub width: usize,
}

/// Everything needed to slice rows out of data pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Metadata {
    pub(super) row_length: usize,
    pub(super) row_count: usize,
    pub(super) mix_page_row_count: usize,
    pub(super) columns: Vec<SasColumn>,
}

#[derive(Debug, Default)]
struct DirectoryBuilder {
    row_size: Option<(usize, usize, usize)>,
    declared_columns: Option<usize>,
    text_blocks: Vec<Vec<u8>>,
    names: Vec<String>,
    attributes: Vec<(usize, usize, SasColumnKind)>,
    formats: Vec<(String, String)>,
}

/// Scan every page carrying subheaders and assemble the column directory.
pub(super) fn read_metadata(header: &SasHeader, bytes: &[u8]) -> FrameResult<Metadata> {
    let mut dir = DirectoryBuilder::default();
    for index in 0..header.page_count {
        let page = header.page(bytes, index)?;
        let ph = page_header(header, page, index)?;
        if !ph.kind.has_subheaders() {
            continue;
        }
        let r = ByteReader::new(page, header.endianness, "page");
        for ptr in subheader_pointers(header, &r, &ph)? {
            if ptr.length == 0 || ptr.compression == COMPRESSION_TRUNCATED {
                continue;
            }
            if ptr.compression == COMPRESSION_COMPRESSED && ptr.kind == COMPRESSED_ROW_TYPE {
                return Err(FrameError::format(
                    "compressed (RLE/RDC) datasets are not supported",
                ));
            }
            // Every subheader must lie inside its page.
            r.bytes(ptr.offset, ptr.length)?;
            let sig = signature(header, &r, ptr.offset)?;
            dir.process(header, &r, sig, ptr.offset, ptr.length)?;
        }
    }
    dir.finish()
}

/// The signature is the low 32 bits of the first integer in file byte order.
fn signature(header: &SasHeader, r: &ByteReader<'_>, offset: usize) -> FrameResult<u32> {
    match (header.is_u64, header.endianness) {
        (true, Endianness::Big) => r.u32(offset + 4),
        _ => r.u32(offset),
    }
}

impl DirectoryBuilder {
    fn process(
        &mut self,
        header: &SasHeader,
        r: &ByteReader<'_>,
        signature: u32,
        offset: usize,
        length: usize,
    ) -> FrameResult<()> {
        let il = header.int_len();
        match signature {
            SIG_ROW_SIZE => {
                self.row_size = Some((
                    r.uint(offset + 5 * il, il)?,
                    r.uint(offset + 6 * il, il)?,
                    r.uint(offset + 15 * il, il)?,
                ));
                let p1 = r.uint(offset + 9 * il, il)?;
                let p2 = r.uint(offset + 10 * il, il)?;
                self.declared_columns = self.declared_columns.or(Some(p1 + p2));
            }
            SIG_COLUMN_SIZE => {
                self.declared_columns = Some(r.uint(offset + il, il)?);
            }
            SIG_COLUMN_TEXT => {
                let size = r.short(offset + il)?;
                let block = r.bytes(offset + il, size)?;
                if self.text_blocks.is_empty()
                    && COMPRESSION_LITERALS
                        .iter()
                        .any(|lit| block.windows(lit.len()).any(|w| w == *lit))
                {
                    return Err(FrameError::format(
                        "compressed (RLE/RDC) datasets are not supported",
                    ));
                }
                self.text_blocks.push(block.to_vec());
            }
            SIG_COLUMN_NAME => {
                let count = length.saturating_sub(2 * il + 12) / 8;
                for i in 0..count {
                    let at = offset + il + 8 * (i + 1);
                    let name = self.text(r.short(at)?, r.short(at + 2)?, r.short(at + 4)?)?;
                    self.names.push(name);
                }
            }
            SIG_COLUMN_ATTRIBUTES => {
                let entry = il + 8;
                let count = length.saturating_sub(2 * il + 12) / entry;
                for i in 0..count {
                    let data_offset = r.uint(offset + il + 8 + i * entry, il)?;
                    let width = r.u32(offset + 2 * il + 8 + i * entry)? as usize;
                    let kind = match r.u8(offset + 2 * il + 14 + i * entry)? {
                        1 => SasColumnKind::Numeric,
                        _ => SasColumnKind::Character,
                    };
                    self.attributes.push((data_offset, width, kind));
                }
            }
            SIG_FORMAT_AND_LABEL => {
                let base = offset + 3 * il;
                let format = self.text(r.short(base + 22)?, r.short(base + 24)?, r.short(base + 26)?)?;
                let label = self.text(r.short(base + 28)?, r.short(base + 30)?, r.short(base + 32)?)?;
                self.formats.push((format, label));
            }
            // Nothing needed to decode rows.
            SIG_SUBHEADER_COUNTS | SIG_COLUMN_LIST => {}
            _ => {}
        }
        Ok(())
    }

    /// Text referenced by (block index, offset, length). Zero length is the empty string.
    fn text(&self, block: usize, offset: usize, length: usize) -> FrameResult<String> {
        if length == 0 {
            return Ok(String::new());
        }
        let raw = self
            .text_blocks
            .get(block)
            .and_then(|b| b.get(offset..offset + length))
            .ok_or_else(|| {
                FrameError::format(format!(
                    "text reference ({block}, {offset}, {length}) is outside the column text"
                ))
            })?;
        Ok(decode_text(raw))
    }

    fn finish(self) -> FrameResult<Metadata> {
        let (row_length, row_count, mix_page_row_count) = self
            .row_size
            .ok_or_else(|| FrameError::format("missing row size subheader"))?;
        let declared = self.declared_columns.unwrap_or(self.attributes.len());
        if self.names.len() != declared || self.attributes.len() != declared {
            return Err(FrameError::format(format!(
                "incomplete column directory: {declared} columns declared, {} names, {} attributes",
                self.names.len(),
                self.attributes.len()
            )));
        }

        let mut formats = self.formats.into_iter();
        let columns = self
            .names
            .into_iter()
            .zip(self.attributes)
            .map(|(name, (offset, width, kind))| {
                let (format, label) = formats.next().unwrap_or_default();
                match offset.checked_add(width) {
                    Some(end) if end <= row_length => {}
                    end => {
                        let end = end.map_or_else(|| "overflow".to_string(), |e| e.to_string());
                        return Err(FrameError::format(format!(
                            "column '{name}' spans bytes {offset}..{end} of a {row_length}-byte row"
                        )));
                    }
                }
                if kind == SasColumnKind::Numeric && !(1..=8).contains(&width) {
                    return Err(FrameError::format(format!(
                        "numeric column '{name}' has invalid width {width}"
                    )));
                }
                Ok(SasColumn {
                    name,
                    label,
                    format,
                    kind,
                    offset,
                    width,
                })
            })
            .collect::<FrameResult<Vec<_>>>()?;

        Ok(Metadata {
            row_length,
            row_count,
            mix_page_row_count,
            columns,
        })
    }
}
