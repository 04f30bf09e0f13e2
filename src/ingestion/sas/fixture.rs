//! Test-only SAS7BDAT writer.
//!
//! Produces small uncompressed files with one metadata (or mix) page followed by data pages,
//! in either layout and byte order. Subheaders are packed at the end of the first page,
//! subheader pointers at its start, as SAS itself does.

use super::header::MAGIC;

const HEADER_LENGTH: usize = 1024;

#[derive(Debug, Clone)]
pub(crate) enum FixtureKind {
    Numeric { width: usize },
    Character { width: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureColumn {
    pub(crate) name: &'static str,
    pub(crate) label: &'static str,
    pub(crate) format: &'static str,
    pub(crate) kind: FixtureKind,
}

impl FixtureColumn {
    pub(crate) fn numeric(name: &'static str) -> Self {
        Self::numeric_width(name, 8)
    }

    pub(crate) fn numeric_width(name: &'static str, width: usize) -> Self {
        Self {
            name,
            label: "",
            format: "",
            kind: FixtureKind::Numeric { width },
        }
    }

    pub(crate) fn character(name: &'static str, width: usize) -> Self {
        Self {
            name,
            label: "",
            format: "",
            kind: FixtureKind::Character { width },
        }
    }

    pub(crate) fn with_format(mut self, format: &'static str) -> Self {
        self.format = format;
        self
    }

    pub(crate) fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    fn width(&self) -> usize {
        match self.kind {
            FixtureKind::Numeric { width } | FixtureKind::Character { width } => width,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum FixtureValue {
    Num(Option<f64>),
    Text(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct SasFixture {
    pub(crate) is_u64: bool,
    pub(crate) little_endian: bool,
    pub(crate) page_size: usize,
    pub(crate) dataset_name: &'static str,
    pub(crate) columns: Vec<FixtureColumn>,
    pub(crate) rows: Vec<Vec<FixtureValue>>,
    /// Rows stored after the subheader pointers of the first page (which is then a mix page).
    pub(crate) mix_rows: usize,
    pub(crate) rows_per_data_page: usize,
    /// Adds a compressed-row subheader pointer to the first page.
    pub(crate) compressed: bool,
}

impl Default for SasFixture {
    fn default() -> Self {
        Self {
            is_u64: false,
            little_endian: true,
            page_size: 4096,
            dataset_name: "FIXTURE",
            columns: Vec::new(),
            rows: Vec::new(),
            mix_rows: 0,
            rows_per_data_page: 3,
            compressed: false,
        }
    }
}

/// Little helper for writing fixed-width integers in the fixture's byte order.
struct Out<'a> {
    buf: &'a mut [u8],
    little: bool,
}

impl Out<'_> {
    fn put(&mut self, at: usize, bytes: &[u8]) {
        self.buf[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn u16(&mut self, at: usize, v: u16) {
        let b = if self.little { v.to_le_bytes() } else { v.to_be_bytes() };
        self.put(at, &b);
    }

    fn u32(&mut self, at: usize, v: u32) {
        let b = if self.little { v.to_le_bytes() } else { v.to_be_bytes() };
        self.put(at, &b);
    }

    fn u64(&mut self, at: usize, v: u64) {
        let b = if self.little { v.to_le_bytes() } else { v.to_be_bytes() };
        self.put(at, &b);
    }

    fn uint(&mut self, at: usize, width: usize, v: usize) {
        if width == 8 {
            self.u64(at, v as u64);
        } else {
            self.u32(at, v as u32);
        }
    }

    /// Signature as written by SAS: a 32-bit value, sign extended to 64 bits in the u64
    /// layout.
    fn signature(&mut self, at: usize, width: usize, sig: u32) {
        if width == 8 {
            let high: u32 = if sig >= 0xFFFF_0000 { 0xFFFF_FFFF } else { 0 };
            let v = (u64::from(high) << 32) | u64::from(sig);
            self.u64(at, v);
        } else {
            self.u32(at, sig);
        }
    }
}

impl SasFixture {
    fn int_len(&self) -> usize {
        if self.is_u64 { 8 } else { 4 }
    }

    fn bit_offset(&self) -> usize {
        if self.is_u64 { 32 } else { 16 }
    }

    fn pointer_len(&self) -> usize {
        if self.is_u64 { 24 } else { 12 }
    }

    fn row_length(&self) -> usize {
        self.columns.iter().map(FixtureColumn::width).sum()
    }

    fn data_pages(&self) -> usize {
        let rest = self.rows.len().saturating_sub(self.mix_rows);
        rest.div_ceil(self.rows_per_data_page.max(1))
    }

    pub(crate) fn page_count(&self) -> usize {
        1 + self.data_pages()
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut file = vec![0u8; HEADER_LENGTH + self.page_count() * self.page_size];
        self.write_header(&mut file[..HEADER_LENGTH]);

        let (first, rest) = file[HEADER_LENGTH..].split_at_mut(self.page_size);
        self.write_first_page(first);

        let mut next_row = self.mix_rows.min(self.rows.len());
        for page in rest.chunks_mut(self.page_size) {
            let rows = (self.rows.len() - next_row).min(self.rows_per_data_page);
            let mut out = Out {
                buf: page,
                little: self.little_endian,
            };
            out.u16(self.bit_offset(), 256);
            out.u16(self.bit_offset() + 2, rows as u16);
            out.u16(self.bit_offset() + 4, 0);
            let start = self.bit_offset() + 8;
            for r in 0..rows {
                let row = self.encode_row(&self.rows[next_row + r]);
                out.put(start + r * row.len(), &row);
            }
            next_row += rows;
        }
        file
    }

    fn write_header(&self, header: &mut [u8]) {
        let align = if self.is_u64 { 4 } else { 0 };
        let mut out = Out {
            buf: header,
            little: self.little_endian,
        };
        out.put(0, &MAGIC);
        out.put(32, if self.is_u64 { b"3" } else { b"2" });
        out.put(35, if self.is_u64 { b"3" } else { b"2" });
        out.put(37, &[u8::from(self.little_endian)]);
        out.put(70, &[20]);
        let mut name = [b' '; 64];
        name[..self.dataset_name.len()].copy_from_slice(self.dataset_name.as_bytes());
        out.put(92, &name);
        // 2020-01-01 00:00:00 in seconds since 1960.
        out.u64(164 + align, 1_893_456_000f64.to_bits());
        out.u32(196 + align, HEADER_LENGTH as u32);
        out.u32(200 + align, self.page_size as u32);
        out.uint(204 + align, self.int_len(), self.page_count());
    }

    /// Text block shared by names, formats and labels: each string with its
    /// (offset, length) inside the block.
    fn text_block(&self) -> (Vec<u8>, Vec<[(usize, usize); 3]>) {
        let mut block = vec![0u8; 8];
        let mut refs = Vec::new();
        for c in &self.columns {
            let mut entry = [(0, 0); 3];
            for (slot, text) in [c.name, c.format, c.label].into_iter().enumerate() {
                if !text.is_empty() {
                    entry[slot] = (block.len(), text.len());
                    block.extend_from_slice(text.as_bytes());
                    while block.len() % 4 != 0 {
                        block.push(b' ');
                    }
                }
            }
            refs.push(entry);
        }
        let size = block.len() as u16;
        let size_bytes = if self.little_endian {
            size.to_le_bytes()
        } else {
            size.to_be_bytes()
        };
        block[..2].copy_from_slice(&size_bytes);
        (block, refs)
    }

    fn subheaders(&self) -> Vec<Vec<u8>> {
        let il = self.int_len();
        let n = self.columns.len();
        let mut subs = Vec::new();

        // Row size.
        let mut s = vec![0u8; 16 * il + 8];
        let mut out = Out {
            buf: &mut s,
            little: self.little_endian,
        };
        out.signature(0, il, 0xF7F7_F7F7);
        out.uint(5 * il, il, self.row_length());
        out.uint(6 * il, il, self.rows.len());
        out.uint(9 * il, il, n);
        out.uint(10 * il, il, 0);
        out.uint(15 * il, il, self.mix_rows);
        subs.push(s);

        // Column size.
        let mut s = vec![0u8; 3 * il];
        let mut out = Out {
            buf: &mut s,
            little: self.little_endian,
        };
        out.signature(0, il, 0xF6F6_F6F6);
        out.uint(il, il, n);
        subs.push(s);

        // Column text.
        let (block, refs) = self.text_block();
        let mut s = vec![0u8; il + block.len()];
        let mut out = Out {
            buf: &mut s,
            little: self.little_endian,
        };
        out.signature(0, il, 0xFFFF_FFFD);
        out.put(il, &block);
        subs.push(s);

        // Column names.
        let mut s = vec![0u8; 8 * n + 2 * il + 12];
        let mut out = Out {
            buf: &mut s,
            little: self.little_endian,
        };
        out.signature(0, il, 0xFFFF_FFFF);
        for (i, r) in refs.iter().enumerate() {
            let at = il + 8 * (i + 1);
            out.u16(at, 0);
            out.u16(at + 2, r[0].0 as u16);
            out.u16(at + 4, r[0].1 as u16);
        }
        subs.push(s);

        // Column attributes.
        let entry = il + 8;
        let mut s = vec![0u8; n * entry + 2 * il + 12];
        let mut out = Out {
            buf: &mut s,
            little: self.little_endian,
        };
        out.signature(0, il, 0xFFFF_FFFC);
        let mut offset = 0;
        for (i, c) in self.columns.iter().enumerate() {
            out.uint(il + 8 + i * entry, il, offset);
            out.u32(2 * il + 8 + i * entry, c.width() as u32);
            let kind = match c.kind {
                FixtureKind::Numeric { .. } => 1,
                FixtureKind::Character { .. } => 2,
            };
            out.put(2 * il + 14 + i * entry, &[kind]);
            offset += c.width();
        }
        subs.push(s);

        // Format and label, one per column.
        for r in &refs {
            let mut s = vec![0u8; 3 * il + 40];
            let mut out = Out {
                buf: &mut s,
                little: self.little_endian,
            };
            out.signature(0, il, 0xFFFF_FBFE);
            let base = 3 * il;
            out.u16(base + 24, r[1].0 as u16);
            out.u16(base + 26, r[1].1 as u16);
            out.u16(base + 30, r[2].0 as u16);
            out.u16(base + 32, r[2].1 as u16);
            subs.push(s);
        }
        subs
    }

    fn write_first_page(&self, page: &mut [u8]) {
        let il = self.int_len();
        let subs = self.subheaders();
        let pointer_count = subs.len() + usize::from(self.compressed);

        let mut out = Out {
            buf: page,
            little: self.little_endian,
        };
        let page_type = if self.mix_rows > 0 { 512 } else { 0 };
        out.u16(self.bit_offset(), page_type);
        out.u16(self.bit_offset() + 2, (subs.len() + self.mix_rows) as u16);
        out.u16(self.bit_offset() + 4, pointer_count as u16);

        let mut end = self.page_size;
        let mut pointers = Vec::new();
        for s in &subs {
            end -= s.len();
            end -= end % 8;
            out.put(end, s);
            pointers.push((end, s.len(), 0u8, 0u8));
        }
        if self.compressed {
            end -= 16;
            pointers.push((end, 16, 4, 1));
        }

        let start = self.bit_offset() + 8;
        for (i, (offset, len, compression, kind)) in pointers.into_iter().enumerate() {
            let at = start + i * self.pointer_len();
            out.uint(at, il, offset);
            out.uint(at + il, il, len);
            out.put(at + 2 * il, &[compression, kind]);
        }

        if self.mix_rows > 0 {
            let pointers_end = start + pointer_count * self.pointer_len();
            let rows_start = pointers_end + pointers_end % 8;
            for (r, values) in self.rows.iter().take(self.mix_rows).enumerate() {
                let row = self.encode_row(values);
                let at = rows_start + r * row.len();
                assert!(at + row.len() <= end, "fixture page too small for mix rows");
                out.put(at, &row);
            }
        }
    }

    fn encode_row(&self, values: &[FixtureValue]) -> Vec<u8> {
        let mut row = Vec::with_capacity(self.row_length());
        for (c, v) in self.columns.iter().zip(values) {
            match (&c.kind, v) {
                (FixtureKind::Numeric { width }, FixtureValue::Num(x)) => {
                    // SAS missing values are NaNs with a payload.
                    let x = x.unwrap_or(f64::from_bits(0xFFFE_0000_0000_0000));
                    if self.little_endian {
                        row.extend_from_slice(&x.to_le_bytes()[8 - width..]);
                    } else {
                        row.extend_from_slice(&x.to_be_bytes()[..*width]);
                    }
                }
                (FixtureKind::Character { width }, FixtureValue::Text(s)) => {
                    let mut field = vec![b' '; *width];
                    field[..s.len()].copy_from_slice(s.as_bytes());
                    row.extend_from_slice(&field);
                }
                _ => panic!("fixture value does not match column '{}'", c.name),
            }
        }
        row
    }
}
