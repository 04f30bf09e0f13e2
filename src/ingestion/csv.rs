//! Parallel, quote-aware CSV reader and CSV writer.
//!
//! Reading works on the whole input held in memory:
//!
//! 1. The header record (which may itself contain quoted newlines) gives the column names.
//! 2. Inputs larger than [`CsvReadOptions::parallel_threshold`] are split into chunks whose
//!    boundaries never fall inside a quoted field (see [`chunk_boundaries`]).
//! 3. Chunks are tokenized and type-inferred concurrently, each into its own result slot.
//! 4. Per-column types are reconciled across chunks with [`DataType::widen`], the raw tokens
//!    are re-typed to the reconciled type, and chunk columns are concatenated in chunk order.
//!
//! Small inputs take the same path with a single chunk, so results never depend on size.
//! Reading is strict: an unterminated quote or a row with the wrong number of fields fails
//! the whole read with [`FrameError::Parse`] naming the data row.

use std::ops::Range;
use std::path::Path;

use crate::column::{infer_type, Column};
use crate::error::{FrameError, FrameResult};
use crate::execution::{available_parallelism, ChunkOutput, ExecutionEngine, ExecutionOptions};
use crate::frame::DataFrame;
use crate::types::{DataType, Field, Schema, Value, DATETIME_DISPLAY_FORMAT};

use super::codec::FormatCodec;
use super::unified::FileFormat;

/// Inputs above this many bytes are parsed in parallel chunks by default (1 MiB).
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 20;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Options controlling CSV reading.
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    /// Field delimiter.
    pub delimiter: u8,
    /// Inputs whose body is larger than this many bytes are split into parallel chunks.
    pub parallel_threshold: usize,
    /// Number of chunks for parallel parsing. If `None`, uses the available parallelism.
    pub num_chunks: Option<usize>,
    /// Thread pool settings for parallel parsing.
    pub execution: ExecutionOptions,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            num_chunks: None,
            execution: ExecutionOptions::default(),
        }
    }
}

impl CsvReadOptions {
    /// Tab-separated defaults.
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

/// [`FormatCodec`] for delimited text; reading and writing share the delimiter.
#[derive(Debug, Clone, Default)]
pub struct CsvCodec {
    pub options: CsvReadOptions,
}

impl FormatCodec for CsvCodec {
    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn decode(&self, bytes: &[u8]) -> FrameResult<(Schema, Vec<Column>)> {
        decode_csv(bytes, &self.options)
    }

    fn encode(&self, schema: &Schema, columns: &[Column]) -> FrameResult<Vec<u8>> {
        encode_csv(schema, columns, self.options.delimiter)
    }
}

/// Read a CSV file into a [`DataFrame`].
///
/// The file is read fully into memory before parsing; a missing or unreadable path fails with
/// an I/O error before any parsing starts.
pub fn read_csv_from_path(path: impl AsRef<Path>, options: &CsvReadOptions) -> FrameResult<DataFrame> {
    let bytes = std::fs::read(path)?;
    read_csv_from_bytes(&bytes, options)
}

/// Parse in-memory CSV bytes into a [`DataFrame`].
pub fn read_csv_from_bytes(input: &[u8], options: &CsvReadOptions) -> FrameResult<DataFrame> {
    let (schema, columns) = decode_csv(input, options)?;
    DataFrame::new(schema, columns)
}

pub(crate) fn decode_csv(input: &[u8], options: &CsvReadOptions) -> FrameResult<(Schema, Vec<Column>)> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    if input.iter().all(u8::is_ascii_whitespace) {
        return Err(FrameError::Parse {
            row: None,
            message: "input is empty (missing header line)".to_string(),
        });
    }

    let mut cursor = QuoteCursor::default();
    let header_end = cursor.next_record_end(input, 0).unwrap_or(input.len());
    if cursor.in_quotes && header_end == input.len() {
        return Err(FrameError::Parse {
            row: None,
            message: "unterminated quoted field in header".to_string(),
        });
    }
    let headers = parse_header(&input[..header_end], options.delimiter)?;
    let body = input.get(header_end + 1..).unwrap_or(&[]);

    let ranges = if body.len() > options.parallel_threshold {
        let n = options.num_chunks.unwrap_or_else(available_parallelism);
        chunk_boundaries(body, n)
    } else if body.is_empty() {
        Vec::new()
    } else {
        vec![0..body.len()]
    };

    let ncols = headers.len();
    let delimiter = options.delimiter;
    let engine = if ranges.len() > 1 {
        Some(ExecutionEngine::new(options.execution.clone())?)
    } else {
        None
    };

    let parsed: Vec<Result<TokenChunk, ChunkError>> = match &engine {
        Some(engine) => engine.run_chunks(ranges.len(), |i| {
            tokenize_chunk(&body[ranges[i].clone()], ncols, delimiter)
        }),
        None => ranges
            .iter()
            .map(|r| tokenize_chunk(&body[r.clone()], ncols, delimiter))
            .collect(),
    };

    let chunks = collect_in_order(parsed)?;

    // Widen each column's type across chunks, then re-type every chunk's raw tokens.
    let types: Vec<DataType> = (0..ncols)
        .map(|c| {
            chunks
                .iter()
                .fold(DataType::Null, |acc, chunk| acc.widen(chunk.types[c]))
        })
        .collect();

    let typed: Vec<FrameResult<TypedChunk>> = match &engine {
        Some(engine) => engine.run_chunks(chunks.len(), |i| retype_chunk(&chunks[i], &types)),
        None => chunks.iter().map(|chunk| retype_chunk(chunk, &types)).collect(),
    };

    let mut columns: Vec<Column> = types.iter().map(|t| Column::empty(*t)).collect();
    for chunk in typed {
        for (column, part) in columns.iter_mut().zip(chunk?.columns) {
            column.append(part)?;
        }
    }

    let schema = Schema::new(
        headers
            .into_iter()
            .zip(&types)
            .map(|(name, t)| Field::new(name, *t))
            .collect(),
    );
    Ok((schema, columns))
}

/// Tracks whether a byte scan is inside a quoted field.
///
/// Every `"` flips the state; an escaped quote (`""`) flips it twice, so the state at any
/// offset equals the parity of the quotes before it.
#[derive(Debug, Default)]
struct QuoteCursor {
    pos: usize,
    in_quotes: bool,
}

impl QuoteCursor {
    /// Offset of the next newline at or after `from` that is outside any quoted field.
    ///
    /// The cursor only moves forward; calls must use non-decreasing `from` values.
    fn next_record_end(&mut self, data: &[u8], from: usize) -> Option<usize> {
        while self.pos < data.len() {
            let b = data[self.pos];
            self.pos += 1;
            match b {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes && self.pos > from => return Some(self.pos - 1),
                _ => {}
            }
        }
        None
    }
}

/// Split `data` into at most `num_chunks` contiguous ranges covering all of it.
///
/// Candidate split points are spaced evenly; each is moved forward to the first newline that
/// is not inside a quoted field, and the range ends just after that newline. The number of
/// `"` bytes before every boundary is therefore even, so no record (including records with
/// quoted embedded newlines) is split across chunks.
pub fn chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<Range<usize>> {
    if data.is_empty() {
        return Vec::new();
    }
    let num_chunks = num_chunks.max(1);
    let stride = (data.len() / num_chunks).max(1);

    let mut ranges = Vec::with_capacity(num_chunks);
    let mut cursor = QuoteCursor::default();
    let mut start = 0usize;
    for i in 1..num_chunks {
        let candidate = i * stride;
        if candidate < start {
            continue;
        }
        let Some(newline) = cursor.next_record_end(data, candidate) else {
            break;
        };
        let end = newline + 1;
        if end >= data.len() {
            break;
        }
        ranges.push(start..end);
        start = end;
    }
    ranges.push(start..data.len());
    ranges
}

fn parse_header(line: &[u8], delimiter: u8) -> FrameResult<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_reader(line);
    let record = match rdr.records().next() {
        Some(r) => r.map_err(|e| FrameError::Parse {
            row: None,
            message: format!("invalid header: {e}"),
        })?,
        None => {
            return Err(FrameError::Parse {
                row: None,
                message: "missing header line".to_string(),
            });
        }
    };
    let headers: Vec<String> = record.iter().map(|h| h.trim().to_owned()).collect();
    if let Some(dup) = headers
        .iter()
        .enumerate()
        .find_map(|(i, h)| headers[..i].contains(h).then_some(h))
    {
        return Err(FrameError::schema(format!("duplicate column name '{dup}' in header")));
    }
    Ok(headers)
}

/// Raw tokens of one chunk, column-major, plus each column's type inferred from this chunk.
#[derive(Debug)]
struct TokenChunk {
    tokens: Vec<Vec<Option<String>>>,
    types: Vec<DataType>,
    rows: usize,
}

impl ChunkOutput for TokenChunk {
    fn output_rows(&self) -> usize {
        self.rows
    }
}

#[derive(Debug)]
struct TypedChunk {
    columns: Vec<Column>,
    rows: usize,
}

impl ChunkOutput for TypedChunk {
    fn output_rows(&self) -> usize {
        self.rows
    }
}

/// Chunk-local failure; `row` is relative to the chunk start.
#[derive(Debug)]
struct ChunkError {
    row: Option<usize>,
    message: String,
}

/// Tokenize one chunk record by record.
///
/// Records are delimited with the same [`QuoteCursor`] that placed the chunk boundaries. An
/// empty line is a null row in a single-column file and a field-count error otherwise; a quote
/// that is never closed is reported at the record where it opened.
fn tokenize_chunk(chunk: &[u8], ncols: usize, delimiter: u8) -> Result<TokenChunk, ChunkError> {
    let mut tokens: Vec<Vec<Option<String>>> = vec![Vec::new(); ncols];
    let mut rows = 0usize;
    let mut cursor = QuoteCursor::default();
    let mut start = 0usize;

    while start < chunk.len() {
        let end = match cursor.next_record_end(chunk, start) {
            Some(end) => end,
            None if cursor.in_quotes => {
                return Err(ChunkError {
                    row: Some(rows),
                    message: "unterminated quoted field".to_string(),
                });
            }
            None => chunk.len(),
        };
        let line = &chunk[start..end];
        start = end + 1;

        if line.is_empty() || line == b"\r" {
            if ncols != 1 {
                return Err(ChunkError {
                    row: Some(rows),
                    message: format!("expected {ncols} fields, found an empty line"),
                });
            }
            tokens[0].push(None);
            rows += 1;
            continue;
        }
        push_records(line, ncols, delimiter, &mut tokens, &mut rows)?;
    }

    let types = tokens.iter().map(|t| infer_type(t)).collect();
    Ok(TokenChunk {
        tokens,
        types,
        rows,
    })
}

/// Parse the records of one line into `tokens`. A line normally holds one record; a stray
/// quote inside an unquoted field can make it hold several.
fn push_records(
    line: &[u8],
    ncols: usize,
    delimiter: u8,
    tokens: &mut [Vec<Option<String>>],
    rows: &mut usize,
) -> Result<(), ChunkError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .buffer_capacity(line.len() + 1)
        .from_reader(line);
    for result in rdr.records() {
        let record = result.map_err(|e| ChunkError {
            row: Some(*rows),
            message: e.to_string(),
        })?;
        if record.len() != ncols {
            return Err(ChunkError {
                row: Some(*rows),
                message: format!("expected {ncols} fields, found {}", record.len()),
            });
        }
        for (col, field) in tokens.iter_mut().zip(record.iter()) {
            col.push((!field.is_empty()).then(|| field.to_owned()));
        }
        *rows += 1;
    }
    Ok(())
}

/// Unwrap chunk results in chunk order, turning the first chunk-local error into a global
/// parse error (row offset by the rows of all preceding chunks).
fn collect_in_order(parsed: Vec<Result<TokenChunk, ChunkError>>) -> FrameResult<Vec<TokenChunk>> {
    let mut rows_before = 0usize;
    let mut chunks = Vec::with_capacity(parsed.len());
    for result in parsed {
        match result {
            Ok(chunk) => {
                rows_before += chunk.rows;
                chunks.push(chunk);
            }
            Err(err) => {
                return Err(FrameError::Parse {
                    row: err.row.map(|r| rows_before + r),
                    message: err.message,
                });
            }
        }
    }
    Ok(chunks)
}

fn retype_chunk(chunk: &TokenChunk, types: &[DataType]) -> FrameResult<TypedChunk> {
    let columns = chunk
        .tokens
        .iter()
        .zip(types)
        .map(|(tokens, t)| Column::parse_tokens(*t, tokens))
        .collect::<FrameResult<Vec<_>>>()?;
    Ok(TypedChunk {
        columns,
        rows: chunk.rows,
    })
}

/// Serialize a DataFrame as CSV (header + one record per row).
///
/// Nulls are written as empty fields; floats always carry a decimal point or exponent so
/// they read back as floats.
pub fn write_csv_to_bytes(df: &DataFrame, delimiter: u8) -> FrameResult<Vec<u8>> {
    encode_csv(df.schema(), df.columns(), delimiter)
}

fn encode_csv(schema: &Schema, columns: &[Column], delimiter: u8) -> FrameResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    wtr.write_record(schema.field_names())?;
    let rows = columns.first().map_or(0, Column::len);
    for r in 0..rows {
        wtr.write_record(columns.iter().map(|c| csv_field(&c.value(r))))?;
    }
    wtr.into_inner().map_err(|e| FrameError::Io(e.into_error()))
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Float64(v) => format!("{v:?}"),
        Value::DateTime(d) => d.format(DATETIME_DISPLAY_FORMAT).to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{chunk_boundaries, read_csv_from_bytes, write_csv_to_bytes, CsvReadOptions};
    use crate::column::Column;
    use crate::error::ErrorKind;
    use crate::execution::ExecutionOptions;
    use crate::types::{DataType, Value};

    fn forced_chunks(n: usize) -> CsvReadOptions {
        CsvReadOptions {
            parallel_threshold: 0,
            num_chunks: Some(n),
            execution: ExecutionOptions {
                num_threads: Some(4),
                max_in_flight_chunks: 4,
                observer: None,
            },
            ..CsvReadOptions::default()
        }
    }

    fn quote_count(bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| b == b'"').count()
    }

    #[test]
    fn boundaries_cover_input_and_end_after_newlines() {
        let data = b"1,a\n2,b\n3,c\n4,d\n5,e\n6,f\n";
        let ranges = chunk_boundaries(data, 3);
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, data.len());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert_eq!(data[pair[0].end - 1], b'\n');
        }
        assert!(ranges.len() > 1);
    }

    #[test]
    fn boundaries_never_split_quoted_newlines() {
        let mut data = Vec::new();
        for i in 0..200 {
            data.extend_from_slice(format!("{i},\"line one\nline \"\"two\"\"\n,end\"\n").as_bytes());
        }
        for n in [2, 3, 7, 16, 64] {
            let ranges = chunk_boundaries(&data, n);
            for r in &ranges {
                assert_eq!(quote_count(&data[..r.start]) % 2, 0, "n={n} boundary={}", r.start);
            }
        }
    }

    #[test]
    fn boundaries_collapse_when_no_safe_newline_exists() {
        let data = b"\"one long quoted\nfield\nwith newlines\"";
        let ranges = chunk_boundaries(data, 4);
        assert_eq!(ranges, vec![0..data.len()]);
    }

    #[test]
    fn reads_and_infers_types() {
        let input = b"id,value,name\n1,10.5,Alice\n2,20.0,Bob\n3,100.1,Charlie\n4,50.5,David\n";
        let df = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap();
        assert_eq!(df.shape(), (4, 3));
        assert_eq!(df.data_type("id").unwrap(), DataType::Int64);
        assert_eq!(df.data_type("value").unwrap(), DataType::Float64);
        assert_eq!(df.data_type("name").unwrap(), DataType::Utf8);
        assert_eq!(df.value(2, "name").unwrap(), Value::Utf8("Charlie".into()));
    }

    #[test]
    fn quoted_fields_keep_commas_newlines_and_escaped_quotes() {
        let input = b"name,note\n\"Alice\",\"a, b\nc\"\nBob,\"say \"\"hi\"\"\"\n";
        let df = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap();
        assert_eq!(df.row_count(), 2);
        assert_eq!(df.value(0, "note").unwrap(), Value::Utf8("a, b\nc".into()));
        assert_eq!(df.value(1, "note").unwrap(), Value::Utf8("say \"hi\"".into()));
    }

    #[test]
    fn chunked_and_single_threaded_reads_agree() {
        let mut input = String::from("id,note,score\n");
        for i in 0..500 {
            if i % 7 == 0 {
                input.push_str(&format!("{i},\"multi\nline {i}\",{}.5\n", i));
            } else {
                input.push_str(&format!("{i},plain {i},{i}\n"));
            }
        }
        let single = read_csv_from_bytes(input.as_bytes(), &CsvReadOptions::default()).unwrap();
        let chunked = read_csv_from_bytes(input.as_bytes(), &forced_chunks(8)).unwrap();
        assert_eq!(single, chunked);
        assert_eq!(chunked.row_count(), 500);
        assert_eq!(chunked.value(7, "note").unwrap(), Value::Utf8("multi\nline 7".into()));
    }

    #[test]
    fn chunk_types_widen_to_most_general() {
        // Early rows are integers, a late row has a decimal.
        let mut input = String::from("x\n");
        for i in 0..300 {
            input.push_str(&format!("{i}\n"));
        }
        input.push_str("0.25\n");
        let df = read_csv_from_bytes(input.as_bytes(), &forced_chunks(6)).unwrap();
        assert_eq!(df.data_type("x").unwrap(), DataType::Float64);
        assert_eq!(df.value(3, "x").unwrap(), Value::Float64(3.0));
        assert_eq!(df.value(300, "x").unwrap(), Value::Float64(0.25));
    }

    #[test]
    fn chunk_types_fall_back_to_utf8_without_losing_text() {
        let mut input = String::from("code\n");
        for _ in 0..200 {
            input.push_str("007\n");
        }
        input.push_str("abc\n");
        let df = read_csv_from_bytes(input.as_bytes(), &forced_chunks(5)).unwrap();
        assert_eq!(df.data_type("code").unwrap(), DataType::Utf8);
        assert_eq!(df.value(0, "code").unwrap(), Value::Utf8("007".into()));
    }

    #[test]
    fn field_count_mismatch_names_global_row() {
        let mut input = String::from("a,b\n");
        for i in 0..100 {
            input.push_str(&format!("{i},{i}\n"));
        }
        input.push_str("oops\n");
        for opts in [CsvReadOptions::default(), forced_chunks(4)] {
            let err = read_csv_from_bytes(input.as_bytes(), &opts).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse);
            assert_eq!(
                err.to_string(),
                "parse error at data row 100: expected 2 fields, found 1"
            );
        }
    }

    #[test]
    fn unterminated_quote_fails() {
        let input = b"a,b\n1,2\n3,\"never closed\n";
        let err = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("unterminated quoted field"));
        assert!(err.to_string().contains("data row 1"));
    }

    #[test]
    fn stray_quote_is_reported_where_it_opens() {
        let input = b"id,note\n1,5\" tall\n2,short\n3,plain\n";
        let err = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parse error at data row 0: unterminated quoted field"
        );
    }

    #[test]
    fn blank_line_is_a_null_row_in_single_column_files() {
        let df = read_csv_from_bytes(b"x\n1\n\n3\n", &CsvReadOptions::default()).unwrap();
        assert_eq!(df.shape(), (3, 1));
        assert_eq!(
            df.column("x").unwrap(),
            &Column::Int64(vec![Some(1), None, Some(3)])
        );

        let crlf = read_csv_from_bytes(b"x\r\n1\r\n\r\n3\r\n", &CsvReadOptions::default()).unwrap();
        assert_eq!(crlf, df);
    }

    #[test]
    fn blank_line_in_multi_column_file_is_rejected() {
        let mut input = String::from("a,b\n");
        for i in 0..120 {
            input.push_str(&format!("{i},{i}\n"));
        }
        input.push('\n');
        input.push_str("3,4\n");
        for opts in [CsvReadOptions::default(), forced_chunks(4)] {
            let err = read_csv_from_bytes(input.as_bytes(), &opts).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse);
            assert_eq!(
                err.to_string(),
                "parse error at data row 120: expected 2 fields, found an empty line"
            );
        }
    }

    #[test]
    fn text_fields_keep_surrounding_whitespace() {
        let input = b"id,name\n1,\"  x  \"\n2, \n3,\n";
        let df = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap();
        assert_eq!(
            df.column("name").unwrap(),
            &Column::Utf8(vec![Some("  x  ".into()), Some(" ".into()), None])
        );
    }

    #[test]
    fn empty_input_and_header_only() {
        let err = read_csv_from_bytes(b"", &CsvReadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let df = read_csv_from_bytes(b"a,b\n", &CsvReadOptions::default()).unwrap();
        assert_eq!(df.shape(), (0, 2));
        assert_eq!(df.data_type("a").unwrap(), DataType::Null);
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = read_csv_from_bytes(b"a,a\n1,2\n", &CsvReadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn crlf_and_bom_are_handled() {
        let input = b"\xEF\xBB\xBFid,name\r\n1,Ada\r\n2,Grace\r\n";
        let df = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap();
        assert_eq!(df.schema().index_of("id"), Some(0));
        assert_eq!(df.value(1, "name").unwrap(), Value::Utf8("Grace".into()));
    }

    #[test]
    fn tsv_delimiter() {
        let df = read_csv_from_bytes(b"a\tb\n1\tx,y\n", &CsvReadOptions::tsv()).unwrap();
        assert_eq!(df.value(0, "b").unwrap(), Value::Utf8("x,y".into()));
    }

    #[test]
    fn writer_output_reads_back_with_same_types() {
        let input = b"id,score,name,when\n1,20.0,\"a,b\",2024-01-02 03:04:05\n2,,Bob,\n";
        let df = read_csv_from_bytes(input, &CsvReadOptions::default()).unwrap();
        let bytes = write_csv_to_bytes(&df, b',').unwrap();
        let back = read_csv_from_bytes(&bytes, &CsvReadOptions::default()).unwrap();
        assert_eq!(back, df);
        assert_eq!(back.column("score").unwrap(), &Column::Float64(vec![Some(20.0), None]));
    }
}
