//! Delimited table I/O with encoding and delimiter auto-detection.
//!
//! Hierarchy exports come out of several tools: UTF-8 with a BOM, Latin-1,
//! Windows-1252, separated by commas or semicolons. Loading detects both, then
//! parses with the `csv` crate so quoted fields keep embedded delimiters.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{TableError, TableResult};
use crate::models::{Row, Table};

/// A loaded table with the format it was read in
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected or requested delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "" => "utf-8".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> TableResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => {
                let (text, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(TableError::Encoding(other.to_string()));
                }
                text.to_string()
            }
            // Fallback: try UTF-8 with lossy conversion
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    };

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

fn delimiter_byte(delimiter: char) -> TableResult<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(TableError::InvalidDelimiter(delimiter))
}

/// Parse decoded CSV text into a [`Table`].
///
/// The first record is the header. Short rows are padded with empty cells,
/// long rows truncated to the header width.
pub fn parse_table(content: &str, delimiter: char) -> TableResult<Table> {
    if content.trim().is_empty() {
        return Err(TableError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(TableError::NoHeaders);
    }

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record?;
        table.push_row(Row::from_fields(record.iter()));
    }

    Ok(table)
}

/// Parse raw bytes, detecting the encoding and (unless given) the delimiter.
pub fn parse_bytes(bytes: &[u8], delimiter: Option<char>) -> TableResult<LoadedTable> {
    if bytes.is_empty() {
        return Err(TableError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    let table = parse_table(&content, delimiter)?;

    Ok(LoadedTable {
        table,
        encoding,
        delimiter,
    })
}

/// Load a table from a file.
pub fn load_table(path: impl AsRef<Path>, delimiter: Option<char>) -> TableResult<LoadedTable> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes(&bytes, delimiter)
}

/// Write a table as delimited text. Empty cells become empty fields.
pub fn write_table<W: Write>(table: &Table, writer: W, delimiter: char) -> TableResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter)?)
        .from_writer(writer);

    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.cells().iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;

    Ok(())
}

/// Store a table to a file, creating or truncating it.
pub fn store_table(table: &Table, path: impl AsRef<Path>, delimiter: char) -> TableResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_table(table, std::io::BufWriter::new(file), delimiter)
}

/// `dir/name.csv` -> `dir/name_new.csv`
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}_new.{}", stem, ext.to_string_lossy()),
        None => format!("{}_new", stem),
    };
    input.with_file_name(name)
}
