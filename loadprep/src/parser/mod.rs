//! CSV source with encoding and delimiter auto-detection.
//!
//! Turns raw extracts into a typed [`Table`]. Cells that dataframe tooling
//! reads as missing (`NA`, `NaN`, empty, ...) become [`Value::Null`], and
//! each column gets the narrowest type all of its cells parse as.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Column, DataType, Table, Value};

/// Tokens read as a missing value.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "utf-8-sig" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => {
                return Err(CsvError::EncodingError(format!("unsupported encoding '{}'", other)))
            }
        },
    };
    // Strip a UTF-8 byte order mark so it does not end up in the first header
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

/// Parse CSV text into a table with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use loadprep::parse_table;
///
/// let table = parse_table("name,plays\nAlice,30\nBob,", ',').unwrap();
/// assert_eq!(table.row_count(), 2);
/// ```
pub fn parse_table(content: &str, delimiter: char) -> CsvResult<Table> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::ParseError { line: 1, message: format!("delimiter '{}' is not ASCII", delimiter) })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        for (i, column) in cells.iter_mut().enumerate() {
            let raw = record.get(i).unwrap_or("");
            column.push(if NA_TOKENS.contains(&raw) { None } else { Some(raw.to_string()) });
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();

    Table::new(columns).map_err(|e| CsvError::ParseError { line: 1, message: e.to_string() })
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV file with an explicit delimiter (encoding still detected).
pub fn parse_file_with_delimiter<P: AsRef<Path>>(path: P, delimiter: char) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding)?;
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse CSV string with explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    let table = parse_table(content, delimiter)?;
    let headers = table.column_names().into_iter().map(String::from).collect();
    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        headers,
    })
}

/// Pick the narrowest type every present cell parses as.
fn infer_column(name: String, raw: Vec<Option<String>>) -> Column {
    let present = || raw.iter().flatten();

    let dtype = if present().next().is_none() {
        DataType::Utf8
    } else if present().all(|s| s.trim().parse::<i64>().is_ok()) {
        DataType::Int64
    } else if present().all(|s| s.trim().parse::<f64>().is_ok()) {
        DataType::Float64
    } else if present().all(|s| parse_bool_literal(s).is_some()) {
        DataType::Bool
    } else {
        DataType::Utf8
    };

    let values = raw
        .into_iter()
        .map(|cell| match cell {
            None => Value::Null,
            Some(s) => match dtype {
                DataType::Int64 => s.trim().parse().map(Value::Int).unwrap_or(Value::Null),
                DataType::Float64 => s.trim().parse().map(Value::Float).unwrap_or(Value::Null),
                DataType::Bool => parse_bool_literal(&s).map(Value::Bool).unwrap_or(Value::Null),
                _ => Value::Str(s),
            },
        })
        .collect();

    Column::new(name, dtype, values)
}

fn parse_bool_literal(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let table = parse_table("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["name", "age"]);
        let age = table.column("age", "csv").unwrap();
        assert_eq!(age.dtype, DataType::Int64);
        assert_eq!(age.values, vec![Value::Int(30), Value::Int(25)]);
    }

    #[test]
    fn test_quoted_values_keep_delimiters() {
        let csv = "name,title\nAlice,\"Hello, World\"";
        let table = parse_table(csv, ',').unwrap();
        assert_eq!(table.row(0)[1], &Value::str("Hello, World"));
    }

    #[test]
    fn test_na_tokens_become_null() {
        let csv = "a,b,c\n1,NA,x\n2,,n/a\n3,NaN,y";
        let table = parse_table(csv, ',').unwrap();
        assert_eq!(table.column("b", "csv").unwrap().null_count(), 3);
        assert_eq!(table.column("c", "csv").unwrap().null_count(), 1);
    }

    #[test]
    fn test_float_and_text_inference() {
        let csv = "price,label,flag\n1.5,x,true\n2,y,False";
        let table = parse_table(csv, ',').unwrap();
        assert_eq!(table.column("price", "csv").unwrap().dtype, DataType::Float64);
        assert_eq!(table.column("label", "csv").unwrap().dtype, DataType::Utf8);
        assert_eq!(table.column("flag", "csv").unwrap().dtype, DataType::Bool);
    }

    #[test]
    fn test_text_keeps_surrounding_whitespace() {
        let table = parse_table("genre\n  Rock \n", ',').unwrap();
        assert_eq!(table.row(0)[0], &Value::str("  Rock "));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_table("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_short_rows_padded_with_null() {
        let table = parse_table("a;b;c\n1;2", ';').unwrap();
        assert!(table.row(0)[2].is_null());
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_table("", ';'), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_bytes_auto(b""), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto("name;age\nAlice;30\nBob;25".as_bytes()).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.table.row_count(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_bom_is_stripped() {
        let bytes = "\u{feff}id,name\n1,x".as_bytes();
        let result = parse_bytes_auto(bytes).unwrap();
        assert_eq!(result.headers[0], "id");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }
}
