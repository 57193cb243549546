//! CSV parsing with encoding auto-detection.
//!
//! Converts CSV rows into string-valued JSON objects keyed by column header.
//! No entity-specific logic here; coercion happens in [`crate::transform`].
//!
//! A parse failure is fatal to an import run: it is reported once and no
//! row-level work happens (see [`crate::error::ImportRunError`]).

use csv::{ReaderBuilder, Trim};
use serde_json::{json, Map, Value};

/// One raw input record: column name to string value, as parsed from CSV.
///
/// Ephemeral; discarded after transformation.
pub type RawRow = Map<String, Value>;

/// CSV parsing error with line context.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Result of parsing with metadata.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Parsed data rows, in input order.
    pub rows: Vec<RawRow>,
    /// Column headers from the first line.
    pub headers: Vec<String>,
    /// Detected encoding.
    pub encoding: String,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the detected encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).to_string()),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.to_string()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Parse CSV bytes into [`RawRow`]s with encoding auto-detection.
///
/// The first line is the header row; every subsequent non-empty line is one
/// record. Rows shorter than the header are padded with empty strings, extra
/// trailing values are ignored. Standard CSV quoting applies.
///
/// # Example
/// ```ignore
/// let parsed = parse_bytes(b"name,score\nAlice,90\n")?;
/// assert_eq!(parsed.rows[0]["name"], "Alice");
/// ```
pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::new(1, "empty CSV file"));
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_content(&content, encoding)
}

fn parse_content(content: &str, encoding: String) -> Result<ParsedFile, ParseError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::new(1, format!("cannot read header row: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::new(1, "no headers found"));
    }

    let mut rows = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let line_num = idx + 2; // +1 for 0-index, +1 for header

        let record =
            record.map_err(|e| ParseError::new(line_num, format!("malformed row: {}", e)))?;

        // Blank lines carry no data; the csv crate usually swallows them,
        // but a row of empty fields can still get through.
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let raw_value = record.get(i).unwrap_or("");
            obj.insert(header.clone(), json!(raw_value));
        }
        rows.push(obj);
    }

    Ok(ParsedFile {
        rows,
        headers,
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let parsed = parse_bytes(b"name,email\nAlice,alice@example.com\nBob,bob@example.com")
            .unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.headers, vec!["name", "email"]);
        assert_eq!(parsed.rows[0]["name"], "Alice");
        assert_eq!(parsed.rows[1]["email"], "bob@example.com");
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,notes\n\"Alice\",\"Hello, World\"";
        let parsed = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(parsed.rows[0]["name"], "Alice");
        assert_eq!(parsed.rows[0]["notes"], "Hello, World");
    }

    #[test]
    fn test_missing_values_padded() {
        let parsed = parse_bytes(b"a,b,c\n1,,3").unwrap();

        assert_eq!(parsed.rows[0]["a"], "1");
        assert_eq!(parsed.rows[0]["b"], "");
        assert_eq!(parsed.rows[0]["c"], "3");
    }

    #[test]
    fn test_short_row_padded() {
        let parsed = parse_bytes(b"a,b,c\n1,2").unwrap();

        assert_eq!(parsed.rows[0]["c"], "");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let parsed = parse_bytes(b"a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn test_empty_file_error() {
        let result = parse_bytes(b"");
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains("empty"));
    }

    #[test]
    fn test_header_only_yields_no_rows() {
        let parsed = parse_bytes(b"name,email\n").unwrap();
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_error_message_has_line() {
        let err = ParseError::new(5, "malformed row");
        assert!(err.to_string().contains("Line 5"));
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let mut bytes = b"name\n".to_vec();
        bytes.extend_from_slice(&[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9]);
        let parsed = parse_bytes(&bytes).unwrap();
        let name = parsed.rows[0]["name"].as_str().unwrap();
        assert!(name.starts_with("Soci"));
    }
}
