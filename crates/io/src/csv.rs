// CSV/TSV import/export

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use deltagrid_recon::{Table, Value};

use crate::error::IoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter; sniffed from the content when `None`.
    pub delimiter: Option<u8>,
    /// Turn integer / float / boolean text into typed values.
    pub infer_types: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            infer_types: true,
        }
    }
}

/// Read a delimited file into a table. The first record is the header.
pub fn import(path: &Path, options: &CsvOptions) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path)?;
    import_from_str(&content, options).map_err(|e| match e {
        IoError::Csv { source, .. } => IoError::csv(path, source),
        other => other,
    })
}

pub fn import_from_str(content: &str, options: &CsvOptions) -> Result<Table, IoError> {
    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(content));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| IoError::csv("<input>", e))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Ok(Table::default()),
    };
    let width = headers.len();
    let mut table = Table::new(dedupe_headers(headers));

    let mut lengths = Vec::new();
    for result in records {
        let record = result.map_err(|e| IoError::csv("<input>", e))?;
        if record.len() > width {
            return Err(IoError::Shape {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }
        lengths.push(record.len());

        let mut row: Vec<Value> = record
            .iter()
            .map(|field| parse_cell(field, options.infer_types))
            .collect();
        row.resize(width, Value::Null);
        table.push_row(row)?;
    }

    let rate = shape_mismatch_rate(width, &lengths);
    if rate > 0.0 {
        log::warn!(
            "csv: {:.1}% of rows short of {width} fields, padded with null",
            rate * 100.0
        );
    }
    log::debug!(
        "csv: {} row(s) x {} column(s), delimiter {:?}",
        table.num_rows(),
        width,
        delimiter as char
    );
    Ok(table)
}

fn parse_cell(field: &str, infer_types: bool) -> Value {
    if field.is_empty() {
        Value::Null
    } else if infer_types {
        Value::infer(field)
    } else {
        Value::Text(field.to_string())
    }
}

/// Make header names unique: repeats get `_1`, `_2`, ... and blanks become
/// `column_<n>` (1-based position).
pub fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if name.trim().is_empty() {
                format!("column_{}", i + 1)
            } else {
                name
            };
            let mut candidate = name.clone();
            let mut n = 1;
            while seen.contains(&candidate) {
                candidate = format!("{name}_{n}");
                n += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Share of records whose field count differs from `width`, rounded to
/// three decimals. No records give `0.0`.
pub fn shape_mismatch_rate(width: usize, lengths: &[usize]) -> f64 {
    if lengths.is_empty() {
        return 0.0;
    }
    let mismatched = lengths.iter().filter(|&&len| len != width).count();
    let rate = mismatched as f64 / lengths.len() as f64;
    (rate * 1000.0).round() / 1000.0
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Consistent lines times field count; wider wins ties.
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Excel exports are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::read(path, e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("csv: {} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Write header then rows; null cells are empty fields.
pub fn export(table: &Table, path: &Path, delimiter: u8) -> Result<(), IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| IoError::csv(path, e))?;

    writer
        .write_record(table.columns())
        .map_err(|e| IoError::csv(path, e))?;
    for row in table.rows() {
        let record: Vec<String> = row
            .iter()
            .map(|v| v.to_text().unwrap_or_default())
            .collect();
        writer.write_record(&record).map_err(|e| IoError::csv(path, e))?;
    }

    writer.flush().map_err(|e| IoError::read(path, e))?;
    Ok(())
}
