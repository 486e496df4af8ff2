use crate::adapters::HttpFetcher;
use crate::core::{CsvValue, ParsedTable};
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;

/// Tokens read as a missing value.
const NA_TOKENS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A"];

fn is_na(raw: &str) -> bool {
    NA_TOKENS.contains(&raw.trim())
}

/// One type per column: integer or float only when every present cell
/// parses, otherwise every cell keeps its raw text ("01" stays "01").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Float,
    Text,
}

fn is_finite_float(trimmed: &str) -> bool {
    trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

fn infer_column_type<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> ColumnType {
    let mut kind = ColumnType::Integer;
    for cell in cells.flatten().filter(|c| !is_na(c)) {
        let trimmed = cell.trim();
        if kind == ColumnType::Integer && trimmed.parse::<i64>().is_ok() {
            continue;
        }
        if is_finite_float(trimmed) {
            kind = ColumnType::Float;
            continue;
        }
        return ColumnType::Text;
    }
    kind
}

fn typed_cell(raw: Option<&str>, kind: ColumnType) -> CsvValue {
    let Some(raw) = raw.filter(|r| !is_na(r)) else {
        return CsvValue::Null;
    };
    let trimmed = raw.trim();
    match kind {
        ColumnType::Integer => trimmed
            .parse::<i64>()
            .map(CsvValue::Integer)
            .unwrap_or_else(|_| CsvValue::Text(raw.to_string())),
        ColumnType::Float => trimmed
            .parse::<f64>()
            .map(CsvValue::Float)
            .unwrap_or_else(|_| CsvValue::Text(raw.to_string())),
        ColumnType::Text => CsvValue::Text(raw.to_string()),
    }
}

/// Blank headers become `Unnamed: <index>` and repeats get `.1`, `.2` ...
fn unique_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::new();

    for (index, header) in headers.enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            header.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        columns.push(name);
    }

    columns
}

impl ParsedTable {
    /// Records shorter than the header are padded with nulls; longer ones,
    /// or ones that fail to decode, are skipped and counted.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(EtlError::ProcessingError {
                message: "CSV body has no header row".to_string(),
            });
        }
        let columns = unique_headers(headers.iter());

        let mut records = Vec::new();
        let mut skipped_rows = 0;
        for (line, record) in reader.records().enumerate() {
            match record {
                Ok(record) if record.len() <= columns.len() => records.push(record),
                Ok(record) => {
                    tracing::trace!(
                        "Skipping record {}: {} fields, expected {}",
                        line + 1,
                        record.len(),
                        columns.len()
                    );
                    skipped_rows += 1;
                }
                Err(e) => {
                    tracing::trace!("Skipping record {}: {}", line + 1, e);
                    skipped_rows += 1;
                }
            }
        }

        if skipped_rows > 0 {
            tracing::debug!("Skipped {} malformed CSV rows", skipped_rows);
        }

        let kinds: Vec<ColumnType> = (0..columns.len())
            .map(|index| infer_column_type(records.iter().map(|r| r.get(index))))
            .collect();
        let rows = records
            .iter()
            .map(|record| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(index, kind)| typed_cell(record.get(index), *kind))
                    .collect()
            })
            .collect();

        Ok(Self {
            columns,
            rows,
            skipped_rows,
        })
    }
}

/// The resource is fetched as a plain text body through the shared client;
/// some hosts refuse the file when it is requested as a raw download.
pub async fn download_table(fetcher: &HttpFetcher, url: &str) -> Result<ParsedTable> {
    let body = fetcher.get_text(url, fetcher.retry_policy()).await?;
    tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
    ParsedTable::parse(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_inferred_per_column() {
        let table = ParsedTable::parse(
            "v4_0,time,geography,count\n12.5,2021,K02000001,3\n,Jan-21,NA,4\n1,2022,W92000004,\n",
        )
        .unwrap();

        assert_eq!(table.columns, vec!["v4_0", "time", "geography", "count"]);
        assert_eq!(table.rows[0][0], CsvValue::Float(12.5));
        assert_eq!(table.rows[2][0], CsvValue::Float(1.0));
        assert_eq!(table.rows[1][0], CsvValue::Null);
        assert_eq!(table.rows[0][1], CsvValue::Text("2021".to_string()));
        assert_eq!(table.rows[1][1], CsvValue::Text("Jan-21".to_string()));
        assert_eq!(table.rows[1][2], CsvValue::Null);
        assert_eq!(table.rows[0][3], CsvValue::Integer(3));
        assert_eq!(table.rows[2][3], CsvValue::Null);
    }

    #[test]
    fn test_mixed_column_keeps_raw_codes() {
        let table = ParsedTable::parse("code\n01\nA\nB\n1.50\n").unwrap();
        let codes: Vec<&CsvValue> = table.column_values(0).collect();
        assert_eq!(
            codes,
            vec![
                &CsvValue::Text("01".to_string()),
                &CsvValue::Text("A".to_string()),
                &CsvValue::Text("B".to_string()),
                &CsvValue::Text("1.50".to_string()),
            ]
        );
    }

    #[test]
    fn test_all_numeric_codes_become_numbers() {
        let table = ParsedTable::parse("code\n01\n02\n").unwrap();
        assert_eq!(table.rows[0][0], CsvValue::Integer(1));
        assert_eq!(table.rows[1][0], CsvValue::Integer(2));
    }

    #[test]
    fn test_short_rows_padded_long_rows_skipped() {
        let text = "a,b,c\n1,2,3\n1,2\n4,5,6\n7,8,9,10\n";
        let table = ParsedTable::parse(text).unwrap();

        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.skipped_rows, 1);
        assert_eq!(table.rows[1][1], CsvValue::Integer(2));
        assert_eq!(table.rows[1][2], CsvValue::Null);
        assert_eq!(table.rows[2][0], CsvValue::Integer(4));
    }

    #[test]
    fn test_short_text_rows_are_kept() {
        let table = ParsedTable::parse("a,b,c\nx,y\nx,y,z\n").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.skipped_rows, 0);
        assert_eq!(table.rows[0][2], CsvValue::Null);
    }

    #[test]
    fn test_duplicate_and_blank_headers_made_unique() {
        let table = ParsedTable::parse("x,x,,x\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns, vec!["x", "x.1", "Unnamed: 2", "x.2"]);
    }

    #[test]
    fn test_empty_body_is_an_error() {
        assert!(ParsedTable::parse("").is_err());
    }

    #[test]
    fn test_infinite_strings_stay_text() {
        let table = ParsedTable::parse("a\ninf\n").unwrap();
        assert_eq!(table.rows[0][0], CsvValue::Text("inf".to_string()));
    }
}
