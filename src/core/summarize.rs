//! Column classification for the `Unique_parameters` field.
//!
//! A column is quantitative when most of its sampled non-empty cells are
//! numbers, either typed or written as digits with at most one decimal point.
//! Quantitative and all-empty columns get no summary; every other column
//! lists the distinct values it holds.

use crate::core::{ColumnSummary, ColumnValues, CsvValue, ParsedTable};

pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Digits with at most one `.` removed, "12" and "3.5" but not "-1" or "1.2.3".
pub fn looks_numeric(text: &str) -> bool {
    let stripped = text.trim().replacen('.', "", 1);
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

fn is_numeric(value: &CsvValue) -> bool {
    match value {
        CsvValue::Integer(_) | CsvValue::Float(_) => true,
        CsvValue::Text(s) => looks_numeric(s),
        CsvValue::Null => false,
    }
}

pub fn classify_column(table: &ParsedTable, index: usize, sample_rows: usize) -> ColumnValues {
    let sample: Vec<&CsvValue> = table
        .column_values(index)
        .filter(|v| !v.is_null())
        .take(sample_rows.max(1))
        .collect();

    if sample.is_empty() {
        return ColumnValues::NoSummary;
    }

    let numeric = sample.iter().filter(|v| is_numeric(v)).count();
    if numeric * 2 > sample.len() {
        return ColumnValues::NoSummary;
    }

    ColumnValues::Distinct(table.column_values(index).filter_map(CsvValue::render).collect())
}

pub fn summarize(table: &ParsedTable, sample_rows: usize) -> ColumnSummary {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), classify_column(table, index, sample_rows)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn table(text: &str) -> ParsedTable {
        ParsedTable::parse(text).unwrap()
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_looks_numeric() {
        assert!(looks_numeric("12"));
        assert!(looks_numeric("3.5"));
        assert!(looks_numeric(" 7 "));
        assert!(!looks_numeric("1.2.3"));
        assert!(!looks_numeric("-1"));
        assert!(!looks_numeric("."));
        assert!(!looks_numeric("red"));
    }

    #[test]
    fn test_numeric_strings_get_no_summary() {
        let t = table("value\n12\n3.5\n7\n");
        let summary = summarize(&t, DEFAULT_SAMPLE_ROWS);
        assert_eq!(summary["value"], ColumnValues::NoSummary);
    }

    #[test]
    fn test_categorical_strings_list_distinct_values() {
        let t = table("colour\nred\nblue\nred\n");
        let summary = summarize(&t, DEFAULT_SAMPLE_ROWS);
        assert_eq!(summary["colour"], ColumnValues::Distinct(set(&["red", "blue"])));
    }

    #[test]
    fn test_blank_first_value_does_not_decide_type() {
        let t = table("count\n\n3\n4\n");
        assert_eq!(classify_column(&t, 0, DEFAULT_SAMPLE_ROWS), ColumnValues::NoSummary);
    }

    #[test]
    fn test_atypical_first_value_does_not_decide_type() {
        let t = table("geography\n1\na\nb\n");
        assert_eq!(
            classify_column(&t, 0, DEFAULT_SAMPLE_ROWS),
            ColumnValues::Distinct(set(&["1", "a", "b"]))
        );
    }

    #[test]
    fn test_leading_zero_codes_listed_verbatim() {
        let t = table("code\n01\nA\nB\n1.50\n");
        assert_eq!(
            classify_column(&t, 0, DEFAULT_SAMPLE_ROWS),
            ColumnValues::Distinct(set(&["01", "1.50", "A", "B"]))
        );
    }

    #[test]
    fn test_empty_column_gets_no_summary() {
        let t = table("a,b\n1,\n2,\n");
        let summary = summarize(&t, DEFAULT_SAMPLE_ROWS);
        assert_eq!(summary["a"], ColumnValues::NoSummary);
        assert_eq!(summary["b"], ColumnValues::NoSummary);
    }

    #[test]
    fn test_summary_is_idempotent() {
        let t = table("v4_1,Data Marking,time,geography\n1.2,,2021,Wales\n3.4,x,2022,England\n");
        let first = summarize(&t, DEFAULT_SAMPLE_ROWS);
        let second = summarize(&t, DEFAULT_SAMPLE_ROWS);
        assert_eq!(first, second);
        assert_eq!(first["geography"], ColumnValues::Distinct(set(&["England", "Wales"])));
        assert_eq!(first["time"], ColumnValues::NoSummary);
    }

    #[test]
    fn test_sample_window_bounds_the_vote() {
        let t = table("code\nA1\nB2\n3\n4\n5\n");
        assert!(matches!(classify_column(&t, 0, 2), ColumnValues::Distinct(_)));
        assert_eq!(classify_column(&t, 0, 5), ColumnValues::NoSummary);
    }
}
