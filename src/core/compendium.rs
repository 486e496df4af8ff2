//! The compendium table and its run manifest.
//!
//! Column order is fixed by [`COMPENDIUM_COLUMNS`] and versioned by
//! [`COMPENDIUM_SCHEMA_VERSION`]. `Columns` holds a JSON array of names,
//! `Unique_parameters` a JSON object of column → distinct values (or null for
//! quantitative columns). Unavailable fields are written as empty cells.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{
    Compendium, CompendiumRow, Field, HarvestWarning, SecondaryDataset, SourceKind,
    COMPENDIUM_COLUMNS, COMPENDIUM_SCHEMA_VERSION,
};
use crate::utils::error::{EtlError, Result};

impl CompendiumRow {
    pub fn from_secondary(dataset: &SecondaryDataset) -> Self {
        Self {
            title: Field::Present(dataset.name.clone()),
            description: Field::from_option(dataset.description.clone()),
            long_description: String::new(),
            columns: Field::Unavailable,
            unique_parameters: Field::Unavailable,
            latest_release: Field::Unavailable,
            source: SourceKind::Nomis,
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    description: &'a str,
    long_description: &'a str,
    columns: String,
    unique_parameters: String,
    latest_release: &'a str,
    source: &'static str,
}

fn text(field: &Field<String>) -> &str {
    field.present().map(String::as_str).unwrap_or("")
}

fn json_cell<T: Serialize>(field: &Field<T>) -> Result<String> {
    match field {
        Field::Present(value) => Ok(serde_json::to_string(value)?),
        Field::Unavailable => Ok(String::new()),
    }
}

impl<'a> CsvRow<'a> {
    fn from_row(row: &'a CompendiumRow) -> Result<Self> {
        Ok(Self {
            title: text(&row.title),
            description: text(&row.description),
            long_description: &row.long_description,
            columns: json_cell(&row.columns)?,
            unique_parameters: json_cell(&row.unique_parameters)?,
            latest_release: text(&row.latest_release),
            source: row.source.as_str(),
        })
    }
}

/// Primary rows keep listing order; secondary rows follow.
pub fn assemble(primary: Vec<CompendiumRow>, secondary: &[SecondaryDataset]) -> Vec<CompendiumRow> {
    let mut rows = primary;
    rows.extend(secondary.iter().map(CompendiumRow::from_secondary));
    rows
}

pub fn write_csv(rows: &[CompendiumRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(COMPENDIUM_COLUMNS)?;
    for row in rows {
        writer.serialize(CsvRow::from_row(row)?)?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub columns: Vec<&'static str>,
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    pub ons_rows: usize,
    pub nomis_rows: usize,
    pub skipped_csv_rows: usize,
    pub warnings: Vec<HarvestWarning>,
}

impl RunManifest {
    pub fn for_compendium(compendium: &Compendium, generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: COMPENDIUM_SCHEMA_VERSION,
            columns: COMPENDIUM_COLUMNS.to_vec(),
            generated_at,
            rows: compendium.rows.len(),
            ons_rows: compendium.count_source(SourceKind::Ons),
            nomis_rows: compendium.count_source(SourceKind::Nomis),
            skipped_csv_rows: compendium.skipped_csv_rows,
            warnings: compendium.warnings.clone(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

pub fn manifest_file_name(output_file: &str) -> String {
    format!("{}.manifest.json", output_file)
}
