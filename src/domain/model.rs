use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bumped whenever the compendium column set or cell encoding changes.
pub const COMPENDIUM_SCHEMA_VERSION: u32 = 1;

pub const COMPENDIUM_COLUMNS: [&str; 7] = [
    "Title",
    "Description",
    "Long_description",
    "Columns",
    "Unique_parameters",
    "Latest_release",
    "Source",
];

/// One entry of the primary listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetListing {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `links.latest_version.href`; read through `DatasetListing::detail_url`.
    pub latest_version_href: Option<String>,
    pub qmi_url: Option<String>,
}

/// What the detail endpoint says about a dataset. Both fields absent is the
/// "no detail" state and is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDetail {
    pub download_url: Option<String>,
    pub release_date: Option<String>,
}

impl DatasetDetail {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_download(&self) -> bool {
        self.download_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CsvValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CsvValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CsvValue::Null)
    }

    /// Rendering used for distinct-value listings.
    pub fn render(&self) -> Option<String> {
        match self {
            CsvValue::Null => None,
            CsvValue::Integer(i) => Some(i.to_string()),
            CsvValue::Float(f) => Some(f.to_string()),
            CsvValue::Text(s) => Some(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CsvValue>>,
    pub skipped_rows: usize,
}

impl ParsedTable {
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CsvValue> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValues {
    NoSummary,
    Distinct(BTreeSet<String>),
}

pub type ColumnSummary = BTreeMap<String, ColumnValues>;

/// A field that either carries a value or was unavailable for this run.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Present(T),
    Unavailable,
}

impl<T> Field<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Present(v),
            None => Field::Unavailable,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            Field::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ons,
    Nomis,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Ons => "ons",
            SourceKind::Nomis => "nomis",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompendiumRow {
    pub title: Field<String>,
    pub description: Field<String>,
    pub long_description: String,
    pub columns: Field<Vec<String>>,
    pub unique_parameters: Field<ColumnSummary>,
    pub latest_release: Field<String>,
    pub source: SourceKind,
}

/// A dataset definition from the secondary (Nomis) API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryDataset {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestWarning {
    pub dataset: String,
    pub stage: String,
    pub message: String,
}

impl HarvestWarning {
    pub fn new(dataset: impl Into<String>, stage: &str, message: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// Everything fetched up front, before the per-dataset chain runs.
#[derive(Debug, Clone, Default)]
pub struct HarvestInput {
    pub listings: Vec<DatasetListing>,
    /// Narrative page per listing position, already aligned.
    pub qmi_urls: Vec<Option<String>>,
    pub secondary: Vec<SecondaryDataset>,
    pub warnings: Vec<HarvestWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct Compendium {
    pub rows: Vec<CompendiumRow>,
    pub warnings: Vec<HarvestWarning>,
    pub skipped_csv_rows: usize,
}

impl Compendium {
    pub fn count_source(&self, source: SourceKind) -> usize {
        self.rows.iter().filter(|r| r.source == source).count()
    }
}
