pub mod compendium;
pub mod detail;
pub mod etl;
pub mod extract;
pub mod lister;
pub mod pipeline;
pub mod qmi;
pub mod secondary;
pub mod summarize;
pub mod table;

pub use crate::domain::model::{
    ColumnSummary, ColumnValues, Compendium, CompendiumRow, CsvValue, DatasetDetail,
    DatasetListing, Field, HarvestInput, HarvestWarning, ParsedTable, SecondaryDataset,
    SourceKind, COMPENDIUM_COLUMNS, COMPENDIUM_SCHEMA_VERSION,
};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
