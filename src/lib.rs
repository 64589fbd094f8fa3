pub mod aggregate;
pub mod cleaning;
pub mod config;
pub mod hypothesis;
pub mod logging;
pub mod report;
pub mod stats;
mod tui;
pub mod types;

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::info;

pub use cleaning::{CleaningSummary, clean};
pub use config::AnalysisConfig;
pub use report::Report;
pub use tui::render_tui;
pub use types::{Frame, Record, Region, SalesTier, TierCuts, UserScore};

#[derive(Debug, Error)]
pub enum GamestatError {
    #[error("Empty dataset provided")]
    EmptyDataset,
    #[error("Missing required column `{column}`")]
    MissingColumn { column: &'static str },
    #[error("Cannot parse `{value}` in column `{column}` at row {row}")]
    Parse {
        column: &'static str,
        row: usize,
        value: String,
    },
    #[error("Row {row} has {found} cell(s) but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Step `{step}` needs `{column}`, which an earlier step derives")]
    MissingDerived {
        step: &'static str,
        column: &'static str,
    },
    #[error("Group `{group}` has {len} observation(s); a t-test needs at least 2")]
    InsufficientSample { group: String, len: usize },
    #[error("Distribution error: {0}")]
    Distribution(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw, untyped table exactly as read from the delimited file.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Dataset { headers, rows }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, GamestatError> {
        let path = path.as_ref();
        let dataset = Self::from_csv_reader(csv::Reader::from_path(path)?)?;
        info!(path = %path.display(), rows = dataset.rows.len(), "loaded dataset");
        Ok(dataset)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, GamestatError> {
        Self::from_csv_reader(csv::Reader::from_reader(reader))
    }

    fn from_csv_reader<R: io::Read>(mut rdr: csv::Reader<R>) -> Result<Self, GamestatError> {
        let headers = rdr.headers()?.iter().map(String::from).collect();
        let rows = rdr
            .records()
            .map(|r| {
                let record = r?;
                Ok(record.iter().map(String::from).collect::<Vec<String>>())
            })
            .collect::<Result<Vec<_>, GamestatError>>()?;
        Ok(Dataset { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Cleans the raw table and builds the full analysis report over it.
pub fn analyze(
    dataset: Dataset,
    config: &AnalysisConfig,
) -> Result<(Frame, Report), GamestatError> {
    config.validate()?;
    let (frame, summary) = clean(dataset)?;
    let report = Report::build(&frame, summary, config)?;
    Ok((frame, report))
}
