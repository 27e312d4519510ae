//! CSV export for the measurement ledger
//!
//! Writes the quantity table for reporting and estimating tools.

use crate::measurement::{Measurement, MeasurementLedger};
use std::io::Write;

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type CsvExportResult<T> = Result<T, CsvExportError>;

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Export only records from specific pages (None = all pages)
    pub page_filter: Option<Vec<u32>>,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self { include_headers: true, delimiter: b',', page_filter: None }
    }
}

/// Export the ledger to CSV in insertion order
///
/// CSV columns:
/// - Kind: length, area or count
/// - Label: User-provided label
/// - Unit: Display unit (e.g. "m", "m^2", "each")
/// - Value: Quantity in real-world units
/// - Page: Source page index (0-based)
pub fn export_ledger_csv<W: Write>(
    writer: W,
    ledger: &MeasurementLedger,
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record(["Kind", "Label", "Unit", "Value", "Page"])?;
    }

    let rows = ledger.all().iter().filter(|m| match config.page_filter {
        Some(ref pages) => pages.contains(&m.page()),
        None => true,
    });

    for measurement in rows {
        csv_writer.write_record(&record_fields(measurement))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export the ledger to a CSV string
pub fn ledger_to_csv_string(
    ledger: &MeasurementLedger,
    config: &CsvExportConfig,
) -> CsvExportResult<String> {
    let mut buffer = Vec::new();
    export_ledger_csv(&mut buffer, ledger, config)?;
    // Every field written above is valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn record_fields(measurement: &Measurement) -> [String; 5] {
    [
        measurement.kind().to_string(),
        measurement.label().to_string(),
        measurement.value_unit().to_string(),
        measurement.value().to_string(),
        measurement.page().to_string(),
    ]
}
