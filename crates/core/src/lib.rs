//! Plan takeoff core
//!
//! Measures lengths, areas and counts off a plan bitmap: pixel geometry,
//! scale calibration, active path extraction from the drawing surface, and
//! the measurement ledger, tied together by [`TakeoffSession`].

pub mod calibration;
pub mod config;
pub mod csv_export;
pub mod drawing;
pub mod geometry;
pub mod measurement;
pub mod plan;
pub mod session;

pub use calibration::{Calibration, CalibrationError, CalibrationSource, Unit};
pub use config::{ConfigError, TakeoffConfig};
pub use csv_export::{export_ledger_csv, ledger_to_csv_string, CsvExportConfig, CsvExportError};
pub use drawing::{extract_active_path, DrawingSurface, SegmentKind, Shape};
pub use geometry::{distance, polygon_area, polyline_length, PixelPoint};
pub use measurement::{
    LedgerError, LedgerTotals, Measurement, MeasurementId, MeasurementKind, MeasurementLedger,
    COUNT_UNIT,
};
pub use plan::{load_plan, Plan, PlanError, PlanKind, PlanSource};
pub use session::{ActionOutcome, SessionState, TakeoffError, TakeoffSession, Tool, ToolAction};
