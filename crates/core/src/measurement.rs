//! Measurement records and the quantity ledger
//!
//! Every saved takeoff quantity becomes an immutable [`Measurement`] appended
//! to the session's [`MeasurementLedger`]. Values are stored in real-world
//! units (or as a raw count).

use std::fmt;
use tracing::{info, warn};

/// Unique identifier for measurements
pub type MeasurementId = uuid::Uuid;

/// Display unit of count measurements
pub const COUNT_UNIT: &str = "each";

/// Kind of quantity being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    /// Length along a drawn path
    Length,
    /// Area enclosed by a drawn path
    Area,
    /// Number of items
    Count,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 3] =
        [MeasurementKind::Length, MeasurementKind::Area, MeasurementKind::Count];

    pub fn name(&self) -> &'static str {
        match self {
            MeasurementKind::Length => "length",
            MeasurementKind::Area => "area",
            MeasurementKind::Count => "count",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("measurement value must not be negative, got {0}")]
    NegativeValue(f64),
    #[error("measurement value must be a finite number")]
    NonFiniteValue,
}

/// A recorded quantity
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Measurement {
    id: MeasurementId,
    kind: MeasurementKind,
    label: String,
    value_unit: String,
    value: f64,
    page: u32,
}

impl Measurement {
    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value_unit(&self) -> &str {
        &self.value_unit
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Source page index (0-based)
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Value with its unit, e.g. `2.50 m^2`
    pub fn formatted(&self) -> String {
        match self.kind {
            MeasurementKind::Count => format!("{} {}", self.value, self.value_unit),
            MeasurementKind::Length | MeasurementKind::Area => {
                format!("{:.2} {}", self.value, self.value_unit)
            }
        }
    }
}

/// Per-kind sums over a ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct LedgerTotals {
    pub length: f64,
    pub area: f64,
    pub count: f64,
}

impl LedgerTotals {
    pub fn get(&self, kind: MeasurementKind) -> f64 {
        match kind {
            MeasurementKind::Length => self.length,
            MeasurementKind::Area => self.area,
            MeasurementKind::Count => self.count,
        }
    }
}

/// Append-only, ordered collection of measurements
#[derive(Debug, Default, Clone)]
pub struct MeasurementLedger {
    records: Vec<Measurement>,
}

impl MeasurementLedger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement at the end of the ledger.
    ///
    /// A blank label falls back to the kind name. Units are taken as given.
    pub fn append(
        &mut self,
        kind: MeasurementKind,
        label: &str,
        value_unit: impl Into<String>,
        value: f64,
        page: u32,
    ) -> Result<&Measurement, LedgerError> {
        if !value.is_finite() {
            warn!(%kind, "rejected non-finite measurement value");
            return Err(LedgerError::NonFiniteValue);
        }
        if value < 0.0 {
            warn!(%kind, value, "rejected negative measurement value");
            return Err(LedgerError::NegativeValue(value));
        }

        let label = label.trim();
        let label = if label.is_empty() { kind.name() } else { label };

        let measurement = Measurement {
            id: MeasurementId::new_v4(),
            kind,
            label: label.to_string(),
            value_unit: value_unit.into(),
            value,
            page,
        };
        info!(
            %kind,
            label = %measurement.label,
            value,
            unit = %measurement.value_unit,
            page,
            "measurement recorded"
        );

        self.records.push(measurement);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Sum of values of the given kind, 0.0 when there are none
    pub fn aggregate(&self, kind: MeasurementKind) -> f64 {
        self.records.iter().filter(|m| m.kind == kind).map(|m| m.value).sum()
    }

    /// Sums for every kind in one pass
    pub fn totals(&self) -> LedgerTotals {
        let mut totals = LedgerTotals::default();
        for m in &self.records {
            match m.kind {
                MeasurementKind::Length => totals.length += m.value,
                MeasurementKind::Area => totals.area += m.value,
                MeasurementKind::Count => totals.count += m.value,
            }
        }
        totals
    }

    /// Remove every record
    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            info!(removed = self.records.len(), "ledger cleared");
        }
        self.records.clear();
    }

    /// Records in insertion order
    pub fn all(&self) -> &[Measurement] {
        &self.records
    }

    /// Records taken from one page, in insertion order
    pub fn for_page(&self, page: u32) -> impl Iterator<Item = &Measurement> {
        self.records.iter().filter(move |m| m.page == page)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
