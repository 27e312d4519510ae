//! Scale calibration
//!
//! Converts pixel lengths and areas measured on the plan bitmap into
//! real-world units. The scale is stored as pixels per real-world unit and is
//! always strictly positive.

use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Lower bound applied to the scale before dividing
const SCALE_EPSILON: f64 = 1e-12;

/// Real-world length unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    #[default]
    Meter,
    Foot,
    Centimeter,
    Millimeter,
    Inch,
    Yard,
    /// Any other unit, identified by its symbol
    Custom(String),
}

impl Unit {
    /// Units offered for calibration, in picker order
    pub const COMMON: [Unit; 6] = [
        Unit::Meter,
        Unit::Foot,
        Unit::Centimeter,
        Unit::Millimeter,
        Unit::Inch,
        Unit::Yard,
    ];

    pub fn symbol(&self) -> &str {
        match self {
            Unit::Meter => "m",
            Unit::Foot => "ft",
            Unit::Centimeter => "cm",
            Unit::Millimeter => "mm",
            Unit::Inch => "in",
            Unit::Yard => "yd",
            Unit::Custom(symbol) => symbol,
        }
    }

    /// Symbol for the squared unit, e.g. `m^2`
    pub fn area_symbol(&self) -> String {
        format!("{}^2", self.symbol())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = s.trim();
        let unit = match symbol.to_ascii_lowercase().as_str() {
            "" => return Err(CalibrationError::EmptyUnit),
            "m" | "meter" | "meters" | "metre" | "metres" => Unit::Meter,
            "ft" | "foot" | "feet" => Unit::Foot,
            "cm" => Unit::Centimeter,
            "mm" => Unit::Millimeter,
            "in" | "inch" | "inches" => Unit::Inch,
            "yd" | "yard" | "yards" => Unit::Yard,
            _ => Unit::Custom(symbol.to_string()),
        };
        Ok(unit)
    }
}

impl serde::Serialize for Unit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> serde::Deserialize<'de> for Unit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbol = String::deserialize(deserializer)?;
        symbol.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("draw a reference line first")]
    NonPositivePixelLength(f64),
    #[error("enter a positive length")]
    NonPositiveRealLength(f64),
    #[error("scale must be a positive number of pixels per unit, got {0}")]
    NonPositiveScale(f64),
    #[error("unit symbol must not be empty")]
    EmptyUnit,
}

/// How the current scale was established
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum CalibrationSource {
    /// Never calibrated, 1 pixel per unit
    #[default]
    Default,
    /// Scale entered directly
    Manual,
    /// Reference line of known length drawn on the plan
    Reference { pixel_length: f64, real_length: f64 },
}

/// Pixel-to-unit scale for one session
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pixels_per_unit: f64,
    unit: Unit,
    source: CalibrationSource,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(Unit::default())
    }
}

impl Calibration {
    /// Uncalibrated scale (1 pixel per unit) in the given unit
    pub fn new(unit: Unit) -> Self {
        Self { pixels_per_unit: 1.0, unit, source: CalibrationSource::Default }
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.pixels_per_unit
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn source(&self) -> &CalibrationSource {
        &self.source
    }

    pub fn is_calibrated(&self) -> bool {
        self.source != CalibrationSource::Default
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    /// Convert a pixel length to real-world units
    pub fn to_length(&self, pixel_length: f64) -> f64 {
        pixel_length / self.guarded_scale()
    }

    /// Convert a pixel area to real-world square units
    pub fn to_area(&self, pixel_area: f64) -> f64 {
        let scale = self.guarded_scale();
        pixel_area / (scale * scale)
    }

    /// Derive the scale from a reference line of known real length.
    ///
    /// Both lengths must be positive; on error the calibration is unchanged.
    pub fn set_from_reference(
        &mut self,
        pixel_length: f64,
        real_length: f64,
    ) -> Result<f64, CalibrationError> {
        if pixel_length <= 0.0 || !pixel_length.is_finite() {
            warn!(pixel_length, "rejected calibration: no usable reference line");
            return Err(CalibrationError::NonPositivePixelLength(pixel_length));
        }
        if real_length <= 0.0 || !real_length.is_finite() {
            warn!(real_length, "rejected calibration: reference length not positive");
            return Err(CalibrationError::NonPositiveRealLength(real_length));
        }

        let scale = pixel_length / real_length;
        self.store(scale, CalibrationSource::Reference { pixel_length, real_length })?;
        Ok(scale)
    }

    /// Set the scale directly, with the same positivity guard as a reference line
    pub fn set_pixels_per_unit(&mut self, pixels_per_unit: f64) -> Result<(), CalibrationError> {
        self.store(pixels_per_unit, CalibrationSource::Manual)
    }

    /// Back to 1 pixel per unit, keeping `unit`
    pub fn reset(&mut self, unit: Unit) {
        *self = Self::new(unit);
    }

    fn store(&mut self, scale: f64, source: CalibrationSource) -> Result<(), CalibrationError> {
        // Tiny reference lengths can overflow to infinity
        if scale <= 0.0 || !scale.is_finite() {
            warn!(scale, "rejected non-positive scale");
            return Err(CalibrationError::NonPositiveScale(scale));
        }

        self.pixels_per_unit = scale;
        self.source = source;
        info!(pixels_per_unit = scale, unit = %self.unit, "calibration updated");
        Ok(())
    }

    fn guarded_scale(&self) -> f64 {
        self.pixels_per_unit.max(SCALE_EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let calibration = Calibration::default();
        assert_eq!(calibration.pixels_per_unit(), 1.0);
        assert_eq!(calibration.unit(), &Unit::Meter);
        assert!(!calibration.is_calibrated());
        assert_eq!(calibration.to_length(42.0), 42.0);
    }

    #[test]
    fn test_to_length_and_area() {
        let mut calibration = Calibration::default();
        calibration.set_pixels_per_unit(100.0).unwrap();

        assert_eq!(calibration.to_length(250.0), 2.5);
        assert_eq!(calibration.to_area(20_000.0), 2.0);
        assert_eq!(calibration.source(), &CalibrationSource::Manual);
    }

    #[test]
    fn test_set_from_reference() {
        let mut calibration = Calibration::default();
        let scale = calibration.set_from_reference(200.0, 2.0).unwrap();

        assert_eq!(scale, 100.0);
        assert_eq!(calibration.pixels_per_unit(), 100.0);
        assert_eq!(
            calibration.source(),
            &CalibrationSource::Reference { pixel_length: 200.0, real_length: 2.0 }
        );
    }

    #[test]
    fn test_set_from_reference_rejects_non_positive_inputs() {
        let mut calibration = Calibration::default();
        calibration.set_pixels_per_unit(40.0).unwrap();

        assert_eq!(
            calibration.set_from_reference(0.0, 5.0),
            Err(CalibrationError::NonPositivePixelLength(0.0))
        );
        assert_eq!(
            calibration.set_from_reference(5.0, 0.0),
            Err(CalibrationError::NonPositiveRealLength(0.0))
        );
        assert!(calibration.set_from_reference(5.0, -1.0).is_err());
        assert!(calibration.set_from_reference(f64::NAN, 1.0).is_err());

        assert_eq!(calibration.pixels_per_unit(), 40.0);
        assert_eq!(calibration.source(), &CalibrationSource::Manual);
    }

    #[test]
    fn test_set_from_reference_rejects_overflowing_scale() {
        let mut calibration = Calibration::default();
        let result = calibration.set_from_reference(f64::MAX, 1e-300);

        assert!(matches!(result, Err(CalibrationError::NonPositiveScale(_))));
        assert_eq!(calibration.pixels_per_unit(), 1.0);
    }

    #[test]
    fn test_direct_entry_guard() {
        let mut calibration = Calibration::default();
        assert!(calibration.set_pixels_per_unit(0.0).is_err());
        assert!(calibration.set_pixels_per_unit(-3.0).is_err());
        assert_eq!(calibration.pixels_per_unit(), 1.0);
        assert!(!calibration.is_calibrated());
    }

    #[test]
    fn test_reset_keeps_requested_unit() {
        let mut calibration = Calibration::new(Unit::Foot);
        calibration.set_from_reference(120.0, 10.0).unwrap();
        calibration.reset(Unit::Inch);

        assert_eq!(calibration, Calibration::new(Unit::Inch));
    }

    #[test]
    fn test_unit_symbols() {
        assert_eq!(Unit::Meter.area_symbol(), "m^2");
        assert_eq!(Unit::Foot.to_string(), "ft");
        assert_eq!("feet".parse::<Unit>().unwrap(), Unit::Foot);
        assert_eq!("M".parse::<Unit>().unwrap(), Unit::Meter);
        assert_eq!("chain".parse::<Unit>().unwrap(), Unit::Custom("chain".to_string()));
        assert_eq!(Unit::Custom("chain".into()).area_symbol(), "chain^2");
        assert!("  ".parse::<Unit>().is_err());
    }

    #[test]
    fn test_common_units_parse_from_their_symbols() {
        for unit in Unit::COMMON {
            assert_eq!(unit.symbol().parse::<Unit>().unwrap(), unit);
            assert!(!matches!(unit, Unit::Custom(_)));
        }
    }

    #[test]
    fn test_unit_serde_uses_symbol() {
        let json = serde_json::to_string(&Unit::Yard).unwrap();
        assert_eq!(json, "\"yd\"");
        let unit: Unit = serde_json::from_str("\"mm\"").unwrap();
        assert_eq!(unit, Unit::Millimeter);
    }
}
