//! Takeoff configuration
//!
//! Session defaults (unit, PDF rasterization DPI, starting page). Can be
//! loaded from a file, environment variables, or created programmatically.

use crate::calibration::Unit;
use std::fs;
use std::io;
use std::path::Path;

/// Default rasterization resolution for PDF pages
pub const DEFAULT_PDF_DPI: f32 = 150.0;

/// Session defaults
#[derive(Debug, Clone, PartialEq)]
pub struct TakeoffConfig {
    /// Unit a fresh or reset calibration starts in
    pub default_unit: Unit,
    /// Resolution PDF pages are rendered at
    pub pdf_dpi: f32,
    /// Page opened when a PDF is loaded (0-based)
    pub default_page: u32,
}

impl Default for TakeoffConfig {
    fn default() -> Self {
        Self { default_unit: Unit::Meter, pdf_dpi: DEFAULT_PDF_DPI, default_page: 0 }
    }
}

impl TakeoffConfig {
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.default_unit = unit;
        self
    }

    /// Sets the PDF DPI; non-positive values are rejected.
    pub fn with_pdf_dpi(mut self, dpi: f32) -> Result<Self, ConfigError> {
        if !(dpi > 0.0 && dpi.is_finite()) {
            return Err(ConfigError::InvalidValue("pdf_dpi".to_string()));
        }
        self.pdf_dpi = dpi;
        Ok(self)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.default_page = page;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TAKEOFF_UNIT`: unit symbol (default: m)
    /// - `TAKEOFF_PDF_DPI`: PDF render DPI (default: 150)
    /// - `TAKEOFF_PAGE`: starting page, 0-based (default: 0)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TAKEOFF_UNIT") {
            config.default_unit = parse_unit("TAKEOFF_UNIT", &val)?;
        }

        if let Ok(val) = std::env::var("TAKEOFF_PDF_DPI") {
            config.pdf_dpi = parse_dpi("TAKEOFF_PDF_DPI", &val)?;
        }

        if let Ok(val) = std::env::var("TAKEOFF_PAGE") {
            config.default_page = parse_page("TAKEOFF_PAGE", &val)?;
        }

        Ok(config)
    }

    /// Loads configuration from a `key = value` file.
    ///
    /// Expected file format:
    /// ```text
    /// unit = "ft"
    /// pdf_dpi = 200
    /// page = 0
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::parse(&contents, Self::default())
    }

    /// Applies the keys present in `contents` on top of `base`
    pub fn parse(contents: &str, base: Self) -> Result<Self, ConfigError> {
        let mut config = base;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "unit" => config.default_unit = parse_unit(key, value)?,
                    "pdf_dpi" => config.pdf_dpi = parse_dpi(key, value)?,
                    "page" => config.default_page = parse_page(key, value)?,
                    _ => {} // Ignore unknown keys
                }
            }
        }

        Ok(config)
    }

    /// Saves configuration to a file readable by [`TakeoffConfig::from_file`].
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_text())?;
        Ok(())
    }

    fn to_text(&self) -> String {
        format!(
            "# Takeoff configuration\n\
             unit = \"{}\"\n\
             pdf_dpi = {}\n\
             page = {}\n",
            self.default_unit, self.pdf_dpi, self.default_page
        )
    }
}

fn parse_unit(key: &str, value: &str) -> Result<Unit, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_dpi(key: &str, value: &str) -> Result<f32, ConfigError> {
    let dpi: f32 = value.parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
    if !(dpi > 0.0 && dpi.is_finite()) {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(dpi)
}

fn parse_page(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_KEYS: [&str; 3] = ["TAKEOFF_UNIT", "TAKEOFF_PDF_DPI", "TAKEOFF_PAGE"];

    #[test]
    fn test_default_config() {
        let config = TakeoffConfig::default();
        assert_eq!(config.default_unit, Unit::Meter);
        assert_eq!(config.pdf_dpi, 150.0);
        assert_eq!(config.default_page, 0);
    }

    #[test]
    fn test_builder_methods() {
        let config = TakeoffConfig::default()
            .with_unit(Unit::Foot)
            .with_page(3)
            .with_pdf_dpi(300.0)
            .unwrap();

        assert_eq!(config.default_unit, Unit::Foot);
        assert_eq!(config.pdf_dpi, 300.0);
        assert_eq!(config.default_page, 3);
        assert!(TakeoffConfig::default().with_pdf_dpi(0.0).is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&ENV_KEYS);

        env::set_var("TAKEOFF_UNIT", "ft");
        env::set_var("TAKEOFF_PDF_DPI", "96");
        env::set_var("TAKEOFF_PAGE", "2");

        let config = TakeoffConfig::from_env().unwrap();
        assert_eq!(config.default_unit, Unit::Foot);
        assert_eq!(config.pdf_dpi, 96.0);
        assert_eq!(config.default_page, 2);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&ENV_KEYS);

        env::remove_var("TAKEOFF_UNIT");
        env::remove_var("TAKEOFF_PAGE");
        env::set_var("TAKEOFF_PDF_DPI", "200");

        let config = TakeoffConfig::from_env().unwrap();
        assert_eq!(config.pdf_dpi, 200.0);
        assert_eq!(config.default_unit, Unit::Meter); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&ENV_KEYS);

        env::remove_var("TAKEOFF_UNIT");
        env::remove_var("TAKEOFF_PAGE");
        env::set_var("TAKEOFF_PDF_DPI", "-10");

        let err = TakeoffConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "TAKEOFF_PDF_DPI"));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_parse_partial_and_unknown_keys() {
        let text = r#"
            # site plan defaults
            unit = "yd"
            colour = "blue"
        "#;

        let config = TakeoffConfig::parse(text, TakeoffConfig::default()).unwrap();
        assert_eq!(config.default_unit, Unit::Yard);
        assert_eq!(config.pdf_dpi, DEFAULT_PDF_DPI);
    }

    #[test]
    fn test_parse_invalid_page() {
        let err = TakeoffConfig::parse("page = -1", TakeoffConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "page"));
    }

    #[test]
    fn test_file_save_and_load() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("takeoff.conf");

        let config = TakeoffConfig::default()
            .with_unit(Unit::Custom("chain".into()))
            .with_page(4)
            .with_pdf_dpi(72.5)
            .unwrap();
        config.save_to_file(&path).unwrap();

        let loaded = TakeoffConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
