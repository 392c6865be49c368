use crate::error::{InsightsError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How an invoice's VAT and net amount are obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VatMode {
    /// Use extracted VAT/net when the document carries either, otherwise derive.
    #[default]
    Auto,
    /// Always read VAT and net amount from the text.
    Extracted,
    /// Net equals total; VAT is a fixed fraction of the total.
    Derived,
}

/// Configuration handed to every entry point. Nothing here is read from the
/// environment; callers load it explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsightsConfig {
    pub vat_mode: VatMode,

    /// Fraction of the total booked as VAT in derived mode.
    pub derived_vat_rate: f64,

    /// Number of months to forecast past the last observed month.
    pub forecast_horizon: usize,

    /// Standard deviation of the display noise added to each forecast. 0.0 disables it.
    pub noise_sigma: f64,

    /// Seed for reproducible noise.
    pub noise_seed: Option<u64>,

    /// File extensions treated as invoice images in folder batches.
    pub image_extensions: Vec<String>,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            vat_mode: VatMode::Auto,
            derived_vat_rate: 0.10,
            forecast_horizon: 6,
            noise_sigma: 20.0,
            noise_seed: None,
            image_extensions: ["png", "jpg", "jpeg", "tiff", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl InsightsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.derived_vat_rate) {
            return Err(InsightsError::InvalidConfig(format!(
                "derived_vat_rate {} must be between 0.0 and 1.0",
                self.derived_vat_rate
            )));
        }

        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(InsightsError::InvalidConfig(format!(
                "noise_sigma {} must be a non-negative number",
                self.noise_sigma
            )));
        }

        if self.forecast_horizon == 0 {
            return Err(InsightsError::InvalidConfig(
                "forecast_horizon must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_image_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.image_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = InsightsConfig::default();
        assert_eq!(config.vat_mode, VatMode::Auto);
        assert_eq!(config.derived_vat_rate, 0.10);
        assert_eq!(config.forecast_horizon, 6);
        assert_eq!(config.noise_sigma, 20.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InsightsConfig::from_toml_str(
            r#"
vat_mode = "derived"
noise_sigma = 0.0
noise_seed = 42
"#,
        )
        .unwrap();

        assert_eq!(config.vat_mode, VatMode::Derived);
        assert_eq!(config.noise_sigma, 0.0);
        assert_eq!(config.noise_seed, Some(42));
        assert_eq!(config.forecast_horizon, 6);
        assert_eq!(config.image_extensions.len(), 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = InsightsConfig::from_toml_str("derived_vat_rate = 1.5").unwrap_err();
        assert!(matches!(err, InsightsError::InvalidConfig(_)));

        let err = InsightsConfig::from_toml_str("forecast_horizon = 0").unwrap_err();
        assert!(matches!(err, InsightsError::InvalidConfig(_)));

        let err = InsightsConfig::from_toml_str("noise_sigma = -1.0").unwrap_err();
        assert!(matches!(err, InsightsError::InvalidConfig(_)));

        let err = InsightsConfig::from_toml_str("vat_mode = 3").unwrap_err();
        assert!(matches!(err, InsightsError::ConfigParseError(_)));
    }

    #[test]
    fn test_image_extension_match_is_case_insensitive() {
        let config = InsightsConfig::default();
        assert!(config.is_image_file(Path::new("scans/INV-001.PNG")));
        assert!(config.is_image_file(Path::new("scan.jpeg")));
        assert!(!config.is_image_file(Path::new("notes.txt")));
        assert!(!config.is_image_file(Path::new("README")));
    }
}
