use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::GamestatError;
use crate::aggregate::{Dimension, Measure};
use crate::hypothesis::DEFAULT_ALPHA;

/// One pairwise comparison of group means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisConfig {
    pub dimension: Dimension,
    pub first: String,
    pub second: String,
    #[serde(default = "default_measure")]
    pub measure: Measure,
}

fn default_measure() -> Measure {
    Measure::UserScore
}

impl HypothesisConfig {
    pub fn new(dimension: Dimension, first: &str, second: &str, measure: Measure) -> Self {
        HypothesisConfig {
            dimension,
            first: first.to_string(),
            second: second.to_string(),
            measure,
        }
    }
}

/// Parameters of the analysis stage. Every field has a default, so a config file only
/// needs the fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub first_year: i32,
    pub last_year: i32,
    /// Platforms in the actual period. `None` means every platform still selling in
    /// `reference_year`.
    pub platforms: Option<Vec<String>>,
    /// Defaults to the latest year in the data.
    pub reference_year: Option<i32>,
    pub alpha: f64,
    pub top_n: usize,
    /// Length of the lifetime platform ranking.
    pub top_platforms: usize,
    pub hypotheses: Vec<HypothesisConfig>,
    pub correlation_platforms: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            first_year: 2012,
            last_year: 2016,
            platforms: None,
            reference_year: None,
            alpha: DEFAULT_ALPHA,
            top_n: 5,
            top_platforms: 10,
            hypotheses: vec![
                HypothesisConfig::new(Dimension::Platform, "XOne", "PC", Measure::UserScore),
                HypothesisConfig::new(Dimension::Genre, "Action", "Sports", Measure::UserScore),
            ],
            correlation_platforms: ["PS4", "PS3", "XOne", "3DS"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self, GamestatError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GamestatError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), GamestatError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(GamestatError::Config(format!(
                "alpha must lie strictly between 0 and 1, got {}",
                self.alpha
            )));
        }
        if self.first_year > self.last_year {
            return Err(GamestatError::Config(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        if self.top_n == 0 {
            return Err(GamestatError::Config("top_n must be at least 1".to_string()));
        }
        if self.top_platforms == 0 {
            return Err(GamestatError::Config(
                "top_platforms must be at least 1".to_string(),
            ));
        }
        if let Some(platforms) = &self.platforms {
            if platforms.is_empty() {
                return Err(GamestatError::Config(
                    "platforms, when given, must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Region;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hypotheses.len(), 2);
        assert_eq!(config.alpha, 0.05);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "first_year": 2014,
                "platforms": ["PS4", "XOne"],
                "hypotheses": [
                    {"dimension": "genre", "first": "Shooter", "second": "RPG"},
                    {"dimension": "platform", "first": "PS4", "second": "XOne",
                     "measure": {"region_sales": "japan"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.first_year, 2014);
        assert_eq!(config.last_year, 2016);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.top_platforms, 10);
        assert_eq!(config.hypotheses[0].measure, Measure::UserScore);
        assert_eq!(
            config.hypotheses[1].measure,
            Measure::RegionSales(Region::Japan)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{"alpha": 1.5}"#,
            r#"{"first_year": 2017, "last_year": 2016}"#,
            r#"{"top_n": 0}"#,
            r#"{"top_platforms": 0}"#,
            r#"{"platforms": []}"#,
        ] {
            assert!(matches!(
                AnalysisConfig::from_json_str(json),
                Err(GamestatError::Config(_))
            ));
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AnalysisConfig::from_json_str("{"),
            Err(GamestatError::Json(_))
        ));
    }
}
