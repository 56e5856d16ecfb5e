use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sheet_template::{RowTolerance, SheetTemplate};

/// Every tunable of the scoring pipeline. Passed explicitly to each stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub preprocess: PreprocessOptions,
    pub template: SheetTemplate,
    pub mark_thresholds: MarkThresholds,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreprocessOptions {
    /// Gaussian blur kernel edge length (odd). Larger values smooth more scan noise
    /// but also soften thin bubble outlines.
    pub blur_kernel_size: u32,

    /// Neighbourhood edge length (odd) for the local threshold. Should be smaller
    /// than a bubble so that ink edges stand out against the paper around them.
    pub threshold_block_size: u32,

    /// Subtracted from the local mean before comparison. Higher values drop faint
    /// marks and paper texture.
    pub threshold_offset: i32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            blur_kernel_size: 5,
            threshold_block_size: 11,
            threshold_offset: 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkThresholds {
    /// A bubble counts as marked only when its fill ratio is strictly greater
    /// than this.
    pub fill: f64,
}

impl Default for MarkThresholds {
    fn default() -> Self {
        Self { fill: 0.4 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ScoringConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ScoringConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let preprocess = &self.preprocess;
        if preprocess.blur_kernel_size == 0 || preprocess.blur_kernel_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "blurKernelSize must be odd, got {}",
                preprocess.blur_kernel_size
            )));
        }
        if preprocess.threshold_block_size < 3 || preprocess.threshold_block_size % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "thresholdBlockSize must be odd and at least 3, got {}",
                preprocess.threshold_block_size
            )));
        }

        let template = &self.template;
        if template.question_columns == 0 || template.options_per_question == 0 {
            return Err(ConfigError::Invalid(
                "questionColumns and optionsPerQuestion must be positive".to_string(),
            ));
        }
        if template.options_per_question > 26 {
            return Err(ConfigError::Invalid(format!(
                "optionsPerQuestion must be at most 26, got {}",
                template.options_per_question
            )));
        }
        let bubble = &template.bubble;
        if bubble.min_size.width > bubble.max_size.width
            || bubble.min_size.height > bubble.max_size.height
            || bubble.min_size.height == 0
        {
            return Err(ConfigError::Invalid(format!(
                "bubble size bounds are inconsistent: {:?} to {:?}",
                bubble.min_size, bubble.max_size
            )));
        }
        if bubble.min_aspect_ratio > bubble.max_aspect_ratio {
            return Err(ConfigError::Invalid(format!(
                "bubble aspect ratio bounds are inverted: {} > {}",
                bubble.min_aspect_ratio, bubble.max_aspect_ratio
            )));
        }

        let tolerance_is_positive = match template.row_tolerance {
            RowTolerance::RelativeToHeight { factor } => factor > 0.0,
            RowTolerance::Fixed { pixels } => pixels > 0,
        };
        if !tolerance_is_positive {
            return Err(ConfigError::Invalid(format!(
                "rowTolerance must be positive, got {:?}",
                template.row_tolerance
            )));
        }

        if !(0.0..=1.0).contains(&self.mark_thresholds.fill) {
            return Err(ConfigError::Invalid(format!(
                "fill threshold must be within [0, 1], got {}",
                self.mark_thresholds.fill
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScoringConfig::default();
        assert_eq!(config.preprocess.blur_kernel_size, 5);
        assert_eq!(config.preprocess.threshold_block_size, 11);
        assert_eq!(config.preprocess.threshold_offset, 2);
        assert_eq!(config.template.question_columns, 4);
        assert_eq!(config.template.options_per_question, 4);
        assert_eq!(config.mark_thresholds.fill, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: ScoringConfig = serde_json::from_str(
            r#"{
                "template": {
                    "questionColumns": 5,
                    "bubble": { "maxSize": { "width": 80, "height": 80 } },
                    "rowTolerance": { "type": "fixed", "pixels": 10 }
                },
                "markThresholds": { "fill": 0.55 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.template.question_columns, 5);
        assert_eq!(config.template.options_per_question, 4);
        assert_eq!(config.template.bubble.max_size.width, 80);
        assert_eq!(config.template.bubble.min_size.width, 20);
        assert_eq!(
            config.template.row_tolerance,
            RowTolerance::Fixed { pixels: 10 }
        );
        assert_eq!(config.mark_thresholds.fill, 0.55);
        assert_eq!(config.preprocess, PreprocessOptions::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ScoringConfig::default();
        config.preprocess.threshold_block_size = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ScoringConfig::default();
        config.template.options_per_question = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ScoringConfig::default();
        config.mark_thresholds.fill = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ScoringConfig::default();
        config.template.bubble.min_aspect_ratio = 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_positive_row_tolerance() {
        for row_tolerance in [
            RowTolerance::RelativeToHeight { factor: 0.0 },
            RowTolerance::RelativeToHeight { factor: -0.5 },
            RowTolerance::RelativeToHeight { factor: f32::NAN },
            RowTolerance::Fixed { pixels: 0 },
        ] {
            let mut config = ScoringConfig::default();
            config.template.row_tolerance = row_tolerance;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{:?} accepted",
                row_tolerance
            );
        }

        let mut config = ScoringConfig::default();
        config.template.row_tolerance = RowTolerance::Fixed { pixels: 1 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "preprocess": {{ "blurKernelSize": 3 }} }}"#).unwrap();
        let config = ScoringConfig::load(file.path()).unwrap();
        assert_eq!(config.preprocess.blur_kernel_size, 3);
        assert_eq!(config.preprocess.threshold_block_size, 11);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ScoringConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
