use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::score::ScoreResult;

/// Misspellings seen in answer key headers, corrected before storage.
const KNOWN_SUBJECT_TYPOS: &[(&str, &str)] = &[("satistics", "statistics")];

/// Storage column for a subject score: `" Data Satistics"` becomes
/// `"data_statistics_score"`.
pub fn storage_column(subject: &str) -> String {
    let mut column = subject.trim().to_lowercase().replace(' ', "_");
    for (typo, correction) in KNOWN_SUBJECT_TYPOS {
        column = column.replace(typo, correction);
    }
    format!("{}_score", column)
}

/// Flattens a result into storage columns.
pub fn storage_row(result: &ScoreResult) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("student_name".to_string(), Value::from(result.student_name.clone()));
    row.insert("set_name".to_string(), Value::from(result.set_name.clone()));
    row.insert("total_score".to_string(), Value::from(result.total_score));
    for (subject, score) in result.subject_scores.iter() {
        row.insert(storage_column(subject.as_str()), Value::from(*score));
    }
    row
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("unable to write results to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Somewhere finished results are kept.
pub trait ResultSink {
    fn save(&mut self, result: &ScoreResult) -> Result<(), SinkError>;
}

/// Appends one JSON object per line, keyed by storage column.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn open(&self) -> Result<File, SinkError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

impl ResultSink for JsonLinesSink {
    fn save(&mut self, result: &ScoreResult) -> Result<(), SinkError> {
        let line = serde_json::to_string(&storage_row(result))?;
        let mut writer = BufWriter::new(self.open()?);
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
        log::info!(
            "saved results for {} to {}",
            result.student_name,
            self.path.display()
        );
        Ok(())
    }
}
