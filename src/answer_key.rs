use std::collections::BTreeMap;

use logging_timer::time;

use crate::types::{OptionLetter, QuestionNumber, SubjectName};
use crate::workbook::{Sheet, Workbook, WorkbookError};

/// The authoritative answer for one question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerKeyEntry {
    pub question: QuestionNumber,
    /// One or more acceptable letters, comma separated, any case.
    pub answer: String,
    pub subject: SubjectName,
}

impl AnswerKeyEntry {
    /// Whether `letter` is one of the acceptable answers.
    pub fn accepts(&self, letter: OptionLetter) -> bool {
        self.answer.split(',').any(|token| letter.matches(token))
    }
}

pub type AnswerKey = BTreeMap<QuestionNumber, AnswerKeyEntry>;

/// Which sheet an answer key came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySheetSelection {
    Requested,
    /// The requested sheet could not be used; the first sheet was used instead.
    Fallback { requested: String, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedAnswerKey {
    pub entries: AnswerKey,
    /// Subjects in column order.
    pub subjects: Vec<SubjectName>,
    pub sheet_name: String,
    pub selection: KeySheetSelection,
}

#[derive(Debug, thiserror::Error)]
pub enum AnswerKeyError {
    #[error("no usable answer key sheet (requested {requested:?}): {source}")]
    KeySourceUnavailable {
        requested: String,
        #[source]
        source: WorkbookError,
    },
}

/// Parses a `"<question>-<answer>"` cell. Returns `None` for anything else.
pub fn parse_key_cell(cell: &str) -> Option<(QuestionNumber, String)> {
    let (question, answer) = cell.split_once('-')?;
    let question = question.trim().parse::<QuestionNumber>().ok()?;
    Some((question, answer.trim().to_string()))
}

/// Subject names from the header row. Blank headers get a positional name and
/// repeated headers are suffixed with `.1`, `.2`, ...
fn subject_names(header: &[Option<String>]) -> Vec<SubjectName> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    header
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let name = match cell.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => format!("Unnamed: {}", index),
            };
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            SubjectName::from(unique)
        })
        .collect()
}

/// Reads the answer key out of a sheet: first row is subjects, every other
/// non-empty cell is a question entry for its column's subject. Cells that do
/// not parse are skipped. A question listed twice keeps its last entry.
pub fn answer_key_from_sheet(sheet: &Sheet) -> (AnswerKey, Vec<SubjectName>) {
    let mut rows = sheet.rows.iter();
    let subjects = rows.next().map(|header| subject_names(header)).unwrap_or_default();
    let body = rows.collect::<Vec<&Vec<Option<String>>>>();

    let mut entries = AnswerKey::new();
    for (column, subject) in subjects.iter().enumerate() {
        for cell in body.iter().filter_map(|row| row.get(column)?.as_deref()) {
            match parse_key_cell(cell) {
                Some((question, answer)) => {
                    entries.insert(
                        question,
                        AnswerKeyEntry {
                            question,
                            answer,
                            subject: subject.clone(),
                        },
                    );
                }
                None => log::debug!("skipping malformed key cell {:?} under {}", cell, subject),
            }
        }
    }
    (entries, subjects)
}

/// Loads the answer key for `set_name`, falling back to the workbook's first
/// sheet when that sheet is missing or unreadable.
#[time]
pub fn load_answer_key<W: Workbook>(workbook: &mut W, set_name: &str) -> Result<LoadedAnswerKey, AnswerKeyError> {
    let (sheet_name, sheet, selection) = match workbook.read_sheet(set_name) {
        Ok(sheet) => {
            log::info!("loaded answer key from sheet {:?}", set_name);
            (set_name.to_string(), sheet, KeySheetSelection::Requested)
        }
        Err(requested_error) => {
            let first = workbook.sheet_names().into_iter().next().ok_or_else(|| {
                AnswerKeyError::KeySourceUnavailable {
                    requested: set_name.to_string(),
                    source: WorkbookError::NoSheets,
                }
            })?;
            log::warn!(
                "answer key sheet {:?} unavailable ({}), falling back to first sheet {:?}",
                set_name,
                requested_error,
                first
            );
            let sheet = workbook
                .read_sheet(&first)
                .map_err(|source| AnswerKeyError::KeySourceUnavailable {
                    requested: set_name.to_string(),
                    source,
                })?;
            (
                first,
                sheet,
                KeySheetSelection::Fallback {
                    requested: set_name.to_string(),
                    reason: requested_error.to_string(),
                },
            )
        }
    };

    let (entries, subjects) = answer_key_from_sheet(&sheet);
    log::debug!(
        "answer key {:?}: {} questions across {} subjects",
        sheet_name,
        entries.len(),
        subjects.len()
    );
    Ok(LoadedAnswerKey {
        entries,
        subjects,
        sheet_name,
        selection,
    })
}
