use logging_timer::time;

use crate::bubbles::BubbleCandidate;
use crate::sheet_template::SheetTemplate;
use crate::types::QuestionNumber;

/// One question's bubbles in option order (A, B, C, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct Question {
    pub number: QuestionNumber,
    pub bubbles: Vec<BubbleCandidate>,
}

/// Groups candidates into visual rows, top to bottom, each sorted left to right.
///
/// A candidate starts a new row when its top edge is at least the template's row
/// tolerance below the top edge of the first candidate in the current row.
pub fn group_into_rows(
    mut candidates: Vec<BubbleCandidate>,
    template: &SheetTemplate,
) -> Vec<Vec<BubbleCandidate>> {
    candidates.sort_by_key(|c| (c.bounds.top(), c.bounds.left()));

    let mut rows: Vec<Vec<BubbleCandidate>> = vec![];
    let mut current: Vec<BubbleCandidate> = vec![];
    for candidate in candidates {
        let starts_new_row = match current.first() {
            Some(first) => {
                let offset = (candidate.bounds.top() - first.bounds.top()).abs() as f32;
                offset >= template.row_tolerance.limit_for(&candidate.bounds)
            }
            None => false,
        };
        if starts_new_row {
            rows.push(std::mem::take(&mut current));
        }
        current.push(candidate);
    }
    if !current.is_empty() {
        rows.push(current);
    }

    for row in rows.iter_mut() {
        row.sort_by_key(|c| c.bounds.left());
    }
    rows
}

/// Slices each row into per-question chunks and numbers them column by column:
/// every row's first chunk top to bottom, then every row's second chunk, and so
/// on. A row too short to hold a chunk for some column contributes nothing to
/// that column.
pub fn order_questions(rows: &[Vec<BubbleCandidate>], template: &SheetTemplate) -> Vec<Question> {
    let options = template.options_per_question;
    let mut questions = vec![];
    for column in 0..template.question_columns {
        let start = column * options;
        let end = start + options;
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() < end {
                log::trace!("row {} has no bubbles for column {}", row_index, column);
                continue;
            }
            questions.push(Question {
                number: questions.len() as QuestionNumber + 1,
                bubbles: row[start..end].to_vec(),
            });
        }
    }
    questions
}

/// Arranges bubble candidates into numbered questions following `template`.
#[time]
pub fn organize_questions(candidates: Vec<BubbleCandidate>, template: &SheetTemplate) -> Vec<Question> {
    let rows = group_into_rows(candidates, template);
    let questions = order_questions(&rows, template);
    log::debug!("{} rows arranged into {} questions", rows.len(), questions.len());
    questions
}
