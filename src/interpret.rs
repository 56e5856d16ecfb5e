use std::path::Path;

use image::{DynamicImage, GrayImage};
use logging_timer::time;

use crate::answer_key::{load_answer_key, AnswerKeyError, KeySheetSelection, LoadedAnswerKey};
use crate::bubbles::find_bubble_candidates;
use crate::classify::{classify_questions, student_answers, StudentAnswers};
use crate::config::ScoringConfig;
use crate::debug::{
    draw_candidates_debug_image_mut, draw_question_marks_debug_image_mut, ImageDebugWriter,
};
use crate::layout::organize_questions;
use crate::metadata::{normalize_set_label, SheetMetadata};
use crate::preprocess::{load_sheet_image, preprocess, ImageReadError};
use crate::score::{score_answers, ScoreResult};
use crate::workbook::{Workbook, XlsxWorkbook};

#[derive(Debug, Clone)]
pub struct InterpretOptions {
    pub debug: bool,
    pub config: ScoringConfig,
}

/// Something the caller should know about a successful evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// No bubble-shaped contours were found at all, which usually means the
    /// template does not fit the scan. The sheet scored zero everywhere.
    NoBubblesDetected,
    /// The requested answer key sheet was replaced by the first sheet.
    KeySheetFallback {
        requested: String,
        used: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub result: ScoreResult,
    pub answers: StudentAnswers,
    pub diagnostics: Vec<Diagnostic>,
}

/// What was read off a preprocessed mask.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetMarks {
    /// Bubble candidates found before organizing them into questions.
    pub candidate_count: usize,
    pub answers: StudentAnswers,
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error(transparent)]
    ImageRead(#[from] ImageReadError),

    #[error(transparent)]
    KeySource(#[from] AnswerKeyError),
}

/// Finds the marked option of every question on a preprocessed mask.
#[time]
pub fn detect_answers(mask: &GrayImage, config: &ScoringConfig, debug: &ImageDebugWriter) -> SheetMarks {
    let template = &config.template;
    let candidates = find_bubble_candidates(mask, &template.bubble);
    let candidate_count = candidates.len();
    if candidate_count == 0 {
        return SheetMarks::default();
    }
    debug.write("candidates", |canvas| {
        draw_candidates_debug_image_mut(canvas, &candidates)
    });

    let questions = organize_questions(candidates, template);
    let marks = classify_questions(mask, &questions, &config.mark_thresholds);
    debug.write("questions", |canvas| {
        draw_question_marks_debug_image_mut(canvas, &questions, &marks)
    });

    for mark in &marks {
        log::trace!(
            "question {}: fill ratios {:?} -> {:?}",
            mark.number,
            mark.fill_ratios,
            mark.choice
        );
    }

    let answers = student_answers(&marks);
    log::info!(
        "{} of {} questions answered",
        answers.len(),
        questions.len()
    );
    SheetMarks {
        candidate_count,
        answers,
    }
}

/// Scores a sheet image that is already in memory against a loaded key.
pub fn evaluate_image(
    image: &DynamicImage,
    image_path: &Path,
    metadata: &SheetMetadata,
    key: &LoadedAnswerKey,
    options: &InterpretOptions,
) -> Result<Evaluation, EvaluateError> {
    let mask = preprocess(image, &options.config.preprocess)?;
    let debug = if options.debug {
        ImageDebugWriter::new(image_path.to_path_buf(), mask.clone())
    } else {
        ImageDebugWriter::disabled()
    };
    debug.write("mask", |_| {});

    let marks = detect_answers(&mask, &options.config, &debug);
    Ok(assemble(metadata, key, marks))
}

fn assemble(metadata: &SheetMetadata, key: &LoadedAnswerKey, marks: SheetMarks) -> Evaluation {
    let SheetMarks {
        candidate_count,
        answers,
    } = marks;
    let mut diagnostics = vec![];
    if candidate_count == 0 {
        log::warn!("no bubbles detected for {}", metadata.student_name);
        diagnostics.push(Diagnostic::NoBubblesDetected);
    }
    if let KeySheetSelection::Fallback { requested, reason } = &key.selection {
        diagnostics.push(Diagnostic::KeySheetFallback {
            requested: requested.clone(),
            used: key.sheet_name.clone(),
            reason: reason.clone(),
        });
    }

    let result = score_answers(
        &metadata.student_name,
        &metadata.set_label,
        &key.entries,
        &key.subjects,
        &answers,
    );
    log::info!(
        "{} ({}): total {}",
        result.student_name,
        result.set_name,
        result.total_score
    );
    for (subject, score) in result.subject_scores.iter() {
        log::info!("  {}: {}", subject, score);
    }

    Evaluation {
        result,
        answers,
        diagnostics,
    }
}

/// Opens the answer key workbook and loads the sheet for `set_label`, matched
/// loosely against the workbook's sheet names. Returns the normalized label too.
#[time]
pub fn load_key_for_label(key_path: &Path, set_label: &str) -> Result<(String, LoadedAnswerKey), AnswerKeyError> {
    let mut workbook =
        XlsxWorkbook::open(key_path).map_err(|source| AnswerKeyError::KeySourceUnavailable {
            requested: set_label.to_string(),
            source,
        })?;
    let set_name = normalize_set_label(set_label, &workbook.sheet_names());
    let key = load_answer_key(&mut workbook, &set_name)?;
    Ok((set_name, key))
}

/// Scores the sheet at `image_path` against the workbook at `key_path`. The image
/// and the key are read concurrently; either failing fails the whole run.
#[time]
pub fn evaluate_sheet(
    image_path: &Path,
    key_path: &Path,
    metadata: &SheetMetadata,
    options: &InterpretOptions,
) -> Result<Evaluation, EvaluateError> {
    log::info!(
        "processing sheet {} for {:?}, set {:?}",
        image_path.display(),
        metadata.student_name,
        metadata.set_label
    );

    let (image_result, key_result) = rayon::join(
        || load_sheet_image(image_path),
        || load_key_for_label(key_path, &metadata.set_label),
    );
    let image = image_result?;
    let (set_name, key) = key_result?;

    let metadata = SheetMetadata {
        student_name: metadata.student_name.clone(),
        set_label: set_name,
    };
    evaluate_image(&image, image_path, &metadata, &key, options)
}
