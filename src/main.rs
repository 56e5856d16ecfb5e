extern crate log;
extern crate pretty_env_logger;

use std::path::Path;
use std::process::exit;

use clap::{arg, command, Command};

use crate::config::ScoringConfig;
use crate::interpret::{evaluate_sheet, Diagnostic, InterpretOptions};
use crate::metadata::SheetMetadata;
use crate::record::{JsonLinesSink, ResultSink};

mod answer_key;
mod bubbles;
mod classify;
mod config;
mod debug;
mod geometry;
mod image_utils;
mod interpret;
mod layout;
mod metadata;
mod preprocess;
mod record;
mod score;
mod sheet_template;
mod types;
mod workbook;

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let debug = matches.get_flag("debug");
    let image_path = matches
        .get_one::<String>("image_path")
        .expect("sheet image path is required");
    let key_path = matches
        .get_one::<String>("key")
        .expect("answer key path is required");
    let metadata = SheetMetadata::new(
        matches.get_one::<String>("student").map(String::as_str),
        matches.get_one::<String>("set").map(String::as_str),
    );

    let config = match matches.get_one::<String>("config") {
        Some(path) => match ScoringConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                exit(1);
            }
        },
        None => ScoringConfig::default(),
    };

    let options = InterpretOptions { debug, config };

    let evaluation = match evaluate_sheet(
        Path::new(image_path),
        Path::new(key_path),
        &metadata,
        &options,
    ) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    log::debug!("detected answers: {:?}", evaluation.answers);
    for diagnostic in &evaluation.diagnostics {
        match diagnostic {
            Diagnostic::NoBubblesDetected => eprintln!("Warning: no answer bubbles detected"),
            Diagnostic::KeySheetFallback {
                requested,
                used,
                reason,
            } => eprintln!(
                "Warning: answer key sheet {:?} unavailable ({}), used {:?}",
                requested, reason, used
            ),
        }
    }

    match serde_json::to_string_pretty(&evaluation.result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error encoding result: {}", e);
            exit(1);
        }
    }

    if let Some(output_path) = matches.get_one::<String>("output") {
        let mut sink = JsonLinesSink::new(Path::new(output_path));
        if let Err(e) = sink.save(&evaluation.result) {
            eprintln!("Error saving result: {}", e);
            exit(1);
        }
    }
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    command!()
        .arg(arg!(-k --key <PATH> "Path to the answer key workbook (.xlsx)").required(true))
        .arg(arg!(-s --set <NAME> "Answer key set label read from the sheet, e.g. \"Set B\""))
        .arg(arg!(-n --student <NAME> "Student name read from the sheet"))
        .arg(arg!(-c --config <PATH> "Path to a config.json overriding the defaults"))
        .arg(arg!(-o --output <PATH> "Append the result to this JSON lines file"))
        .arg(arg!(-d --debug "Write debug images next to the sheet image"))
        .arg(arg!(image_path: <IMAGE> "Path to the scanned answer sheet").required(true))
}
