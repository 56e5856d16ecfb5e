use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use logging_timer::time;
use quick_xml::events::attributes::{AttrError, Attributes};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a readable xlsx archive: {0}")]
    Zip(#[from] ZipError),

    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed xml attribute: {0}")]
    Attr(#[from] AttrError),

    #[error("workbook part missing: {0}")]
    MissingPart(String),

    #[error("worksheet not found: {0}")]
    SheetNotFound(String),

    #[error("workbook has no worksheets")]
    NoSheets,
}

/// The cells of one worksheet, row by row. A cell is `None` when empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    pub rows: Vec<Vec<Option<String>>>,
}

/// A tabular source made of named sheets, in workbook order.
pub trait Workbook {
    fn sheet_names(&self) -> Vec<String>;
    fn read_sheet(&mut self, name: &str) -> Result<Sheet, WorkbookError>;
}

/// An Office Open XML spreadsheet read straight from its zip container.
pub struct XlsxWorkbook<R: Read + Seek> {
    archive: ZipArchive<R>,
    /// (sheet name, worksheet part path)
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
}

impl XlsxWorkbook<File> {
    #[time]
    pub fn open(path: &Path) -> Result<Self, WorkbookError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> XlsxWorkbook<R> {
    pub fn from_reader(reader: R) -> Result<Self, WorkbookError> {
        let mut archive = ZipArchive::new(reader)?;

        let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| WorkbookError::MissingPart("xl/workbook.xml".to_string()))?;
        let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?
            .ok_or_else(|| WorkbookError::MissingPart("xl/_rels/workbook.xml.rels".to_string()))?;
        let shared_strings = match read_part(&mut archive, "xl/sharedStrings.xml")? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => vec![],
        };

        let targets = parse_relationships(&rels_xml)?;
        let sheets = parse_sheet_list(&workbook_xml)?
            .into_iter()
            .filter_map(|(name, relationship_id)| match targets.get(&relationship_id) {
                Some(target) => Some((name, resolve_target(target))),
                None => {
                    log::warn!("sheet {:?} has no part for relationship {}", name, relationship_id);
                    None
                }
            })
            .collect::<Vec<(String, String)>>();

        log::debug!(
            "workbook sheets: {:?}, {} shared strings",
            sheets.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            shared_strings.len()
        );

        Ok(Self {
            archive,
            sheets,
            shared_strings,
        })
    }
}

impl<R: Read + Seek> Workbook for XlsxWorkbook<R> {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<Sheet, WorkbookError> {
        let part = self
            .sheets
            .iter()
            .find(|(sheet_name, _)| sheet_name == name)
            .map(|(_, part)| part.clone())
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_string()))?;
        let xml = read_part(&mut self.archive, &part)?.ok_or(WorkbookError::MissingPart(part))?;
        parse_worksheet(&xml, &self.shared_strings)
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, WorkbookError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Relationship targets are relative to `xl/` unless absolute within the package.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn attribute(attributes: Attributes, local_name: &[u8]) -> Result<Option<String>, WorkbookError> {
    for attr in attributes {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Sheet names and relationship ids, in workbook order.
fn parse_sheet_list(xml: &str) -> Result<Vec<(String, String)>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = vec![];
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(e.attributes(), b"name")?;
                let id = attribute(e.attributes(), b"id")?;
                if let (Some(name), Some(id)) = (name, id) {
                    sheets.push((name, id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(e.attributes(), b"Id")?;
                let target = attribute(e.attributes(), b"Target")?;
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(targets)
}

/// Shared strings, with rich-text runs concatenated and phonetic hints dropped.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut strings = vec![];
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(e) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `"C7"` or `"AB12"`.
fn column_index(reference: &str) -> Option<usize> {
    let letters = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>();
    if letters.is_empty() {
        return None;
    }
    let number = letters.chars().fold(0usize, |acc, c| {
        acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1)
    });
    Some(number - 1)
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    cell_type: Option<String>,
    value: String,
    inline: String,
}

impl PendingCell {
    fn resolve(self, shared_strings: &[String]) -> Option<String> {
        let text = match self.cell_type.as_deref() {
            Some("s") => {
                let index = self.value.trim().parse::<usize>().ok()?;
                shared_strings.get(index)?.clone()
            }
            Some("inlineStr") => self.inline,
            Some("b") => match self.value.trim() {
                "1" => "TRUE".to_string(),
                _ => "FALSE".to_string(),
            },
            Some("e") => return None,
            _ => self.value,
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn parse_worksheet(xml: &str, shared_strings: &[String]) -> Result<Sheet, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut rows = vec![];
    let mut row: Option<Vec<Option<String>>> = None;
    let mut cell: Option<PendingCell> = None;
    let mut next_column = 0usize;
    let mut in_value = false;
    let mut in_inline_text = false;

    fn place(row: &mut Vec<Option<String>>, column: usize, value: Option<String>) {
        if row.len() <= column {
            row.resize(column + 1, None);
        }
        row[column] = value;
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(vec![]);
                    next_column = 0;
                }
                b"c" => {
                    let column = attribute(e.attributes(), b"r")?
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column);
                    next_column = column + 1;
                    cell = Some(PendingCell {
                        column,
                        cell_type: attribute(e.attributes(), b"t")?,
                        ..PendingCell::default()
                    });
                }
                b"v" => in_value = true,
                b"t" => in_inline_text = cell.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => rows.push(vec![]),
                b"c" => {
                    next_column = attribute(e.attributes(), b"r")?
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next_column)
                        + 1;
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => {
                    if let Some(row) = row.take() {
                        rows.push(row);
                    }
                }
                b"c" => {
                    if let (Some(pending), Some(row)) = (cell.take(), row.as_mut()) {
                        let column = pending.column;
                        place(row, column, pending.resolve(shared_strings));
                    }
                }
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Event::Text(e) => {
                if let Some(pending) = cell.as_mut() {
                    if in_value {
                        pending.value.push_str(&e.unescape()?);
                    } else if in_inline_text {
                        pending.inline.push_str(&e.unescape()?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Sheet { rows })
}
