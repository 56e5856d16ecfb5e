pub const DEFAULT_SET_LABEL: &str = "Set A";
pub const UNKNOWN_STUDENT: &str = "Unknown";

/// Text read off the sheet header: who took the test and which variant they had.
/// Recognition itself happens outside this crate; these are the strings it
/// produced, possibly noisy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetMetadata {
    pub student_name: String,
    pub set_label: String,
}

impl SheetMetadata {
    pub fn new(student_name: Option<&str>, set_label: Option<&str>) -> Self {
        let student_name = match student_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => UNKNOWN_STUDENT.to_string(),
        };
        let set_label = match set_label.map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => DEFAULT_SET_LABEL.to_string(),
        };
        Self {
            student_name,
            set_label,
        }
    }
}

fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps a recognized set label onto one of the workbook's sheet names, ignoring
/// case and whitespace, so `"SET  b\n"` and `"Setb"` both become `"Set B"`.
/// When several sheet names appear in the label the longest one wins. Labels
/// matching no sheet are returned trimmed.
pub fn normalize_set_label(raw: &str, sheet_names: &[String]) -> String {
    let label = compact(raw);
    sheet_names
        .iter()
        .map(|name| (name, compact(name)))
        .filter(|(_, compacted)| !compacted.is_empty() && label.contains(compacted.as_str()))
        .max_by_key(|(_, compacted)| compacted.len())
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    fn sheets() -> Vec<String> {
        vec!["Set A".to_string(), "Set B".to_string()]
    }

    #[test]
    fn test_normalize_set_label() {
        assert_eq!(normalize_set_label("Set B", &sheets()), "Set B");
        assert_eq!(normalize_set_label("  SET  b\n", &sheets()), "Set B");
        assert_eq!(normalize_set_label("setb", &sheets()), "Set B");
        assert_eq!(normalize_set_label("Test Set A:", &sheets()), "Set A");
        assert_eq!(normalize_set_label(" Set C ", &sheets()), "Set C");
        assert_eq!(normalize_set_label("Set B", &[]), "Set B");
    }

    #[test]
    fn test_normalize_prefers_longest_match() {
        let sheets = vec!["A".to_string(), "Set A".to_string()];
        assert_eq!(normalize_set_label("set a", &sheets), "Set A");
    }

    #[test]
    fn test_metadata_defaults() {
        let metadata = SheetMetadata::new(None, Some("  "));
        assert_eq!(metadata.student_name, UNKNOWN_STUDENT);
        assert_eq!(metadata.set_label, DEFAULT_SET_LABEL);

        let metadata = SheetMetadata::new(Some(" Ada Lovelace "), Some("Set B"));
        assert_eq!(metadata.student_name, "Ada Lovelace");
        assert_eq!(metadata.set_label, "Set B");
    }
}
