use serde::ser::SerializeMap;
use serde::Serialize;

use crate::answer_key::AnswerKey;
use crate::classify::StudentAnswers;
use crate::types::SubjectName;

/// Per-subject scores in answer-key column order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectScores(Vec<(SubjectName, u32)>);

impl SubjectScores {
    pub fn new(subjects: &[SubjectName]) -> Self {
        Self(subjects.iter().map(|subject| (subject.clone(), 0)).collect())
    }

    #[cfg(test)]
    pub fn get(&self, subject: &str) -> Option<u32> {
        self.0
            .iter()
            .find(|(name, _)| name.as_str() == subject)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SubjectName, u32)> {
        self.0.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn increment(&mut self, subject: &SubjectName) {
        if let Some((_, score)) = self.0.iter_mut().find(|(name, _)| name == subject) {
            *score += 1;
        }
    }
}

impl Serialize for SubjectScores {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (subject, score) in &self.0 {
            map.serialize_entry(subject, score)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub student_name: String,
    pub set_name: String,
    pub total_score: u32,
    pub subject_scores: SubjectScores,
}

/// Compares detected answers against the key. Every subject starts at zero and
/// stays in the result even if nothing in it was answered correctly.
pub fn score_answers(
    student_name: &str,
    set_name: &str,
    key: &AnswerKey,
    subjects: &[SubjectName],
    answers: &StudentAnswers,
) -> ScoreResult {
    let mut total_score = 0;
    let mut subject_scores = SubjectScores::new(subjects);

    for (question, entry) in key {
        let Some(answer) = answers.get(question) else {
            continue;
        };
        if entry.accepts(*answer) {
            total_score += 1;
            subject_scores.increment(&entry.subject);
        }
    }

    ScoreResult {
        student_name: student_name.to_string(),
        set_name: set_name.to_string(),
        total_score,
        subject_scores,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::answer_key::AnswerKeyEntry;
    use crate::types::OptionLetter;

    fn subject(name: &str) -> SubjectName {
        SubjectName::from(name.to_string())
    }

    fn math_key() -> AnswerKey {
        [(1, "A"), (2, "B,C")]
            .into_iter()
            .map(|(question, answer)| {
                (
                    question,
                    AnswerKeyEntry {
                        question,
                        answer: answer.to_string(),
                        subject: subject("Math"),
                    },
                )
            })
            .collect()
    }

    fn answers(pairs: &[(u32, char)]) -> StudentAnswers {
        pairs
            .iter()
            .map(|(q, c)| (*q, OptionLetter::from_index((*c as u8 - b'A') as usize)))
            .collect()
    }

    #[test]
    fn test_all_correct_with_multiple_accepted_letters() {
        let result = score_answers(
            "Ada",
            "Set A",
            &math_key(),
            &[subject("Math")],
            &answers(&[(1, 'A'), (2, 'C')]),
        );
        assert_eq!(result.total_score, 2);
        assert_eq!(result.subject_scores.get("Math"), Some(2));
    }

    #[test]
    fn test_wrong_and_unanswered() {
        let result = score_answers(
            "Ada",
            "Set A",
            &math_key(),
            &[subject("Math")],
            &answers(&[(1, 'B')]),
        );
        assert_eq!(result.total_score, 0);
        assert_eq!(result.subject_scores.get("Math"), Some(0));
    }

    #[test]
    fn test_subjects_without_answers_are_reported() {
        let result = score_answers(
            "Ada",
            "Set A",
            &math_key(),
            &[subject("Math"), subject("Art")],
            &StudentAnswers::new(),
        );
        assert_eq!(result.total_score, 0);
        assert_eq!(result.subject_scores.len(), 2);
        assert_eq!(result.subject_scores.get("Art"), Some(0));
        assert_eq!(result.subject_scores.get("History"), None);
    }

    #[test]
    fn test_answers_without_key_entries_are_ignored() {
        let result = score_answers(
            "Ada",
            "Set A",
            &math_key(),
            &[subject("Math")],
            &answers(&[(1, 'A'), (3, 'A'), (4, 'D')]),
        );
        assert_eq!(result.total_score, 1);
    }

    #[test]
    fn test_subject_score_never_exceeds_entry_count() {
        let key = math_key();
        let all = answers(&[(1, 'A'), (2, 'B')]);
        let result = score_answers("Ada", "Set A", &key, &[subject("Math")], &all);
        let math_entries = key.values().filter(|e| e.subject.as_str() == "Math").count() as u32;
        assert!(result.subject_scores.get("Math").unwrap() <= math_entries);
    }

    #[test]
    fn test_result_serializes_in_subject_order() {
        let result = score_answers(
            "Ada",
            "Set A",
            &math_key(),
            &[subject("Physics"), subject("Math")],
            &answers(&[(1, 'A')]),
        );
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"studentName":"Ada","setName":"Set A","totalScore":1,"subjectScores":{"Physics":0,"Math":1}}"#
        );
    }
}
