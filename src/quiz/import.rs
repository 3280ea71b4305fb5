//! Row-level rules of the bulk question import.
//!
//! The transactional half lives in `db::import`; everything here is pure so
//! that the per-row decisions can be tested without a database.

use serde::{Deserialize, Serialize};

use super::answer_mask::{self, AnswerError, Difficulty, EncodedAnswer, QuestionType};

/// Number of characters of the content copied into the generated title.
pub const TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub difficulty: String,
    #[serde(alias = "categoryId")]
    pub category_id: i64,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ImportOptions {
    #[serde(default, alias = "skipDuplicates")]
    pub skip_duplicates: bool,
    #[serde(default, alias = "updateExisting")]
    pub update_existing: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub questions: Vec<ImportItem>,
    #[serde(default)]
    pub options: ImportOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Imported,
    Updated,
    Skipped,
    Failed(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    /// Folds one row outcome in. `row` is 1-indexed.
    pub fn record(&mut self, row: usize, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Imported | RowOutcome::Updated => self.imported_count += 1,
            RowOutcome::Skipped => self.skipped_count += 1,
            RowOutcome::Failed(reason) => {
                self.skipped_count += 1;
                self.errors.push(format!("row {row}: {reason}"));
            }
        }
    }
}

/// A row that passed every check and is ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuestion {
    pub title: String,
    pub content: String,
    pub kind: QuestionType,
    pub difficulty: Difficulty,
    pub category_id: i64,
    pub answer: EncodedAnswer,
}

/// Checks the enumerated fields, the first two steps of every row.
pub fn check_row(item: &ImportItem) -> Result<(QuestionType, Difficulty), AnswerError> {
    let kind = item.kind.trim().parse::<QuestionType>()?;
    let difficulty = item.difficulty.trim().parse::<Difficulty>()?;
    Ok((kind, difficulty))
}

/// Encodes the answer of a row whose enums and category are already known good.
pub fn prepare(
    item: ImportItem,
    kind: QuestionType,
    difficulty: Difficulty,
) -> Result<PreparedQuestion, String> {
    if item.content.trim().is_empty() {
        return Err("content is required".to_string());
    }

    let answer = answer_mask::encode(kind, item.options, &item.answer, &item.explanation)
        .map_err(|e| e.to_string())?;

    Ok(PreparedQuestion {
        title: title_from_content(&item.content),
        content: item.content,
        kind,
        difficulty,
        category_id: item.category_id,
        answer,
    })
}

pub fn title_from_content(content: &str) -> String {
    content.chars().take(TITLE_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(kind: &str, answer: &str) -> ImportItem {
        ImportItem {
            content: "Which city is the capital of France?".to_string(),
            kind: kind.to_string(),
            difficulty: "easy".to_string(),
            category_id: 1,
            options: vec!["Paris".into(), "London".into(), "Berlin".into()],
            answer: answer.to_string(),
            explanation: String::new(),
        }
    }

    #[test]
    fn report_counts_failures_as_skipped_with_row_numbers() {
        let mut report = ImportReport::default();
        report.record(1, RowOutcome::Imported);
        report.record(2, RowOutcome::Failed("invalid question type".into()));
        report.record(3, RowOutcome::Updated);
        report.record(4, RowOutcome::Skipped);

        assert_eq!(report.imported_count, 2);
        assert_eq!(report.skipped_count, 2);
        assert_eq!(report.errors, vec!["row 2: invalid question type"]);
    }

    #[test]
    fn unknown_enums_are_rejected_in_order() {
        let mut bad_type = item("essay", "A");
        bad_type.difficulty = "extreme".into();
        assert_eq!(check_row(&bad_type).unwrap_err(), AnswerError::UnknownType);

        let mut bad_difficulty = item("single", "A");
        bad_difficulty.difficulty = "extreme".into();
        assert_eq!(
            check_row(&bad_difficulty).unwrap_err(),
            AnswerError::UnknownDifficulty
        );
    }

    #[test]
    fn prepare_encodes_and_truncates_the_title() {
        let mut long = item("single", "a");
        long.content = "问".repeat(150);
        let (kind, difficulty) = check_row(&long).unwrap();

        let prepared = prepare(long, kind, difficulty).unwrap();
        assert_eq!(prepared.title.chars().count(), TITLE_CHARS);
        assert_eq!(prepared.answer.correct_answer, 0);
        assert_eq!(prepared.kind, QuestionType::Single);
    }

    #[test]
    fn prepare_reports_codec_errors_as_text() {
        let row = item("single", "D");
        let err = prepare(row, QuestionType::Single, Difficulty::Easy).unwrap_err();
        assert_eq!(err, "answer letter is beyond the option list");

        let mut empty = item("fill", "x");
        empty.content = "  ".into();
        assert_eq!(
            prepare(empty, QuestionType::Fill, Difficulty::Easy).unwrap_err(),
            "content is required"
        );
    }

    #[test]
    fn accepts_camel_case_fields() {
        let json = r#"{
            "questions": [{"content": "c", "type": "judge", "difficulty": "hard",
                           "categoryId": 4, "answer": "true"}],
            "options": {"skipDuplicates": true}
        }"#;
        let req: ImportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.questions[0].category_id, 4);
        assert!(req.options.skip_duplicates);
        assert!(!req.options.update_existing);
    }
}
