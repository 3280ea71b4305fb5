//! Answer encoding for every question type.
//!
//! Questions store their correct answer as a single integer whose meaning
//! depends on the question type:
//!
//! | type       | stored value                                   |
//! |------------|------------------------------------------------|
//! | `single`   | zero-based option index                        |
//! | `judge`    | `0` = true, `1` = false                        |
//! | `multiple` | bitmask, bit `i` set when option `i` is right  |
//! | `fill`     | always `0`, the text lives in the explanation  |
//!
//! Humans read and write answers as letters (`"A"`, `"B,D"`), `true`/`false`
//! or free text. This module converts between the two notations.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Fixed option list of every judge (true/false) question.
pub const JUDGE_OPTIONS: [&str; 2] = ["正确", "错误"];

/// Letters `A..=Z` address the options, so a question has at most 26.
pub const MAX_OPTIONS: usize = 26;

/// Minimum option count of single and multiple choice questions.
pub const MIN_CHOICE_OPTIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QuestionType {
    Single,
    Multiple,
    Judge,
    Fill,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multiple => "multiple",
            QuestionType::Judge => "judge",
            QuestionType::Fill => "fill",
        }
    }
}

impl FromStr for QuestionType {
    type Err = AnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(QuestionType::Single),
            "multiple" => Ok(QuestionType::Multiple),
            "judge" => Ok(QuestionType::Judge),
            "fill" => Ok(QuestionType::Fill),
            _ => Err(AnswerError::UnknownType),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = AnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(AnswerError::UnknownDifficulty),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerError {
    UnknownType,
    UnknownDifficulty,
    TooFewOptions,
    TooManyOptions,
    UnexpectedOptions,
    BadJudgeOptions,
    BadSingleAnswer,
    EmptyMask,
    LetterOutOfRange,
    BadJudgeAnswer,
    IndexOutOfRange,
    MaskOutOfRange,
    NonZeroFill,
    UngradableFill,
}

impl AnswerError {
    pub fn message(self) -> &'static str {
        match self {
            AnswerError::UnknownType => "invalid question type",
            AnswerError::UnknownDifficulty => "invalid difficulty",
            AnswerError::TooFewOptions => "choice questions need at least 2 options",
            AnswerError::TooManyOptions => "a question can have at most 26 options",
            AnswerError::UnexpectedOptions => "fill questions cannot have options",
            AnswerError::BadJudgeOptions => "judge questions use the fixed true/false options",
            AnswerError::BadSingleAnswer => "single choice answer must be one option letter",
            AnswerError::EmptyMask => "multiple choice answer selects no option",
            AnswerError::LetterOutOfRange => "answer letter is beyond the option list",
            AnswerError::BadJudgeAnswer => "judge answer must be true or false",
            AnswerError::IndexOutOfRange => "answer index is out of range",
            AnswerError::MaskOutOfRange => "multiple choice mask is out of range",
            AnswerError::NonZeroFill => "fill questions must store 0 as the answer",
            AnswerError::UngradableFill => "fill questions cannot be graded by index",
        }
    }
}

impl fmt::Display for AnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AnswerError {}

/// A question's options, stored answer and explanation after encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAnswer {
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub explanation: String,
}

/// Human notation of a stored answer, as produced for exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAnswer {
    pub answer: String,
    pub explanation: String,
}

/// Option letter for a zero-based index, `0 -> 'A'`.
pub fn index_letter(index: usize) -> Option<char> {
    (index < MAX_OPTIONS).then(|| (b'A' + index as u8) as char)
}

/// Zero-based index of a one-letter token, case-insensitive.
fn letter_index(token: &str) -> Option<usize> {
    let mut chars = token.chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    Some((c as u8 - b'A') as usize)
}

/// Largest mask a multiple choice question with `option_count` options can store.
pub fn full_mask(option_count: usize) -> i64 {
    (1i64 << option_count.min(MAX_OPTIONS)) - 1
}

/// Converts a human-notation answer into its stored form.
pub fn encode(
    kind: QuestionType,
    options: Vec<String>,
    answer: &str,
    explanation: &str,
) -> Result<EncodedAnswer, AnswerError> {
    let answer = answer.trim();

    match kind {
        QuestionType::Single => {
            check_choice_options(&options)?;
            let index = letter_index(answer).ok_or(AnswerError::BadSingleAnswer)?;
            if index >= options.len() {
                return Err(AnswerError::LetterOutOfRange);
            }
            Ok(EncodedAnswer {
                options,
                correct_answer: index as i64,
                explanation: explanation.to_string(),
            })
        }
        QuestionType::Multiple => {
            check_choice_options(&options)?;
            let mut mask = 0i64;
            for token in answer.split(',').map(str::trim) {
                let Some(index) = letter_index(token) else {
                    continue;
                };
                if index >= options.len() {
                    return Err(AnswerError::LetterOutOfRange);
                }
                mask |= 1 << index;
            }
            if mask == 0 {
                return Err(AnswerError::EmptyMask);
            }
            Ok(EncodedAnswer {
                options,
                correct_answer: mask,
                explanation: explanation.to_string(),
            })
        }
        QuestionType::Judge => {
            let correct_answer = if answer.eq_ignore_ascii_case("true") || answer == JUDGE_OPTIONS[0]
            {
                0
            } else if answer.eq_ignore_ascii_case("false") || answer == JUDGE_OPTIONS[1] {
                1
            } else {
                return Err(AnswerError::BadJudgeAnswer);
            };
            Ok(EncodedAnswer {
                options: judge_options(),
                correct_answer,
                explanation: explanation.to_string(),
            })
        }
        QuestionType::Fill => {
            let explanation = if explanation.is_empty() {
                answer.to_string()
            } else {
                format!("{answer}\n\n{explanation}")
            };
            Ok(EncodedAnswer {
                options: Vec::new(),
                correct_answer: 0,
                explanation,
            })
        }
    }
}

/// Converts a stored answer back into human notation.
pub fn decode(
    kind: QuestionType,
    options: &[String],
    correct_answer: i64,
    explanation: &str,
) -> DecodedAnswer {
    let answer = match kind {
        QuestionType::Single => usize::try_from(correct_answer)
            .ok()
            .filter(|&i| i < options.len())
            .and_then(index_letter)
            .map(String::from)
            .unwrap_or_default(),
        QuestionType::Multiple => mask_letters(correct_answer, options.len()),
        QuestionType::Judge => {
            if correct_answer == 0 {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        QuestionType::Fill => {
            let (answer, rest) = explanation.split_once('\n').unwrap_or((explanation, ""));
            // `encode` separates the two parts with a blank line.
            let rest = rest.strip_prefix('\n').unwrap_or(rest);
            return DecodedAnswer {
                answer: answer.to_string(),
                explanation: rest.to_string(),
            };
        }
    };

    DecodedAnswer {
        answer,
        explanation: explanation.to_string(),
    }
}

/// Comma-joined letters of the bits set in `mask`, lowest first.
pub fn mask_letters(mask: i64, option_count: usize) -> String {
    (0..option_count.min(MAX_OPTIONS))
        .filter(|i| mask & (1 << i) != 0)
        .filter_map(index_letter)
        .map(String::from)
        .collect::<Vec<_>>()
        .join(",")
}

/// Reconstructs a question type from its stored shape.
///
/// This is a heuristic: a multiple choice question whose mask happens to be
/// a valid index (for example mask `1`, only option A correct) reads back as
/// `single`. Only use it when the persisted type is not trusted.
pub fn classify(options: &[String], correct_answer: i64) -> QuestionType {
    if options.is_empty() {
        QuestionType::Fill
    } else if options.len() == 2 && options[0] == JUDGE_OPTIONS[0] && options[1] == JUDGE_OPTIONS[1]
    {
        QuestionType::Judge
    } else if correct_answer > options.len() as i64 - 1 {
        QuestionType::Multiple
    } else {
        QuestionType::Single
    }
}

/// Checks the stored-answer invariant of a question.
pub fn validate(kind: QuestionType, options: &[String], correct_answer: i64) -> Result<(), AnswerError> {
    let option_count = options.len();
    if option_count > MAX_OPTIONS {
        return Err(AnswerError::TooManyOptions);
    }

    match kind {
        QuestionType::Single => {
            check_choice_options(options)?;
            if correct_answer < 0 || correct_answer >= option_count as i64 {
                return Err(AnswerError::IndexOutOfRange);
            }
        }
        QuestionType::Judge => {
            if *options != JUDGE_OPTIONS {
                return Err(AnswerError::BadJudgeOptions);
            }
            if !(0..=1).contains(&correct_answer) {
                return Err(AnswerError::IndexOutOfRange);
            }
        }
        QuestionType::Multiple => {
            check_choice_options(options)?;
            if correct_answer <= 0 || correct_answer > full_mask(option_count) {
                return Err(AnswerError::MaskOutOfRange);
            }
        }
        QuestionType::Fill => {
            if option_count != 0 {
                return Err(AnswerError::UnexpectedOptions);
            }
            if correct_answer != 0 {
                return Err(AnswerError::NonZeroFill);
            }
        }
    }

    Ok(())
}

/// Grades a submitted answer, rejecting values the question cannot hold.
pub fn grade(
    kind: QuestionType,
    option_count: usize,
    correct_answer: i64,
    user_answer: i64,
) -> Result<bool, AnswerError> {
    match kind {
        QuestionType::Single | QuestionType::Judge => {
            if user_answer < 0 || user_answer >= option_count as i64 {
                return Err(AnswerError::IndexOutOfRange);
            }
        }
        QuestionType::Multiple => {
            if user_answer <= 0 || user_answer > full_mask(option_count) {
                return Err(AnswerError::MaskOutOfRange);
            }
        }
        QuestionType::Fill => return Err(AnswerError::UngradableFill),
    }

    Ok(user_answer == correct_answer)
}

pub fn judge_options() -> Vec<String> {
    JUDGE_OPTIONS.iter().map(|s| s.to_string()).collect()
}

fn check_choice_options(options: &[String]) -> Result<(), AnswerError> {
    if options.len() < MIN_CHOICE_OPTIONS {
        return Err(AnswerError::TooFewOptions);
    }
    if options.len() > MAX_OPTIONS {
        return Err(AnswerError::TooManyOptions);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn opts(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn multiple_letters_become_a_mask() {
        let encoded = encode(
            QuestionType::Multiple,
            opts(&["A", "B", "C", "D"]),
            "B,D",
            "",
        )
        .unwrap();
        assert_eq!(encoded.correct_answer, (1 << 1) | (1 << 3));
        assert_eq!(encoded.correct_answer, 10);
    }

    #[test]
    fn multiple_accepts_lowercase_and_spaces_and_ignores_junk() {
        let encoded = encode(
            QuestionType::Multiple,
            opts(&["w", "x", "y"]),
            " a , c ,, 7 ",
            "",
        )
        .unwrap();
        assert_eq!(encoded.correct_answer, 0b101);
    }

    #[test]
    fn multiple_rejects_letters_past_the_options() {
        let err = encode(QuestionType::Multiple, opts(&["x", "y", "z"]), "A,D", "").unwrap_err();
        assert_eq!(err, AnswerError::LetterOutOfRange);
    }

    #[test]
    fn multiple_rejects_empty_masks_and_short_option_lists() {
        assert_eq!(
            encode(QuestionType::Multiple, opts(&["x", "y"]), "1,2", "").unwrap_err(),
            AnswerError::EmptyMask
        );
        assert_eq!(
            encode(QuestionType::Multiple, opts(&["x"]), "A", "").unwrap_err(),
            AnswerError::TooFewOptions
        );
    }

    #[test]
    fn single_maps_letter_to_index() {
        let encoded = encode(
            QuestionType::Single,
            opts(&["Paris", "London", "Berlin"]),
            "c",
            "capital",
        )
        .unwrap();
        assert_eq!(encoded.correct_answer, 2);
        assert_eq!(encoded.explanation, "capital");

        assert_eq!(
            encode(QuestionType::Single, opts(&["x", "y"]), "C", "").unwrap_err(),
            AnswerError::LetterOutOfRange
        );
        assert_eq!(
            encode(QuestionType::Single, opts(&["x", "y"]), "A,B", "").unwrap_err(),
            AnswerError::BadSingleAnswer
        );
    }

    #[test]
    fn judge_uses_the_fixed_pair() {
        let t = encode(QuestionType::Judge, opts(&["yes", "no"]), "TRUE", "").unwrap();
        assert_eq!(t.options, judge_options());
        assert_eq!(t.correct_answer, 0);

        let f = encode(QuestionType::Judge, Vec::new(), "错误", "").unwrap();
        assert_eq!(f.correct_answer, 1);

        assert_eq!(
            encode(QuestionType::Judge, Vec::new(), "maybe", "").unwrap_err(),
            AnswerError::BadJudgeAnswer
        );
    }

    #[test]
    fn fill_moves_the_answer_into_the_explanation() {
        let bare = encode(QuestionType::Fill, opts(&["ignored"]), "42", "").unwrap();
        assert!(bare.options.is_empty());
        assert_eq!(bare.correct_answer, 0);
        assert_eq!(bare.explanation, "42");

        let with_text = encode(QuestionType::Fill, Vec::new(), "42", "the answer").unwrap();
        assert_eq!(with_text.explanation, "42\n\nthe answer");

        let decoded = decode(QuestionType::Fill, &[], 0, &with_text.explanation);
        assert_eq!(decoded.answer, "42");
        assert_eq!(decoded.explanation, "the answer");
    }

    #[test]
    fn mask_survives_decode_then_encode() {
        let options = opts(&["a", "b", "c", "d", "e"]);
        for mask in 1..=full_mask(options.len()) {
            let letters = decode(QuestionType::Multiple, &options, mask, "").answer;
            let again = encode(QuestionType::Multiple, options.clone(), &letters, "").unwrap();
            assert_eq!(again.correct_answer, mask, "letters {letters}");
        }
    }

    #[test]
    fn validate_enforces_ranges() {
        let three = opts(&["a", "b", "c"]);
        let four = opts(&["a", "b", "c", "d"]);
        assert!(validate(QuestionType::Single, &three, 2).is_ok());
        assert_eq!(
            validate(QuestionType::Single, &three, 3).unwrap_err(),
            AnswerError::IndexOutOfRange
        );
        assert_eq!(
            validate(QuestionType::Judge, &judge_options(), -1).unwrap_err(),
            AnswerError::IndexOutOfRange
        );
        assert!(validate(QuestionType::Multiple, &four, 15).is_ok());
        assert_eq!(
            validate(QuestionType::Multiple, &four, 16).unwrap_err(),
            AnswerError::MaskOutOfRange
        );
        assert_eq!(
            validate(QuestionType::Multiple, &four, 0).unwrap_err(),
            AnswerError::MaskOutOfRange
        );
        assert!(validate(QuestionType::Fill, &[], 0).is_ok());
        assert_eq!(
            validate(QuestionType::Fill, &[], 1).unwrap_err(),
            AnswerError::NonZeroFill
        );
    }

    #[test]
    fn single_choice_needs_two_options() {
        assert_eq!(
            validate(QuestionType::Single, &opts(&["only"]), 0).unwrap_err(),
            AnswerError::TooFewOptions
        );
        assert_eq!(
            validate(QuestionType::Single, &[], 0).unwrap_err(),
            AnswerError::TooFewOptions
        );
        assert!(validate(QuestionType::Single, &opts(&["yes", "no"]), 1).is_ok());
    }

    #[test]
    fn judge_only_accepts_the_fixed_pair() {
        assert!(validate(QuestionType::Judge, &judge_options(), 1).is_ok());
        assert_eq!(
            validate(QuestionType::Judge, &opts(&["yes", "no", "maybe"]), 2).unwrap_err(),
            AnswerError::BadJudgeOptions
        );
        assert_eq!(
            validate(QuestionType::Judge, &opts(&["错误", "正确"]), 0).unwrap_err(),
            AnswerError::BadJudgeOptions
        );
    }

    #[test]
    fn fill_decode_keeps_an_explanation_without_blank_line() {
        let decoded = decode(QuestionType::Fill, &[], 0, "Beijing\nbecause it is the capital");
        assert_eq!(decoded.answer, "Beijing");
        assert_eq!(decoded.explanation, "because it is the capital");

        let bare = decode(QuestionType::Fill, &[], 0, "Beijing");
        assert_eq!(bare.answer, "Beijing");
        assert_eq!(bare.explanation, "");
    }

    #[test]
    fn error_text_matches_message() {
        assert_eq!(AnswerError::TooFewOptions.to_string(), AnswerError::TooFewOptions.message());
        assert_eq!(AnswerError::UnknownType.to_string(), "invalid question type");
    }

    #[test]
    fn classify_follows_the_stored_shape() {
        assert_eq!(classify(&[], 0), QuestionType::Fill);
        assert_eq!(classify(&judge_options(), 1), QuestionType::Judge);
        assert_eq!(classify(&opts(&["a", "b", "c"]), 5), QuestionType::Multiple);
        assert_eq!(classify(&opts(&["a", "b", "c"]), 2), QuestionType::Single);
    }

    #[test]
    fn classify_misreads_masks_that_look_like_indexes() {
        // Mask 0b01 (only A correct) reads back as single choice index 1.
        assert_eq!(classify(&opts(&["a", "b", "c"]), 1), QuestionType::Single);
    }

    #[test]
    fn grading_compares_and_rejects_illegal_answers() {
        assert!(grade(QuestionType::Single, 3, 0, 0).unwrap());
        assert!(!grade(QuestionType::Single, 3, 0, 1).unwrap());
        assert_eq!(
            grade(QuestionType::Single, 3, 0, 3).unwrap_err(),
            AnswerError::IndexOutOfRange
        );
        assert!(grade(QuestionType::Multiple, 4, 10, 10).unwrap());
        assert_eq!(
            grade(QuestionType::Multiple, 4, 10, 16).unwrap_err(),
            AnswerError::MaskOutOfRange
        );
        assert_eq!(
            grade(QuestionType::Fill, 0, 0, 0).unwrap_err(),
            AnswerError::UngradableFill
        );
    }

    #[test]
    fn decode_renders_letters() {
        let options = opts(&["a", "b", "c", "d"]);
        assert_eq!(decode(QuestionType::Single, &options, 1, "").answer, "B");
        assert_eq!(decode(QuestionType::Multiple, &options, 10, "").answer, "B,D");
        assert_eq!(decode(QuestionType::Judge, &judge_options(), 1, "").answer, "false");
    }
}
