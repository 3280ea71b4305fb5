//! Pure domain logic: no database, no HTTP.

pub mod answer_mask;
pub mod category_tree;
pub mod import;
pub mod stats;

pub use answer_mask::{AnswerError, Difficulty, QuestionType};
