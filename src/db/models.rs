// Database model structs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::quiz::{Difficulty, QuestionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Guest,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guest => "guest",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "disabled" => Ok(UserStatus::Disabled),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub open_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub nickname: String,
    pub avatar: String,
    pub role: Role,
    pub status: UserStatus,
    pub is_guest: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub email: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub parent_id: Option<i64>,
    pub parent_name: Option<String>,
    pub level: i64,
    pub sort_order: i64,
    pub status: i64,
    pub question_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub keyword: Option<String>,
    pub status: Option<i64>,
    /// `Some(0)` selects top-level categories.
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "enabled")]
    pub status: i64,
}

fn enabled() -> i64 {
    1
}

/// Partial category update. `parent_id` distinguishes "absent" (`None`)
/// from "move to the top level" (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i64>,
    pub status: Option<i64>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: QuestionType,
    pub options: Json<Vec<String>>,
    pub correct_answer: i64,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub creator_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A fully validated question ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub title: String,
    pub content: String,
    pub kind: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub category_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub category_id: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub kind: Option<QuestionType>,
    pub keyword: Option<String>,
    pub creator_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Answers and mistakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub user_answer: i64,
    pub is_correct: bool,
    pub time_spent: i64,
    pub answered_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// One line of a user's answer history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnswerHistoryEntry {
    pub id: i64,
    pub question_id: i64,
    pub question_title: String,
    pub question_type: QuestionType,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub user_answer: i64,
    pub correct_answer: i64,
    pub is_correct: bool,
    pub time_spent: i64,
    pub answered_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub is_correct: bool,
    pub correct_answer: i64,
    pub explanation: String,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MistakeEntry {
    pub id: i64,
    pub question_id: i64,
    pub is_mastered: bool,
    pub added_at: NaiveDateTime,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: QuestionType,
    pub options: Json<Vec<String>>,
    pub correct_answer: i64,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub category_id: i64,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerHistoryFilter {
    pub category_id: Option<i64>,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct MistakeFilter {
    pub category_id: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub is_mastered: Option<bool>,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverallStats {
    pub total_answered: i64,
    pub correct_answered: i64,
    pub accuracy_rate: f64,
    pub total_time_spent: i64,
    #[serde(rename = "averageTime")]
    pub average_time_spent: f64,
    pub today_answered: i64,
    pub week_answered: i64,
    pub month_answered: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub category_id: i64,
    pub category_name: String,
    pub total_answered: i64,
    pub correct_answered: i64,
    #[sqlx(skip)]
    pub accuracy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub overall: UserOverallStats,
    pub categories: Vec<CategoryStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProgress {
    pub category_id: i64,
    pub category_name: String,
    pub total_questions: i64,
    pub total_answered: i64,
    pub correct_answered: i64,
    pub accuracy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct QuestionStat {
    pub question_id: i64,
    pub question_title: String,
    pub category_name: Option<String>,
    pub difficulty: Difficulty,
    pub total_answered: i64,
    pub correct_answered: i64,
    pub accuracy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UserStat {
    pub user_id: i64,
    pub nickname: String,
    pub total_answered: i64,
    pub correct_answered: i64,
    pub accuracy_rate: f64,
    pub total_time_spent: i64,
    pub last_active_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_users: i64,
    pub total_questions: i64,
    pub total_categories: i64,
    pub total_answers: i64,
    pub today_users: i64,
    pub today_answers: i64,
    pub week_users: i64,
    pub week_answers: i64,
    pub month_users: i64,
    pub month_answers: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: i64,
    pub total_questions: i64,
    pub total_categories: i64,
    pub total_answers: i64,
    pub total_mistakes: i64,
    pub active_users: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MistakeCategoryCount {
    pub category_id: i64,
    pub category_name: String,
    pub mistake_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MistakeDifficultyCount {
    pub difficulty: Difficulty,
    pub mistake_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeStats {
    pub total_mistakes: i64,
    pub mastered_mistakes: i64,
    pub category_stats: Vec<MistakeCategoryCount>,
    pub difficulty_stats: Vec<MistakeDifficultyCount>,
}

// ---------------------------------------------------------------------------
// Operation log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OperationLog {
    pub id: i64,
    pub operator: String,
    pub action: String,
    pub resource: String,
    pub description: String,
    pub ip: String,
    pub user_agent: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct NewOperationLog {
    pub operator: String,
    pub action: &'static str,
    pub resource: &'static str,
    pub description: String,
    pub ip: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default)]
pub struct OperationLogFilter {
    pub operator: Option<String>,
    pub action: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}
