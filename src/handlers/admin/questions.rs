use axum::{
    extract::State,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::record_by;
use crate::{
    db::models::{Question, QuestionDraft, QuestionFilter},
    extractors::{empty_as_none, AdminGuard, ApiJson, ApiPath, ApiQuery, ClientInfo, Pagination},
    handlers::question::get_question,
    names,
    quiz::{
        answer_mask::{self, QuestionType},
        import::{title_from_content, ImportRequest},
        Difficulty,
    },
    rejections::{AppError, OptionExt, ResultExt},
    views, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route("/questions/batch", delete(delete_questions))
        .route("/questions/import", post(import_questions))
        .route("/questions/export", get(export_questions))
        .route(
            "/questions/{id}",
            get(admin_get_question).put(update_question).delete(delete_question),
        )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionQuery {
    #[serde(default, alias = "category_id", deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    difficulty: Option<Difficulty>,
    #[serde(default, rename = "type", deserialize_with = "empty_as_none")]
    kind: Option<QuestionType>,
    #[serde(default, deserialize_with = "empty_as_none")]
    keyword: Option<String>,
    #[serde(default, alias = "creator_id", deserialize_with = "empty_as_none")]
    creator_id: Option<i64>,
    #[serde(default, alias = "start_date", deserialize_with = "empty_as_none")]
    start_date: Option<String>,
    #[serde(default, alias = "end_date", deserialize_with = "empty_as_none")]
    end_date: Option<String>,
}

impl From<QuestionQuery> for QuestionFilter {
    fn from(query: QuestionQuery) -> Self {
        QuestionFilter {
            category_id: query.category_id,
            difficulty: query.difficulty,
            kind: query.kind,
            keyword: query.keyword,
            creator_id: query.creator_id,
            start_date: query.start_date,
            end_date: query.end_date,
        }
    }
}

async fn list_questions(
    AdminGuard(_): AdminGuard,
    State(state): State<AppState>,
    Pagination(page): Pagination,
    ApiQuery(query): ApiQuery<QuestionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (questions, total) = state
        .db
        .list_questions(&query.into(), page)
        .await
        .reject("could not list questions")?;

    Ok(views::paged(questions, total, page.page, page.size))
}

async fn admin_get_question(
    AdminGuard(_): AdminGuard,
    state: State<AppState>,
    id: ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    get_question(state, id).await
}

/// Question body of the admin form. Every field is optional so the same
/// shape serves create and partial update.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct QuestionBody {
    title: Option<String>,
    content: Option<String>,
    #[serde(rename = "type")]
    kind: Option<QuestionType>,
    options: Option<Vec<String>>,
    correct_answer: Option<i64>,
    explanation: Option<String>,
    difficulty: Option<Difficulty>,
    category_id: Option<i64>,
}

impl QuestionBody {
    /// Overlays the body on `base` (an existing question) or builds a new draft.
    fn into_draft(self, base: Option<&Question>) -> Result<QuestionDraft, AppError> {
        let content = self
            .content
            .or_else(|| base.map(|q| q.content.clone()))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AppError::Input("question content is required"))?;
        let kind = self
            .kind
            .or(base.map(|q| q.kind))
            .ok_or(AppError::Input("question type is required"))?;
        let category_id = self
            .category_id
            .or(base.map(|q| q.category_id))
            .ok_or(AppError::Input("category is required"))?;

        let mut options = self
            .options
            .or_else(|| base.map(|q| q.options.0.clone()))
            .unwrap_or_default();
        if kind == QuestionType::Judge {
            options = answer_mask::judge_options();
        }
        let correct_answer = self
            .correct_answer
            .or(base.map(|q| q.correct_answer))
            .unwrap_or(0);

        answer_mask::validate(kind, &options, correct_answer)?;

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| base.map(|q| q.title.clone()))
            .unwrap_or_else(|| title_from_content(&content));

        Ok(QuestionDraft {
            title,
            content,
            kind,
            options,
            correct_answer,
            explanation: self
                .explanation
                .or_else(|| base.map(|q| q.explanation.clone()))
                .unwrap_or_default(),
            difficulty: self
                .difficulty
                .or(base.map(|q| q.difficulty))
                .unwrap_or(Difficulty::Medium),
            category_id,
        })
    }
}

async fn check_category(state: &AppState, category_id: i64) -> Result<(), AppError> {
    let exists = state
        .db
        .category_exists(category_id)
        .await
        .reject("could not check category")?;
    if !exists {
        return Err(AppError::Input("category not found"));
    }
    Ok(())
}

async fn create_question(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(body): ApiJson<QuestionBody>,
) -> Result<impl IntoResponse, AppError> {
    let draft = body.into_draft(None)?;
    check_category(&state, draft.category_id).await?;

    let question = state
        .db
        .create_question(&draft, Some(claims.sub))
        .await
        .reject("could not create question")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_CREATE,
        names::RESOURCE_QUESTION,
        format!("created question {}", question.title),
    )
    .await;
    Ok(views::ok(question))
}

async fn update_question(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<QuestionBody>,
) -> Result<impl IntoResponse, AppError> {
    let existing = state
        .db
        .find_question(id)
        .await
        .reject("could not get question")?
        .or_not_found("question not found")?;

    let category_changed = body.category_id.is_some_and(|c| c != existing.category_id);
    let draft = body.into_draft(Some(&existing))?;
    if category_changed {
        check_category(&state, draft.category_id).await?;
    }

    let question = state
        .db
        .update_question(id, &draft)
        .await
        .reject("could not update question")?
        .or_not_found("question not found")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_UPDATE,
        names::RESOURCE_QUESTION,
        format!("updated question {id}"),
    )
    .await;
    Ok(views::ok(question))
}

async fn delete_question(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let title = state
        .db
        .delete_question(id)
        .await
        .reject("could not delete question")?
        .or_not_found("question not found")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_DELETE,
        names::RESOURCE_QUESTION,
        format!("deleted question {title}"),
    )
    .await;
    Ok(views::done("deleted"))
}

#[derive(Deserialize)]
struct BatchBody {
    #[serde(default)]
    ids: Vec<i64>,
}

async fn delete_questions(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(body): ApiJson<BatchBody>,
) -> Result<impl IntoResponse, AppError> {
    if body.ids.is_empty() {
        return Err(AppError::Input("no questions selected"));
    }

    let titles = state
        .db
        .delete_questions(&body.ids)
        .await
        .reject("could not delete questions")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_DELETE,
        names::RESOURCE_QUESTION,
        format!("batch deleted {} questions: {}", titles.len(), titles.join(", ")),
    )
    .await;
    Ok(views::done("deleted"))
}

async fn import_questions(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(request): ApiJson<ImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.questions.is_empty() {
        return Err(AppError::Input("no questions to import"));
    }

    let rows = request.questions.len();
    let report = state
        .db
        .import_questions(request.questions, request.options, claims.sub)
        .await
        .reject("could not import questions")?;

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_IMPORT,
        names::RESOURCE_QUESTION,
        format!(
            "imported {} of {rows} questions, {} skipped",
            report.imported_count, report.skipped_count
        ),
    )
    .await;
    Ok(views::ok(report))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    infer_type: Option<bool>,
    #[serde(flatten)]
    filter: QuestionQuery,
}

/// One exported question, in the same notation the importer reads.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRow {
    id: i64,
    content: String,
    #[serde(rename = "type")]
    kind: QuestionType,
    difficulty: Difficulty,
    category_id: i64,
    category_name: String,
    options: Vec<String>,
    answer: String,
    explanation: String,
}

impl ExportRow {
    fn new(question: Question, infer_type: bool) -> Self {
        let options = question.options.0;
        let kind = if infer_type {
            answer_mask::classify(&options, question.correct_answer)
        } else {
            question.kind
        };
        let decoded = answer_mask::decode(kind, &options, question.correct_answer, &question.explanation);

        ExportRow {
            id: question.id,
            content: question.content,
            kind,
            difficulty: question.difficulty,
            category_id: question.category_id,
            category_name: question.category_name.unwrap_or_default(),
            options,
            answer: decoded.answer,
            explanation: decoded.explanation,
        }
    }
}

async fn export_questions(
    AdminGuard(claims): AdminGuard,
    State(state): State<AppState>,
    client: ClientInfo,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let infer_type = query.infer_type.unwrap_or(false);
    let questions = state
        .db
        .all_questions(&query.filter.into())
        .await
        .reject("could not export questions")?;

    let rows: Vec<ExportRow> = questions
        .into_iter()
        .map(|q| ExportRow::new(q, infer_type))
        .collect();

    record_by(
        &state,
        &claims,
        &client,
        names::ACTION_EXPORT,
        names::RESOURCE_QUESTION,
        format!("exported {} questions", rows.len()),
    )
    .await;
    Ok(views::ok(rows))
}
