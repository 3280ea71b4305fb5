use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use color_eyre::{eyre::eyre, Result};
use futures_util::FutureExt;
use sqlx::SqliteConnection;

use super::models::QuestionDraft;
use super::question::{insert_question, overwrite_question};
use super::Db;
use crate::quiz::import::{self, ImportItem, ImportOptions, ImportReport, PreparedQuestion, RowOutcome};

impl From<PreparedQuestion> for QuestionDraft {
    fn from(prepared: PreparedQuestion) -> Self {
        Self {
            title: prepared.title,
            content: prepared.content,
            kind: prepared.kind,
            options: prepared.answer.options,
            correct_answer: prepared.answer.correct_answer,
            explanation: prepared.answer.explanation,
            difficulty: prepared.difficulty,
            category_id: prepared.category_id,
        }
    }
}

impl Db {
    /// Imports a batch of questions in a single transaction.
    ///
    /// Invalid rows are reported and skipped; they never abort the batch.
    /// A panic while processing rolls everything back and surfaces as an error.
    pub async fn import_questions(
        &self,
        items: Vec<ImportItem>,
        options: ImportOptions,
        creator_id: i64,
    ) -> Result<ImportReport> {
        let rows = items.len();
        let mut tx = self.pool.begin().await?;

        // On error the transaction is dropped uncommitted, which rolls it back.
        let report = guarded(import_rows(&mut tx, items, options, creator_id)).await?;
        tx.commit().await?;

        tracing::info!(
            rows,
            imported = report.imported_count,
            skipped = report.skipped_count,
            "question import committed"
        );
        Ok(report)
    }
}

async fn import_rows(
    conn: &mut SqliteConnection,
    items: Vec<ImportItem>,
    options: ImportOptions,
    creator_id: i64,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (i, item) in items.into_iter().enumerate() {
        let outcome = import_row(conn, item, options, creator_id).await?;
        if let RowOutcome::Failed(reason) = &outcome {
            tracing::warn!(row = i + 1, "import row rejected: {reason}");
        }
        report.record(i + 1, outcome);
    }

    Ok(report)
}

async fn import_row(
    conn: &mut SqliteConnection,
    item: ImportItem,
    options: ImportOptions,
    creator_id: i64,
) -> Result<RowOutcome> {
    let (kind, difficulty) = match import::check_row(&item) {
        Ok(checked) => checked,
        Err(e) => return Ok(RowOutcome::Failed(e.to_string())),
    };

    let category_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)")
            .bind(item.category_id)
            .fetch_one(&mut *conn)
            .await?;
    if !category_exists {
        return Ok(RowOutcome::Failed("category does not exist".to_string()));
    }

    let duplicate = if options.skip_duplicates {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM questions WHERE content = ? AND category_id = ? ORDER BY id LIMIT 1",
        )
        .bind(&item.content)
        .bind(item.category_id)
        .fetch_optional(&mut *conn)
        .await?
    } else {
        None
    };

    if duplicate.is_some() && !options.update_existing {
        return Ok(RowOutcome::Skipped);
    }

    let draft: QuestionDraft = match import::prepare(item, kind, difficulty) {
        Ok(prepared) => prepared.into(),
        Err(reason) => return Ok(RowOutcome::Failed(reason)),
    };

    match duplicate {
        Some(id) => match overwrite_question(&mut *conn, id, &draft).await {
            Ok(_) => Ok(RowOutcome::Updated),
            Err(e) => Ok(RowOutcome::Failed(format!("could not update question: {e}"))),
        },
        None => match insert_question(&mut *conn, &draft, Some(creator_id)).await {
            Ok(_) => Ok(RowOutcome::Imported),
            Err(e) => Ok(RowOutcome::Failed(format!("could not create question: {e}"))),
        },
    }
}

/// Runs `work`, turning a panic inside it into an error.
async fn guarded<T>(work: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("import aborted by a panic: {message}");
            Err(eyre!("import aborted by a panic: {message}"))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guarded_passes_results_through() {
        assert_eq!(guarded(async { Ok(7) }).await.unwrap(), 7);
        assert!(guarded(async { Err::<(), _>(eyre!("nope")) }).await.is_err());
    }

    #[tokio::test]
    async fn guarded_turns_panics_into_errors() {
        let result: Result<()> = guarded(async { panic!("row exploded") }).await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("row exploded"), "{err}");
    }
}
