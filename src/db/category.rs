use color_eyre::Result;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

use super::models::{Category, CategoryFilter, CategoryUpdate, NewCategory};
use super::{like_pattern, Db, Page};

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.description, c.parent_id, p.name AS parent_name, c.level,
           c.sort AS sort_order, c.status,
           (SELECT COUNT(*) FROM questions q WHERE q.category_id = c.id) AS question_count,
           c.created_at, c.updated_at
    FROM categories c
    LEFT JOIN categories p ON p.id = c.parent_id
    WHERE 1 = 1
"#;

const DISPLAY_ORDER: &str = " ORDER BY c.level ASC, c.sort ASC, c.id ASC";

pub enum CategoryOutcome {
    Saved(Category),
    NotFound,
    ParentNotFound,
    /// The new parent is the category itself or one of its descendants.
    ParentCycle,
}

pub enum DeleteCategoryOutcome {
    Deleted(Category),
    NotFound,
    HasChildren,
    HasQuestions,
}

impl Db {
    /// All matching categories in display order, each with its live question count.
    pub async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>> {
        let mut query = QueryBuilder::new(CATEGORY_SELECT);
        push_category_filter(&mut query, filter);
        query.push(DISPLAY_ORDER);

        let categories = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(categories)
    }

    pub async fn list_categories_page(
        &self,
        filter: &CategoryFilter,
        page: Page,
    ) -> Result<(Vec<Category>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM categories c WHERE 1 = 1");
        push_category_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(CATEGORY_SELECT);
        push_category_filter(&mut query, filter);
        query
            .push(DISPLAY_ORDER)
            .push(" LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let categories = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((categories, total))
    }

    pub async fn find_category(&self, id: i64) -> Result<Option<Category>> {
        fetch_category(&self.pool, id).await
    }

    pub async fn create_category(&self, new: &NewCategory) -> Result<CategoryOutcome> {
        let mut tx = self.pool.begin().await?;

        let level = match new.parent_id {
            None => 1,
            Some(parent_id) => {
                let parent_level: Option<i64> =
                    sqlx::query_scalar("SELECT level FROM categories WHERE id = ?")
                        .bind(parent_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                match parent_level {
                    Some(level) => level + 1,
                    None => return Ok(CategoryOutcome::ParentNotFound),
                }
            }
        };

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO categories (name, description, parent_id, level, sort, status)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.parent_id)
        .bind(level)
        .bind(new.sort_order)
        .bind(new.status)
        .fetch_one(&mut *tx)
        .await?;

        let category = fetch_category(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(category_id = id, level, "category created: {}", new.name);
        Ok(category.map_or(CategoryOutcome::NotFound, CategoryOutcome::Saved))
    }

    /// Applies a partial update. Re-parenting recomputes the level of the
    /// category and shifts its whole subtree by the same amount.
    pub async fn update_category(&self, id: i64, update: &CategoryUpdate) -> Result<CategoryOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Option<i64>, i64)> =
            sqlx::query_as("SELECT parent_id, level FROM categories WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((current_parent, current_level)) = current else {
            return Ok(CategoryOutcome::NotFound);
        };

        let (parent_id, level) = match update.parent_id {
            None => (current_parent, current_level),
            Some(None) => (None, 1),
            Some(Some(parent_id)) => {
                let in_subtree: bool = sqlx::query_scalar(
                    r#"
                    WITH RECURSIVE subtree(id) AS (
                        SELECT ?
                        UNION
                        SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
                    )
                    SELECT EXISTS(SELECT 1 FROM subtree WHERE id = ?)
                    "#,
                )
                .bind(id)
                .bind(parent_id)
                .fetch_one(&mut *tx)
                .await?;
                if in_subtree {
                    return Ok(CategoryOutcome::ParentCycle);
                }

                let parent_level: Option<i64> =
                    sqlx::query_scalar("SELECT level FROM categories WHERE id = ?")
                        .bind(parent_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                match parent_level {
                    Some(parent_level) => (Some(parent_id), parent_level + 1),
                    None => return Ok(CategoryOutcome::ParentNotFound),
                }
            }
        };

        sqlx::query(
            r#"UPDATE categories
               SET name = COALESCE(?, name),
                   description = COALESCE(?, description),
                   parent_id = ?,
                   level = ?,
                   sort = COALESCE(?, sort),
                   status = COALESCE(?, status),
                   updated_at = datetime('now')
               WHERE id = ?"#,
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(parent_id)
        .bind(level)
        .bind(update.sort_order)
        .bind(update.status)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let shift = level - current_level;
        if shift != 0 {
            let moved = sqlx::query(
                r#"
                WITH RECURSIVE subtree(id) AS (
                    SELECT id FROM categories WHERE parent_id = ?
                    UNION
                    SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
                )
                UPDATE categories SET level = level + ?, updated_at = datetime('now')
                WHERE id IN (SELECT id FROM subtree)
                "#,
            )
            .bind(id)
            .bind(shift)
            .execute(&mut *tx)
            .await?;
            tracing::debug!(category_id = id, shift, "re-levelled {} descendants", moved.rows_affected());
        }

        let category = fetch_category(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(category_id = id, "category updated");
        Ok(category.map_or(CategoryOutcome::NotFound, CategoryOutcome::Saved))
    }

    pub async fn set_category_status(&self, id: i64, status: i64) -> Result<Option<Category>> {
        let result = sqlx::query(
            "UPDATE categories SET status = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_category(id).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<DeleteCategoryOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(category) = fetch_category(&mut *tx, id).await? else {
            return Ok(DeleteCategoryOutcome::NotFound);
        };

        let has_children: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE parent_id = ?)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if has_children {
            return Ok(DeleteCategoryOutcome::HasChildren);
        }
        if category.question_count > 0 {
            return Ok(DeleteCategoryOutcome::HasQuestions);
        }

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(category_id = id, "category deleted: {}", category.name);
        Ok(DeleteCategoryOutcome::Deleted(category))
    }
}

async fn fetch_category<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<Option<Category>> {
    let category = sqlx::query_as(&format!("{CATEGORY_SELECT} AND c.id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(category)
}

fn push_category_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &CategoryFilter) {
    if let Some(keyword) = &filter.keyword {
        query.push(" AND c.name LIKE ").push_bind(like_pattern(keyword));
    }
    if let Some(status) = filter.status {
        query.push(" AND c.status = ").push_bind(status);
    }
    match filter.parent_id {
        Some(0) => {
            query.push(" AND c.parent_id IS NULL");
        }
        Some(parent_id) => {
            query.push(" AND c.parent_id = ").push_bind(parent_id);
        }
        None => {}
    }
}
