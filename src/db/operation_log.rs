use color_eyre::Result;
use sqlx::{QueryBuilder, Sqlite};

use super::models::{NewOperationLog, OperationLog, OperationLogFilter};
use super::{like_pattern, Db, Page};

impl Db {
    pub async fn log_operation(&self, entry: NewOperationLog) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO operation_logs (operator, action, resource, description, ip, user_agent)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&entry.operator)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(&entry.description)
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;

        tracing::debug!(operator = %entry.operator, action = entry.action, "operation logged");
        Ok(())
    }

    pub async fn list_operation_logs(
        &self,
        filter: &OperationLogFilter,
        page: Page,
    ) -> Result<(Vec<OperationLog>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM operation_logs WHERE 1 = 1");
        push_log_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(
            r#"SELECT id, operator, action, resource, description, ip, user_agent, created_at
               FROM operation_logs WHERE 1 = 1"#,
        );
        push_log_filter(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let logs = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((logs, total))
    }
}

fn push_log_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &OperationLogFilter) {
    if let Some(operator) = &filter.operator {
        query.push(" AND operator LIKE ").push_bind(like_pattern(operator));
    }
    if let Some(action) = &filter.action {
        query.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(start) = &filter.start_time {
        query.push(" AND created_at >= ").push_bind(start.clone());
    }
    if let Some(end) = &filter.end_time {
        query.push(" AND created_at <= ").push_bind(end.clone());
    }
}
