use color_eyre::Result;

use super::models::Admin;
use super::user::{hash_password, verify_password};
use super::Db;

const ADMIN_COLUMNS: &str = "id, username, password_hash, email, role, created_at, updated_at";

impl Db {
    /// Creates the default `admin` account unless it already exists.
    ///
    /// Returns whether an account was created.
    pub async fn ensure_default_admin(&self, password: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM admins WHERE username = 'admin')")
                .fetch_one(&self.pool)
                .await?;

        if exists {
            return Ok(false);
        }

        let password_hash = hash_password(password).await?;
        sqlx::query(
            "INSERT INTO admins (username, password_hash, email) VALUES ('admin', ?, 'admin@example.com')",
        )
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        tracing::info!("default admin account created");
        Ok(true)
    }

    pub async fn find_admin(&self, id: i64) -> Result<Option<Admin>> {
        let admin = sqlx::query_as(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(admin)
    }

    pub async fn verify_admin_password(&self, username: &str, password: &str) -> Result<Option<Admin>> {
        let admin: Option<Admin> = sqlx::query_as(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match admin {
            Some(admin) if verify_password(password, &admin.password_hash).await => Ok(Some(admin)),
            _ => Ok(None),
        }
    }
}
