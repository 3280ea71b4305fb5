use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use color_eyre::{eyre::eyre, Result};
use sqlx::{QueryBuilder, Sqlite};

use super::models::{NewUser, User, UserFilter, UserStatus, UserUpdate};
use super::{like_pattern, Db, Page};

const USER_COLUMNS: &str = "id, open_id, username, email, password_hash, nickname, avatar, \
                            role, status, is_guest, created_at, updated_at";

impl Db {
    pub async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Returns the user when the password matches its stored hash.
    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_user_by_username(username).await? else {
            return Ok(None);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Ok(None);
        };

        if verify_password(password, hash).await {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let password_hash = hash_password(&new_user.password).await?;
        let nickname = new_user
            .nickname
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| new_user.username.clone());

        let user: User = sqlx::query_as(&format!(
            r#"INSERT INTO users (username, email, password_hash, nickname, avatar, role)
               VALUES (?, ?, ?, ?, ?, 'user')
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(nickname)
        .bind(new_user.avatar.clone().unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = user.id, "new user created: {}", new_user.username);
        Ok(user)
    }

    /// Finds the account bound to a WeChat open id, creating it on first login.
    pub async fn find_or_create_wechat_user(&self, open_id: &str, nickname: &str) -> Result<User> {
        let existing: Option<User> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE open_id = ?"
        ))
        .bind(open_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user) = existing {
            return Ok(user);
        }

        let user: User = sqlx::query_as(&format!(
            r#"INSERT INTO users (open_id, nickname, role) VALUES (?, ?, 'user')
               ON CONFLICT (open_id) DO UPDATE SET updated_at = datetime('now')
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(open_id)
        .bind(nickname)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = user.id, "new wechat user created");
        Ok(user)
    }

    /// Finds the guest account of a device, creating it on first login.
    pub async fn find_or_create_guest(&self, username: &str, nickname: &str) -> Result<User> {
        let existing: Option<User> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? AND is_guest = TRUE"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user) = existing {
            return Ok(user);
        }

        let user: User = sqlx::query_as(&format!(
            r#"INSERT INTO users (username, nickname, role, is_guest) VALUES (?, ?, 'guest', TRUE)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(username)
        .bind(nickname)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(user_id = user.id, "new guest created: {username}");
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        id: i64,
        nickname: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!(
            r#"UPDATE users
               SET nickname = COALESCE(NULLIF(?, ''), nickname),
                   avatar = COALESCE(NULLIF(?, ''), avatar),
                   updated_at = datetime('now')
               WHERE id = ?
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(nickname)
        .bind(avatar)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self, filter: &UserFilter, page: Page) -> Result<(Vec<User>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1 = 1");
        push_user_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));
        push_user_filter(&mut query, filter);
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(page.size)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let users = query.build_query_as().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    /// Whether another account already uses `username` or `email`.
    pub async fn user_identity_taken(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except_id: Option<i64>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                   SELECT 1 FROM users
                   WHERE ((? IS NOT NULL AND username = ?) OR (? IS NOT NULL AND email = ?))
                     AND id IS NOT ?
               )"#,
        )
        .bind(username)
        .bind(username)
        .bind(email)
        .bind(email)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        let password_hash = match update.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE users SET updated_at = datetime('now')");
        if let Some(username) = update.username.as_ref().filter(|s| !s.is_empty()) {
            query.push(", username = ").push_bind(username.clone());
        }
        if let Some(email) = &update.email {
            query.push(", email = ").push_bind(email.clone());
        }
        if let Some(nickname) = &update.nickname {
            query.push(", nickname = ").push_bind(nickname.clone());
        }
        if let Some(avatar) = &update.avatar {
            query.push(", avatar = ").push_bind(avatar.clone());
        }
        if let Some(status) = update.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(hash) = password_hash {
            query.push(", password_hash = ").push_bind(hash);
        }
        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {USER_COLUMNS}"));

        let user = query.build_query_as().fetch_optional(&self.pool).await?;
        Ok(user)
    }

    pub async fn set_user_status(&self, id: i64, status: UserStatus) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!(
            "UPDATE users SET status = ?, updated_at = datetime('now') WHERE id = ? RETURNING {USER_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        tracing::info!("user {id} status set to {}", status.as_str());
        Ok(user)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_users(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM users WHERE id IN (");
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(*id);
        }
        list.push_unseparated(")");

        let result = query.build().execute(&self.pool).await?;
        tracing::info!("deleted {} users", result.rows_affected());
        Ok(result.rows_affected())
    }
}

fn push_user_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    if let Some(username) = &filter.username {
        query.push(" AND username LIKE ").push_bind(like_pattern(username));
    }
    if let Some(email) = &filter.email {
        query.push(" AND email LIKE ").push_bind(like_pattern(email));
    }
    if let Some(role) = filter.role {
        query.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
}

pub(crate) async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| eyre!("failed to hash password: {e}"))
    })
    .await?
}

pub(crate) async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}
