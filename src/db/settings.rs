use color_eyre::{eyre::WrapErr, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::Db;

/// A settings group stored as one JSON document under a fixed key.
pub trait SettingsGroup: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicSettings {
    pub system_name: String,
    pub system_description: String,
    pub system_version: String,
    pub contact_email: String,
    pub system_status: String,
    pub maintenance_notice: String,
}

impl Default for BasicSettings {
    fn default() -> Self {
        Self {
            system_name: "刷刷题".to_string(),
            system_description: "专业的在线刷题平台".to_string(),
            system_version: "1.0.0".to_string(),
            contact_email: "admin@example.com".to_string(),
            system_status: "normal".to_string(),
            maintenance_notice: String::new(),
        }
    }
}

impl SettingsGroup for BasicSettings {
    const KEY: &'static str = "basic";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    /// Answers per user per day, 0 for unlimited.
    pub daily_limit: i64,
    /// Seconds per question, 0 for unlimited.
    pub time_limit: i64,
    pub enable_points: bool,
    pub correct_points: i64,
    pub wrong_points: i64,
    pub quiz_modes: Vec<String>,
    pub show_explanation: String,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            daily_limit: 0,
            time_limit: 0,
            enable_points: true,
            correct_points: 1,
            wrong_points: 0,
            quiz_modes: vec!["random".to_string(), "category".to_string()],
            show_explanation: "after_answer".to_string(),
        }
    }
}

impl SettingsGroup for QuizSettings {
    const KEY: &'static str = "quiz";
}

impl Db {
    /// Stored settings for the group, or its defaults when nothing was saved.
    pub async fn settings<S: SettingsGroup>(&self) -> Result<S> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM system_settings WHERE key = ?")
            .bind(S::KEY)
            .fetch_optional(&self.pool)
            .await?;

        match value {
            Some(value) => serde_json::from_str(&value)
                .wrap_err_with(|| format!("stored {} settings are not valid JSON", S::KEY)),
            None => Ok(S::default()),
        }
    }

    pub async fn save_settings<S: SettingsGroup>(&self, settings: &S) -> Result<()> {
        let value = serde_json::to_string(settings)?;
        sqlx::query(
            r#"INSERT INTO system_settings (key, value) VALUES (?, ?)
               ON CONFLICT (key) DO UPDATE
               SET value = excluded.value, updated_at = datetime('now')"#,
        )
        .bind(S::KEY)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::info!(key = S::KEY, "system settings saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_in_defaults() {
        let quiz: QuizSettings = serde_json::from_str(r#"{"daily_limit": 30}"#).unwrap();
        assert_eq!(quiz.daily_limit, 30);
        assert_eq!(quiz.quiz_modes, vec!["random", "category"]);
        assert_eq!(quiz.show_explanation, "after_answer");
    }

    #[test]
    fn basic_defaults_serialize_snake_case() {
        let json = serde_json::to_value(BasicSettings::default()).unwrap();
        assert_eq!(json["system_name"], "刷刷题");
        assert_eq!(json["system_status"], "normal");
    }
}
