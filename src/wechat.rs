use color_eyre::{eyre::bail, Result};
use serde::Deserialize;

const JSCODE2SESSION_URL: &str = "https://api.weixin.qq.com/sns/jscode2session";

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(default)]
    openid: String,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Mini-program credentials for the `jscode2session` exchange.
#[derive(Clone)]
pub struct WechatApi {
    client: reqwest::Client,
    app_id: String,
    secret: String,
}

impl WechatApi {
    /// `None` when either credential is missing, which disables WeChat login.
    pub fn from_credentials(app_id: Option<String>, secret: Option<String>) -> Option<Self> {
        match (app_id, secret) {
            (Some(app_id), Some(secret)) if !app_id.is_empty() && !secret.is_empty() => Some(Self {
                client: reqwest::Client::new(),
                app_id,
                secret,
            }),
            _ => None,
        }
    }

    /// Exchanges a login code for the user's openid.
    pub async fn code_to_openid(&self, code: &str) -> Result<String> {
        let resp = self
            .client
            .get(JSCODE2SESSION_URL)
            .query(&[
                ("appid", self.app_id.as_str()),
                ("secret", self.secret.as_str()),
                ("js_code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            tracing::error!("WeChat API error: {status}");
            bail!("WeChat API returned {status}");
        }

        let session: SessionResponse = resp.json().await?;
        if session.errcode != 0 {
            tracing::warn!(errcode = session.errcode, "jscode2session rejected code: {}", session.errmsg);
            bail!("WeChat login failed: {}", session.errmsg);
        }
        if session.openid.is_empty() {
            bail!("WeChat login failed: empty openid");
        }

        Ok(session.openid)
    }
}
