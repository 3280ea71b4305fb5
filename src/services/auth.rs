use color_eyre::{eyre::bail, Result};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

use crate::db::models::{Admin, Role, User, UserStatus};
use crate::db::Db;
use crate::services::token::{IssuedToken, TokenService};
use crate::wechat::WechatApi;

// ---------------------------------------------------------------------------
// AuthRepository trait (the storage the auth flows need)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait AuthRepository: Send + Sync {
    fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    fn find_user(&self, id: i64) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    fn find_or_create_wechat_user(
        &self,
        open_id: &str,
        nickname: &str,
    ) -> impl std::future::Future<Output = Result<User>> + Send;

    fn find_or_create_guest(
        &self,
        username: &str,
        nickname: &str,
    ) -> impl std::future::Future<Output = Result<User>> + Send;

    fn verify_admin_password(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Option<Admin>>> + Send;

    fn find_admin(&self, id: i64) -> impl std::future::Future<Output = Result<Option<Admin>>> + Send;
}

impl AuthRepository for Db {
    async fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        Db::verify_user_password(self, username, password).await
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Db::find_user(self, id).await
    }

    async fn find_or_create_wechat_user(&self, open_id: &str, nickname: &str) -> Result<User> {
        Db::find_or_create_wechat_user(self, open_id, nickname).await
    }

    async fn find_or_create_guest(&self, username: &str, nickname: &str) -> Result<User> {
        Db::find_or_create_guest(self, username, nickname).await
    }

    async fn verify_admin_password(&self, username: &str, password: &str) -> Result<Option<Admin>> {
        Db::verify_admin_password(self, username, password).await
    }

    async fn find_admin(&self, id: i64) -> Result<Option<Admin>> {
        Db::find_admin(self, id).await
    }
}

// ---------------------------------------------------------------------------
// WechatClient trait
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait WechatClient: Send + Sync {
    /// Whether mini-program credentials are configured.
    fn is_enabled(&self) -> bool;

    fn code_to_openid(&self, code: &str) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl WechatClient for Option<WechatApi> {
    fn is_enabled(&self) -> bool {
        self.is_some()
    }

    async fn code_to_openid(&self, code: &str) -> Result<String> {
        match self {
            Some(api) => api.code_to_openid(code).await,
            None => bail!("WeChat login is not configured"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

pub struct UserSession {
    pub token: IssuedToken,
    pub user: User,
}

pub struct AdminSession {
    pub token: IssuedToken,
    pub admin: Admin,
}

pub enum LoginOutcome {
    Success(UserSession),
    /// Unknown username, no password set, or wrong password.
    InvalidCredentials,
    AccountDisabled,
}

pub enum WechatLoginOutcome {
    Success(UserSession),
    NotConfigured,
    /// WeChat refused the code. Contains its reason.
    Rejected(String),
    AccountDisabled,
}

pub enum AdminLoginOutcome {
    Success(AdminSession),
    InvalidCredentials,
}

pub enum RefreshOutcome {
    Success(IssuedToken),
    InvalidToken,
    UnknownAccount,
    AccountDisabled,
}

const GUEST_USERNAME_MAX: usize = 50;
const NICKNAME_SUFFIX_LEN: usize = 6;

// ---------------------------------------------------------------------------
// AuthService
// ---------------------------------------------------------------------------

pub struct AuthService<R: AuthRepository = Db, W: WechatClient = Option<WechatApi>> {
    repo: R,
    wechat: W,
    tokens: TokenService,
}

impl<R: AuthRepository + Clone, W: WechatClient + Clone> Clone for AuthService<R, W> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            wechat: self.wechat.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<R: AuthRepository, W: WechatClient> AuthService<R, W> {
    pub fn new(repo: R, wechat: W, tokens: TokenService) -> Self {
        Self { repo, wechat, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn password_login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let Some(user) = self.repo.verify_user_password(username, password).await? else {
            return Ok(LoginOutcome::InvalidCredentials);
        };
        if user.status == UserStatus::Disabled {
            return Ok(LoginOutcome::AccountDisabled);
        }

        let token = self.issue_for_user(&user)?;
        tracing::info!(user_id = user.id, "password login");
        Ok(LoginOutcome::Success(UserSession { token, user }))
    }

    pub async fn wechat_login(&self, code: &str) -> Result<WechatLoginOutcome> {
        if !self.wechat.is_enabled() {
            return Ok(WechatLoginOutcome::NotConfigured);
        }

        let open_id = match self.wechat.code_to_openid(code).await {
            Ok(open_id) => open_id,
            Err(e) => return Ok(WechatLoginOutcome::Rejected(e.to_string())),
        };

        let nickname = format!("微信用户{}", random_suffix());
        let user = self.repo.find_or_create_wechat_user(&open_id, &nickname).await?;
        if user.status == UserStatus::Disabled {
            return Ok(WechatLoginOutcome::AccountDisabled);
        }

        let token = self.issue_for_user(&user)?;
        tracing::info!(user_id = user.id, "wechat login");
        Ok(WechatLoginOutcome::Success(UserSession { token, user }))
    }

    /// Logs a device in as a guest, creating its account on first sight.
    pub async fn guest_login(&self, device_id: &str) -> Result<LoginOutcome> {
        let username = guest_username(device_id);
        let nickname = format!("游客{}", random_suffix());

        let user = self.repo.find_or_create_guest(&username, &nickname).await?;
        if user.status == UserStatus::Disabled {
            return Ok(LoginOutcome::AccountDisabled);
        }

        let token = self.issue_for_user(&user)?;
        tracing::info!(user_id = user.id, "guest login");
        Ok(LoginOutcome::Success(UserSession { token, user }))
    }

    pub async fn admin_login(&self, username: &str, password: &str) -> Result<AdminLoginOutcome> {
        let Some(admin) = self.repo.verify_admin_password(username, password).await? else {
            return Ok(AdminLoginOutcome::InvalidCredentials);
        };

        let token = self.tokens.issue(admin.id, Role::Admin, &admin.username)?;
        tracing::info!(admin_id = admin.id, "admin login");
        Ok(AdminLoginOutcome::Success(AdminSession { token, admin }))
    }

    /// Trades a still-valid token for a fresh one if its account still exists.
    pub async fn refresh(&self, token: &str) -> Result<RefreshOutcome> {
        let Ok(claims) = self.tokens.verify(token) else {
            return Ok(RefreshOutcome::InvalidToken);
        };

        if claims.role == Role::Admin {
            let Some(admin) = self.repo.find_admin(claims.sub).await? else {
                return Ok(RefreshOutcome::UnknownAccount);
            };
            let token = self.tokens.issue(admin.id, Role::Admin, &admin.username)?;
            return Ok(RefreshOutcome::Success(token));
        }

        let Some(user) = self.repo.find_user(claims.sub).await? else {
            return Ok(RefreshOutcome::UnknownAccount);
        };
        if user.status == UserStatus::Disabled {
            return Ok(RefreshOutcome::AccountDisabled);
        }

        Ok(RefreshOutcome::Success(self.issue_for_user(&user)?))
    }

    fn issue_for_user(&self, user: &User) -> Result<IssuedToken> {
        let name = user.username.as_deref().unwrap_or(&user.nickname);
        self.tokens.issue(user.id, user.role, name)
    }
}

/// Device id for guest login: the explicit id when given, else a
/// fingerprint of the client's address and user agent.
pub fn guest_device_id(explicit: Option<&str>, ip: &str, user_agent: &str) -> String {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    let digest = Sha256::digest(format!("{ip}{user_agent}").as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn guest_username(device_id: &str) -> String {
    format!("guest_{device_id}").chars().take(GUEST_USERNAME_MAX).collect()
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NICKNAME_SUFFIX_LEN)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDateTime;
    use mockall::predicate::eq;

    use super::*;

    fn tokens() -> TokenService {
        TokenService::new("test-secret", 24)
    }

    fn service(mock_repo: MockAuthRepository) -> AuthService<MockAuthRepository, MockWechatClient> {
        let mut wechat = MockWechatClient::new();
        wechat.expect_is_enabled().returning(|| false);
        AuthService::new(mock_repo, wechat, tokens())
    }

    fn service_with_wechat(
        mock_repo: MockAuthRepository,
        wechat: MockWechatClient,
    ) -> AuthService<MockAuthRepository, MockWechatClient> {
        AuthService::new(mock_repo, wechat, tokens())
    }

    fn user(id: i64, role: Role, status: UserStatus) -> User {
        User {
            id,
            open_id: None,
            username: Some(format!("user{id}")),
            email: None,
            password_hash: None,
            nickname: format!("nick{id}"),
            avatar: String::new(),
            role,
            status,
            is_guest: role == Role::Guest,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    fn admin(id: i64) -> Admin {
        Admin {
            id,
            username: "admin".to_string(),
            password_hash: String::new(),
            email: String::new(),
            role: "admin".to_string(),
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    // ----- password login -----

    #[tokio::test]
    async fn password_login_issues_user_token() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_user_password()
            .with(eq("alice"), eq("secret"))
            .returning(|_, _| Box::pin(async { Ok(Some(user(7, Role::User, UserStatus::Active))) }));

        let outcome = service(mock).password_login("alice", "secret").await.unwrap();
        let LoginOutcome::Success(session) = outcome else {
            panic!("expected success");
        };
        let claims = tokens().verify(&session.token.token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.name, "user7");
    }

    #[tokio::test]
    async fn password_login_rejects_bad_credentials() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_user_password()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let outcome = service(mock).password_login("alice", "wrong").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
    }

    #[tokio::test]
    async fn password_login_rejects_disabled_accounts() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_user_password()
            .returning(|_, _| Box::pin(async { Ok(Some(user(7, Role::User, UserStatus::Disabled))) }));

        let outcome = service(mock).password_login("alice", "secret").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::AccountDisabled));
    }

    // ----- wechat login -----

    #[tokio::test]
    async fn wechat_login_needs_credentials() {
        let outcome = service(MockAuthRepository::new()).wechat_login("code").await.unwrap();
        assert!(matches!(outcome, WechatLoginOutcome::NotConfigured));
    }

    #[tokio::test]
    async fn wechat_login_creates_user_from_openid() {
        let mut wechat = MockWechatClient::new();
        wechat.expect_is_enabled().returning(|| true);
        wechat
            .expect_code_to_openid()
            .with(eq("the-code"))
            .returning(|_| Box::pin(async { Ok("openid-1".to_string()) }));

        let mut mock = MockAuthRepository::new();
        mock.expect_find_or_create_wechat_user()
            .withf(|open_id, nickname| open_id == "openid-1" && nickname.starts_with("微信用户"))
            .returning(|_, _| Box::pin(async { Ok(user(3, Role::User, UserStatus::Active)) }));

        let outcome = service_with_wechat(mock, wechat).wechat_login("the-code").await.unwrap();
        assert!(matches!(outcome, WechatLoginOutcome::Success(s) if s.user.id == 3));
    }

    #[tokio::test]
    async fn wechat_login_reports_rejected_codes() {
        let mut wechat = MockWechatClient::new();
        wechat.expect_is_enabled().returning(|| true);
        wechat
            .expect_code_to_openid()
            .returning(|_| Box::pin(async { Err(color_eyre::eyre::eyre!("invalid code")) }));

        let outcome = service_with_wechat(MockAuthRepository::new(), wechat)
            .wechat_login("stale")
            .await
            .unwrap();
        assert!(matches!(outcome, WechatLoginOutcome::Rejected(reason) if reason.contains("invalid code")));
    }

    // ----- guest login -----

    #[tokio::test]
    async fn guest_login_derives_username_from_device() {
        let mut mock = MockAuthRepository::new();
        mock.expect_find_or_create_guest()
            .withf(|username, nickname| username == "guest_device-9" && nickname.starts_with("游客"))
            .returning(|_, _| Box::pin(async { Ok(user(11, Role::Guest, UserStatus::Active)) }));

        let outcome = service(mock).guest_login("device-9").await.unwrap();
        let LoginOutcome::Success(session) = outcome else {
            panic!("expected success");
        };
        assert_eq!(tokens().verify(&session.token.token).unwrap().role, Role::Guest);
    }

    #[test]
    fn guest_usernames_are_capped() {
        let long = "x".repeat(80);
        assert_eq!(guest_username(&long).chars().count(), GUEST_USERNAME_MAX);
    }

    #[test]
    fn device_id_prefers_explicit_value() {
        assert_eq!(guest_device_id(Some("abc"), "1.2.3.4", "ua"), "abc");
        assert_eq!(guest_device_id(Some("  "), "1.2.3.4", "ua").len(), 16);
    }

    #[test]
    fn device_fingerprint_is_stable() {
        let a = guest_device_id(None, "1.2.3.4", "Mozilla");
        let b = guest_device_id(None, "1.2.3.4", "Mozilla");
        let c = guest_device_id(None, "5.6.7.8", "Mozilla");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // ----- admin login -----

    #[tokio::test]
    async fn admin_login_issues_admin_token() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_admin_password()
            .returning(|_, _| Box::pin(async { Ok(Some(admin(1))) }));

        let outcome = service(mock).admin_login("admin", "123456").await.unwrap();
        let AdminLoginOutcome::Success(session) = outcome else {
            panic!("expected success");
        };
        assert_eq!(tokens().verify(&session.token.token).unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn admin_login_rejects_bad_password() {
        let mut mock = MockAuthRepository::new();
        mock.expect_verify_admin_password()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let outcome = service(mock).admin_login("admin", "nope").await.unwrap();
        assert!(matches!(outcome, AdminLoginOutcome::InvalidCredentials));
    }

    // ----- refresh -----

    #[tokio::test]
    async fn refresh_rejects_garbage() {
        let outcome = service(MockAuthRepository::new()).refresh("garbage").await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_requires_existing_user() {
        let mut mock = MockAuthRepository::new();
        mock.expect_find_user()
            .with(eq(5))
            .returning(|_| Box::pin(async { Ok(None) }));

        let old = tokens().issue(5, Role::User, "gone").unwrap();
        let outcome = service(mock).refresh(&old.token).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::UnknownAccount));
    }

    #[tokio::test]
    async fn refresh_reissues_for_active_user() {
        let mut mock = MockAuthRepository::new();
        mock.expect_find_user()
            .returning(|id| Box::pin(async move { Ok(Some(user(id, Role::User, UserStatus::Active))) }));

        let old = tokens().issue(5, Role::User, "user5").unwrap();
        let outcome = service(mock).refresh(&old.token).await.unwrap();
        let RefreshOutcome::Success(fresh) = outcome else {
            panic!("expected success");
        };
        assert_eq!(tokens().verify(&fresh.token).unwrap().sub, 5);
    }

    #[tokio::test]
    async fn refresh_looks_up_admins_for_admin_tokens() {
        let mut mock = MockAuthRepository::new();
        mock.expect_find_admin()
            .with(eq(1))
            .returning(|id| Box::pin(async move { Ok(Some(admin(id))) }));

        let old = tokens().issue(1, Role::Admin, "admin").unwrap();
        let outcome = service(mock).refresh(&old.token).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Success(_)));
    }
}
