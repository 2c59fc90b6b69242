//! 가입, 로그인, 토큰 재발급 오케스트레이션.
//!
//! Credential Codec과 Credential Store Adapter만 사용합니다. 두 의존성은
//! 생성 시 주입되며 이후 변경되지 않습니다.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use gatekeeper_core::{ExternalUserId, IdentityRecord, NewIdentity, Page, PageRequest, Role};

use crate::auth::jwt::{IdentityClaims, JwtError, TokenCodec};
use crate::auth::password::{
    hash_password_blocking, verify_decoy_blocking, verify_password_blocking, PasswordError,
    MIN_PASSWORD_LEN,
};
use crate::metrics::record_auth_event;
use crate::repository::{IdentityStore, StoreError, UniqueField};

// ================================================================================================
// Errors
// ================================================================================================

/// Authenticator 에러.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("입력 검증 실패: {0}")]
    Validation(String),
    #[error("이미 사용 중인 이메일입니다")]
    DuplicateEmail,
    #[error("이미 사용 중인 전화번호입니다")]
    DuplicatePhone,
    /// 이메일 없음과 비밀번호 불일치를 구분하지 않습니다.
    #[error("email or password is incorrect")]
    InvalidCredentials,
    #[error("유효하지 않은 Refresh Token")]
    InvalidRefreshToken,
    #[error("사용자를 찾을 수 없습니다")]
    NotFound,
    /// 저장소 실패 또는 시간 초과. 상세 내용은 로그에만 남깁니다.
    #[error("저장소 처리 중 오류가 발생했습니다")]
    Persistence(String),
    #[error("내부 오류가 발생했습니다")]
    Internal(String),
}

impl AuthError {
    /// 응답/메트릭용 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::DuplicateEmail => "DUPLICATE_EMAIL",
            AuthError::DuplicatePhone => "DUPLICATE_PHONE",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::Persistence(_) => "PERSISTENCE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(UniqueField::Email) => AuthError::DuplicateEmail,
            StoreError::Duplicate(UniqueField::Phone) => AuthError::DuplicatePhone,
            other => AuthError::Persistence(other.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(e: validator::ValidationErrors) -> Self {
        AuthError::Validation(e.to_string())
    }
}

// ================================================================================================
// Requests
// ================================================================================================

/// 가입 요청.
///
/// 모든 필드는 필수이지만 "값 없음"과 "빈 문자열"을 구분하기 위해 `Option`으로 받습니다.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(
        required(message = "first name is required"),
        length(min = 1, max = 100, message = "first name must be 1-100 characters")
    )]
    pub first_name: Option<String>,
    #[validate(
        required(message = "last name is required"),
        length(min = 1, max = 100, message = "last name must be 1-100 characters")
    )]
    pub last_name: Option<String>,
    #[serde(alias = "secret")]
    #[validate(
        required(message = "password is required"),
        length(min = MIN_PASSWORD_LEN, message = "password must be at least 6 characters")
    )]
    pub password: Option<String>,
    #[validate(
        required(message = "email is required"),
        email(message = "email is not valid")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "phone is required"),
        length(min = 1, message = "phone must not be empty")
    )]
    pub phone: Option<String>,
    /// ADMIN | USER
    #[serde(alias = "userType")]
    #[validate(required(message = "role is required"))]
    pub role: Option<String>,
}

/// 검증을 통과한 가입 정보.
struct SignupCandidate {
    first_name: String,
    last_name: String,
    password: String,
    email: String,
    phone: String,
    role: Role,
}

impl SignupRequest {
    fn into_candidate(self) -> Result<SignupCandidate, AuthError> {
        self.validate()?;

        let required = |field: Option<String>, name: &str| {
            field.ok_or_else(|| AuthError::Validation(format!("{name} is required")))
        };
        let role_raw = required(self.role, "role")?;
        let role = Role::parse(&role_raw)
            .ok_or_else(|| AuthError::Validation(format!("role must be ADMIN or USER, got '{role_raw}'")))?;

        Ok(SignupCandidate {
            first_name: required(self.first_name, "first name")?,
            last_name: required(self.last_name, "last name")?,
            password: required(self.password, "password")?,
            email: required(self.email, "email")?,
            phone: required(self.phone, "phone")?,
            role,
        })
    }
}

/// 로그인 요청.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "secret")]
    pub password: Option<String>,
}

/// 토큰 재발급 요청.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ================================================================================================
// Authenticator
// ================================================================================================

/// 가입/로그인/재발급 서비스.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    store: Arc<dyn IdentityStore>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn IdentityStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// 신규 가입.
    ///
    /// 이메일/전화번호 사전 확인 후 해싱, 토큰 발급, 단일 삽입 순으로 진행합니다.
    /// 사전 확인은 최적화일 뿐이며 동시 가입 경쟁에서는 저장소의 유일성 제약이 최종 판정을 내립니다.
    pub async fn signup(&self, request: SignupRequest) -> Result<IdentityRecord, AuthError> {
        let result = self.signup_inner(request).await;
        record_outcome("signup", &result);
        result
    }

    async fn signup_inner(&self, request: SignupRequest) -> Result<IdentityRecord, AuthError> {
        let candidate = request.into_candidate()?;

        if self.store.count_by_email(&candidate.email).await? > 0 {
            return Err(AuthError::DuplicateEmail);
        }
        if self.store.count_by_phone(&candidate.phone).await? > 0 {
            return Err(AuthError::DuplicatePhone);
        }

        let password_hash = hash_password_blocking(candidate.password)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let now = Utc::now();
        let mut record = IdentityRecord::create(
            NewIdentity {
                first_name: candidate.first_name,
                last_name: candidate.last_name,
                email: candidate.email,
                phone: candidate.phone,
                password_hash,
                role: candidate.role,
            },
            now,
        );

        let pair = self.codec.issue_pair(&IdentityClaims::from(&record))?;
        record.set_tokens(pair.access_token, pair.refresh_token, now);

        let ack = self.store.insert(&record).await?;
        tracing::info!(
            user_id = %record.user_id,
            inserted_id = %ack.inserted_id,
            role = %record.role,
            "Identity created"
        );
        Ok(record)
    }

    /// 로그인.
    ///
    /// 실패 사유와 관계없이 동일한 `InvalidCredentials`를 반환합니다. 이메일이 없어도
    /// 비밀번호 검증 한 번의 비용을 치르므로 응답 시간으로 계정 존재를 알 수 없습니다.
    pub async fn login(&self, request: LoginRequest) -> Result<IdentityRecord, AuthError> {
        let result = self.login_inner(request).await;
        record_outcome("login", &result);
        result
    }

    async fn login_inner(&self, request: LoginRequest) -> Result<IdentityRecord, AuthError> {
        let (Some(email), Some(password)) = (request.email, request.password) else {
            return Err(AuthError::InvalidCredentials);
        };

        let Some(record) = self.store.find_by_email(&email).await? else {
            verify_decoy_blocking(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        match verify_password_blocking(password, record.password_hash.clone()).await {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => return Err(AuthError::InvalidCredentials),
            Err(PasswordError::InvalidHashFormat) => {
                tracing::warn!(user_id = %record.user_id, "Stored password hash is malformed");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        }

        let pair = self.codec.issue_pair(&IdentityClaims::from(&record))?;
        self.store
            .upsert_tokens(
                &record.user_id,
                &pair.access_token,
                &pair.refresh_token,
                Utc::now(),
            )
            .await
            .map_err(|e| AuthError::Persistence(e.to_string()))?;

        let refreshed = self.reload(&record.user_id).await?;
        tracing::info!(user_id = %refreshed.user_id, "Login succeeded");
        Ok(refreshed)
    }

    /// Refresh Token으로 토큰 쌍 재발급.
    ///
    /// 저장된 최신 Refresh Token과 일치해야 하며, 새 토큰은 현재 레코드 값으로 발급됩니다.
    /// 같은 토큰으로 동시에 요청하면 하나만 성공합니다.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<IdentityRecord, AuthError> {
        let result = self.refresh_inner(request).await;
        record_outcome("refresh", &result);
        result
    }

    async fn refresh_inner(&self, request: RefreshRequest) -> Result<IdentityRecord, AuthError> {
        let claims = self
            .codec
            .verify_refresh(&request.refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let record = self
            .store
            .find_by_external_id(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        // 이미 교체된 토큰
        if record.refresh_token.as_deref() != Some(request.refresh_token.as_str()) {
            tracing::debug!(user_id = %record.user_id, "Refresh token was rotated out");
            return Err(AuthError::InvalidRefreshToken);
        }

        let pair = self.codec.issue_pair(&IdentityClaims::from(&record))?;
        let rotated = self
            .store
            .rotate_tokens(
                &record.user_id,
                &request.refresh_token,
                &pair.access_token,
                &pair.refresh_token,
                Utc::now(),
            )
            .await
            .map_err(|e| AuthError::Persistence(e.to_string()))?;

        // 읽은 뒤 다른 요청이 먼저 교체함
        if !rotated {
            tracing::debug!(user_id = %record.user_id, "Refresh token rotation lost the race");
            return Err(AuthError::InvalidRefreshToken);
        }

        self.reload(&record.user_id).await
    }

    /// 신원 목록 (페이지 단위).
    pub async fn list_identities(
        &self,
        request: PageRequest,
    ) -> Result<Page<IdentityRecord>, AuthError> {
        Ok(self.store.list_page(request).await?)
    }

    /// 외부 ID로 신원 조회.
    pub async fn get_identity(&self, user_id: &ExternalUserId) -> Result<IdentityRecord, AuthError> {
        self.store
            .find_by_external_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// 토큰을 기록한 직후 저장된 레코드를 다시 읽습니다.
    async fn reload(&self, user_id: &ExternalUserId) -> Result<IdentityRecord, AuthError> {
        self.store
            .find_by_external_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Persistence(format!("identity {user_id} vanished")))
    }
}

fn record_outcome<T>(operation: &'static str, result: &Result<T, AuthError>) {
    match result {
        Ok(_) => record_auth_event(operation, "success"),
        Err(e) => {
            match e {
                AuthError::Persistence(detail) | AuthError::Internal(detail) => {
                    tracing::error!(operation, code = e.code(), error = %detail, "Authentication operation failed");
                }
                _ => tracing::debug!(operation, code = e.code(), "Authentication operation rejected"),
            }
            record_auth_event(operation, e.code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{BoundedStore, InMemoryIdentityStore, InsertAck, StoreResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use gatekeeper_core::AuthConfig;

    const TEST_SECRET: &str = "authenticator-test-secret-minimum-32-chars";

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(&AuthConfig::with_secret(TEST_SECRET)).unwrap())
    }

    fn authenticator_with(store: Arc<dyn IdentityStore>) -> Authenticator {
        Authenticator::new(codec(), store)
    }

    fn authenticator() -> Authenticator {
        authenticator_with(Arc::new(InMemoryIdentityStore::new()))
    }

    fn signup_request(email: &str, phone: &str) -> SignupRequest {
        SignupRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            password: Some("abcdef".to_string()),
            email: Some(email.to_string()),
            phone: Some(phone.to_string()),
            role: Some("USER".to_string()),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    /// 사전 확인을 항상 통과시켜 동시 가입 경쟁을 재현하는 저장소.
    struct BlindCountStore(InMemoryIdentityStore);

    #[async_trait]
    impl IdentityStore for BlindCountStore {
        async fn insert(&self, record: &IdentityRecord) -> StoreResult<InsertAck> {
            self.0.insert(record).await
        }
        async fn upsert_tokens(
            &self,
            user_id: &ExternalUserId,
            token: &str,
            refresh_token: &str,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.0.upsert_tokens(user_id, token, refresh_token, updated_at).await
        }
        async fn rotate_tokens(
            &self,
            user_id: &ExternalUserId,
            expected_refresh: &str,
            token: &str,
            refresh_token: &str,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<bool> {
            self.0
                .rotate_tokens(user_id, expected_refresh, token, refresh_token, updated_at)
                .await
        }
        async fn find_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
            self.0.find_by_email(email).await
        }
        async fn find_by_external_id(
            &self,
            user_id: &ExternalUserId,
        ) -> StoreResult<Option<IdentityRecord>> {
            self.0.find_by_external_id(user_id).await
        }
        async fn count_by_email(&self, _email: &str) -> StoreResult<u64> {
            Ok(0)
        }
        async fn count_by_phone(&self, _phone: &str) -> StoreResult<u64> {
            Ok(0)
        }
        async fn list_page(&self, request: PageRequest) -> StoreResult<Page<IdentityRecord>> {
            self.0.list_page(request).await
        }
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    /// 외부 ID 조회가 느린 저장소. 동시 재발급 요청이 같은 토큰 상태를 읽게 만듭니다.
    struct SlowReadStore(InMemoryIdentityStore);

    #[async_trait]
    impl IdentityStore for SlowReadStore {
        async fn insert(&self, record: &IdentityRecord) -> StoreResult<InsertAck> {
            self.0.insert(record).await
        }
        async fn upsert_tokens(
            &self,
            user_id: &ExternalUserId,
            token: &str,
            refresh_token: &str,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            self.0.upsert_tokens(user_id, token, refresh_token, updated_at).await
        }
        async fn rotate_tokens(
            &self,
            user_id: &ExternalUserId,
            expected_refresh: &str,
            token: &str,
            refresh_token: &str,
            updated_at: DateTime<Utc>,
        ) -> StoreResult<bool> {
            self.0
                .rotate_tokens(user_id, expected_refresh, token, refresh_token, updated_at)
                .await
        }
        async fn find_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
            self.0.find_by_email(email).await
        }
        async fn find_by_external_id(
            &self,
            user_id: &ExternalUserId,
        ) -> StoreResult<Option<IdentityRecord>> {
            let found = self.0.find_by_external_id(user_id).await;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            found
        }
        async fn count_by_email(&self, email: &str) -> StoreResult<u64> {
            self.0.count_by_email(email).await
        }
        async fn count_by_phone(&self, phone: &str) -> StoreResult<u64> {
            self.0.count_by_phone(phone).await
        }
        async fn list_page(&self, request: PageRequest) -> StoreResult<Page<IdentityRecord>> {
            self.0.list_page(request).await
        }
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    /// 조회가 끝나지 않는 저장소.
    struct HangingStore;

    #[async_trait]
    impl IdentityStore for HangingStore {
        async fn insert(&self, _record: &IdentityRecord) -> StoreResult<InsertAck> {
            std::future::pending().await
        }
        async fn upsert_tokens(
            &self,
            _user_id: &ExternalUserId,
            _token: &str,
            _refresh_token: &str,
            _updated_at: DateTime<Utc>,
        ) -> StoreResult<()> {
            std::future::pending().await
        }
        async fn rotate_tokens(
            &self,
            _user_id: &ExternalUserId,
            _expected_refresh: &str,
            _token: &str,
            _refresh_token: &str,
            _updated_at: DateTime<Utc>,
        ) -> StoreResult<bool> {
            std::future::pending().await
        }
        async fn find_by_email(&self, _email: &str) -> StoreResult<Option<IdentityRecord>> {
            std::future::pending().await
        }
        async fn find_by_external_id(
            &self,
            _user_id: &ExternalUserId,
        ) -> StoreResult<Option<IdentityRecord>> {
            std::future::pending().await
        }
        async fn count_by_email(&self, _email: &str) -> StoreResult<u64> {
            std::future::pending().await
        }
        async fn count_by_phone(&self, _phone: &str) -> StoreResult<u64> {
            std::future::pending().await
        }
        async fn list_page(&self, _request: PageRequest) -> StoreResult<Page<IdentityRecord>> {
            std::future::pending().await
        }
        async fn ping(&self) -> StoreResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let auth = authenticator();

        let created = auth.signup(signup_request("a@x.com", "555")).await.unwrap();
        assert!(!created.user_id.as_str().is_empty());
        assert_eq!(created.user_id, ExternalUserId::from_internal(&created.id));
        assert!(created.token.is_some());
        assert!(created.refresh_token.is_some());
        assert_ne!(created.password_hash, "abcdef");

        let logged_in = auth.login(login_request("a@x.com", "abcdef")).await.unwrap();
        let claims = auth
            .codec()
            .verify(logged_in.token.as_deref().unwrap())
            .unwrap();
        assert_eq!(claims.identity.email, "a@x.com");
        assert_eq!(claims.identity.role, Role::User);
        assert_eq!(claims.identity.uid, created.user_id);
        assert!(logged_in.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_signup_accepts_legacy_field_names() {
        let request: SignupRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "secret": "abcdef",
            "email": "a@x.com",
            "phone": "555",
            "userType": "ADMIN"
        }))
        .unwrap();

        let created = authenticator().signup(request).await.unwrap();
        assert_eq!(created.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let auth = authenticator();

        let mut missing = signup_request("a@x.com", "555");
        missing.phone = None;
        let err = auth.signup(missing).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(ref m) if m.contains("phone is required")));

        let mut empty = signup_request("a@x.com", "555");
        empty.phone = Some(String::new());
        let err = auth.signup(empty).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(ref m) if m.contains("phone must not be empty")));

        let mut short = signup_request("a@x.com", "555");
        short.password = Some("abc".to_string());
        assert!(matches!(auth.signup(short).await, Err(AuthError::Validation(_))));

        let bad_email = signup_request("not-an-email", "555");
        assert!(matches!(auth.signup(bad_email).await, Err(AuthError::Validation(_))));

        for role in ["ROOT", "admin", " ADMIN ", "User", ""] {
            let mut bad_role = signup_request("a@x.com", "555");
            bad_role.role = Some(role.to_string());
            assert!(
                matches!(auth.signup(bad_role).await, Err(AuthError::Validation(_))),
                "role {role:?} should be rejected"
            );
        }
        assert_eq!(auth.list_identities(PageRequest::default()).await.unwrap().total_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_regardless_of_other_fields() {
        let auth = authenticator();
        auth.signup(signup_request("a@x.com", "555")).await.unwrap();

        let mut other = signup_request("a@x.com", "777");
        other.first_name = Some("Grace".to_string());
        other.role = Some("ADMIN".to_string());
        assert!(matches!(auth.signup(other).await, Err(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_duplicate_phone() {
        let auth = authenticator();
        auth.signup(signup_request("a@x.com", "555")).await.unwrap();

        let result = auth.signup(signup_request("b@x.com", "555")).await;
        assert!(matches!(result, Err(AuthError::DuplicatePhone)));
    }

    #[tokio::test]
    async fn test_racing_signup_reports_duplicate() {
        let auth = authenticator_with(Arc::new(BlindCountStore(InMemoryIdentityStore::new())));
        auth.signup(signup_request("a@x.com", "555")).await.unwrap();

        // 사전 확인을 통과해도 저장소 제약 위반은 정상적인 중복 결과로 보고됨
        let result = auth.signup(signup_request("a@x.com", "777")).await;
        assert!(matches!(result, Err(AuthError::DuplicateEmail)));
        let result = auth.signup(signup_request("b@x.com", "555")).await;
        assert!(matches!(result, Err(AuthError::DuplicatePhone)));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = authenticator();
        auth.signup(signup_request("a@x.com", "555")).await.unwrap();

        let unknown = auth.login(login_request("nobody@x.com", "abcdef")).await.unwrap_err();
        let wrong = auth.login(login_request("a@x.com", "wrong!")).await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_unknown_email_with_decoy_password() {
        let auth = authenticator();

        // 대체 해시와 일치하는 비밀번호여도 계정이 없으면 실패
        let result = auth
            .login(login_request("nobody@x.com", "gatekeeper-decoy-password"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let auth = authenticator();
        let created = auth.signup(signup_request("a@x.com", "555")).await.unwrap();
        let original_refresh = created.refresh_token.clone().unwrap();

        let rotated = auth
            .refresh(RefreshRequest {
                refresh_token: original_refresh.clone(),
            })
            .await
            .unwrap();
        let new_refresh = rotated.refresh_token.clone().unwrap();
        assert_ne!(new_refresh, original_refresh);
        assert!(auth.codec().verify(rotated.token.as_deref().unwrap()).is_ok());

        // 교체된 토큰은 재사용 불가
        let reused = auth
            .refresh(RefreshRequest {
                refresh_token: original_refresh,
            })
            .await;
        assert!(matches!(reused, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_with_same_token_succeeds_once() {
        let auth = authenticator_with(Arc::new(SlowReadStore(InMemoryIdentityStore::new())));
        let created = auth.signup(signup_request("a@x.com", "555")).await.unwrap();
        let request = RefreshRequest {
            refresh_token: created.refresh_token.unwrap(),
        };

        let (first, second) = tokio::join!(auth.refresh(request.clone()), auth.refresh(request));

        let winner = match (first, second) {
            (Ok(winner), Err(AuthError::InvalidRefreshToken))
            | (Err(AuthError::InvalidRefreshToken), Ok(winner)) => winner,
            (first, second) => panic!("expected exactly one rotation, got {first:?} / {second:?}"),
        };

        // 저장된 토큰은 이긴 요청이 받은 토큰
        let stored = auth.get_identity(&winner.user_id).await.unwrap();
        assert_eq!(stored.refresh_token, winner.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_garbage() {
        let auth = authenticator();
        let created = auth.signup(signup_request("a@x.com", "555")).await.unwrap();

        let with_access = auth
            .refresh(RefreshRequest {
                refresh_token: created.token.unwrap(),
            })
            .await;
        assert!(matches!(with_access, Err(AuthError::InvalidRefreshToken)));

        let garbage = auth
            .refresh(RefreshRequest {
                refresh_token: "garbage".to_string(),
            })
            .await;
        assert!(matches!(garbage, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_subject() {
        let auth = authenticator();
        let token = auth
            .codec()
            .issue_refresh(&ExternalUserId::from("ghost"), Duration::hours(1))
            .unwrap();

        let result = auth.refresh(RefreshRequest { refresh_token: token }).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_get_and_list_identities() {
        let auth = authenticator();
        for n in 0..15 {
            auth.signup(signup_request(&format!("user{n}@x.com"), &format!("555-{n}")))
                .await
                .unwrap();
        }

        let page = auth.list_identities(PageRequest::new(2, 10)).await.unwrap();
        assert_eq!(page.total_count, 15);
        assert_eq!(page.items.len(), 5);

        let first = &page.items[0];
        let fetched = auth.get_identity(&first.user_id).await.unwrap();
        assert_eq!(&fetched, first);

        let missing = auth.get_identity(&ExternalUserId::from("missing")).await;
        assert!(matches!(missing, Err(AuthError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_is_persistence_error() {
        let store = BoundedStore::new(HangingStore, std::time::Duration::from_secs(30));
        let auth = authenticator_with(Arc::new(store));

        let result = auth.signup(signup_request("a@x.com", "555")).await;
        assert!(matches!(result, Err(AuthError::Persistence(_))));

        let result = auth.login(login_request("a@x.com", "abcdef")).await;
        assert!(matches!(result, Err(AuthError::Persistence(_))));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "email or password is incorrect");
        assert_eq!(
            AuthError::from(StoreError::Duplicate(UniqueField::Email)).code(),
            "DUPLICATE_EMAIL"
        );
        assert_eq!(AuthError::from(StoreError::Timeout).code(), "PERSISTENCE_ERROR");
    }
}
