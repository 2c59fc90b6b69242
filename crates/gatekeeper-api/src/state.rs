//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 요청 간에 공유됩니다. 시작 후에는 변경되지 않습니다.

use std::sync::Arc;

use axum::http::HeaderName;
use gatekeeper_core::AuthConfig;

use crate::auth::{JwtError, TokenCodec};
use crate::repository::IdentityStore;
use crate::services::Authenticator;

/// 기본 토큰 헤더 이름.
pub const DEFAULT_TOKEN_HEADER: &str = "token";

/// 상태 구성 에러.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("토큰 설정 오류: {0}")]
    Codec(#[from] JwtError),
    #[error("잘못된 토큰 헤더 이름: {0}")]
    InvalidHeader(String),
}

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 가입/로그인/재발급 서비스
    pub authenticator: Authenticator,

    /// 토큰 발급/검증기 (Access Guard에서 사용)
    pub codec: Arc<TokenCodec>,

    /// 신원 저장소
    pub store: Arc<dyn IdentityStore>,

    /// Access Token을 담는 요청 헤더
    pub token_header: HeaderName,

    /// 저장소가 데이터베이스인지 여부 (readiness 보고용)
    pub persistent_store: bool,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    ///
    /// 토큰 헤더는 기본값(`token`)을 사용합니다.
    pub fn new(codec: TokenCodec, store: Arc<dyn IdentityStore>) -> Self {
        let codec = Arc::new(codec);
        Self {
            authenticator: Authenticator::new(Arc::clone(&codec), Arc::clone(&store)),
            codec,
            store,
            token_header: HeaderName::from_static(DEFAULT_TOKEN_HEADER),
            persistent_store: false,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 인증 설정으로 생성.
    pub fn from_config(
        config: &AuthConfig,
        store: Arc<dyn IdentityStore>,
    ) -> Result<Self, StateError> {
        let codec = TokenCodec::new(config)?;
        let header = HeaderName::from_bytes(config.token_header.to_ascii_lowercase().as_bytes())
            .map_err(|_| StateError::InvalidHeader(config.token_header.clone()))?;
        Ok(Self::new(codec, store).with_token_header(header))
    }

    /// 토큰 헤더 설정.
    pub fn with_token_header(mut self, header: HeaderName) -> Self {
        self.token_header = header;
        self
    }

    /// 영속 저장소 사용 여부 설정.
    pub fn with_persistent_store(mut self, persistent: bool) -> Self {
        self.persistent_store = persistent;
        self
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}

/// 테스트용 AppState (메모리 저장소).
#[cfg(test)]
pub fn create_test_state() -> AppState {
    use crate::repository::InMemoryIdentityStore;

    let config = AuthConfig::with_secret("state-test-secret-key-minimum-32-characters");
    let store: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());
    match AppState::from_config(&config, store) {
        Ok(state) => state,
        Err(e) => panic!("test state: {e}"),
    }
}
