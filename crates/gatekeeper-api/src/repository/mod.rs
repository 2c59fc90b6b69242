//! Credential Store Adapter.
//!
//! 신원 레코드 영속화를 담당합니다. 구현체는 [`IdentityStore`] 트레이트 뒤에 숨겨지며
//! Authenticator는 구현체를 알지 못합니다.
//!
//! - [`PgIdentityStore`]: PostgreSQL (sqlx)
//! - [`InMemoryIdentityStore`]: 데이터베이스 URL이 없을 때와 테스트용
//! - [`BoundedStore`]: 모든 연산에 데드라인을 적용하는 데코레이터

pub mod identities;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use gatekeeper_core::{ExternalUserId, IdentityRecord, Page, PageRequest};

pub use identities::PgIdentityStore;
pub use memory::InMemoryIdentityStore;

/// 유일성 제약이 걸린 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Phone,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Phone => f.write_str("phone"),
        }
    }
}

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("이미 존재하는 {0}")]
    Duplicate(UniqueField),
    #[error("레코드를 찾을 수 없습니다")]
    NotFound,
    #[error("저장소 연산 시간 초과")]
    Timeout,
    #[error("데이터베이스 에러: {0}")]
    Database(String),
    #[error("손상된 레코드: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 삽입 확인 응답.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertAck {
    pub inserted_id: Uuid,
}

/// 신원 레코드 저장소.
///
/// 구현체는 여러 요청에서 동시에 사용될 수 있어야 합니다.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// 완성된 레코드를 한 번에 삽입합니다.
    ///
    /// 이메일/전화번호 유일성 위반은 `Duplicate`로 보고합니다.
    async fn insert(&self, record: &IdentityRecord) -> StoreResult<InsertAck>;

    /// 토큰 쌍과 갱신 시각을 덮어씁니다 (last-writer-wins).
    async fn upsert_tokens(
        &self,
        user_id: &ExternalUserId,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// 저장된 Refresh Token이 `expected_refresh`와 같을 때만 토큰 쌍을 교체합니다.
    ///
    /// 비교와 교체는 하나의 원자적 연산입니다. 토큰이 이미 바뀌었거나 레코드가 없으면
    /// `Ok(false)`를 반환합니다.
    async fn rotate_tokens(
        &self,
        user_id: &ExternalUserId,
        expected_refresh: &str,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>>;

    async fn find_by_external_id(
        &self,
        user_id: &ExternalUserId,
    ) -> StoreResult<Option<IdentityRecord>>;

    async fn count_by_email(&self, email: &str) -> StoreResult<u64>;

    async fn count_by_phone(&self, phone: &str) -> StoreResult<u64>;

    /// 생성 시각, 내부 ID 순으로 정렬된 한 페이지와 전체 개수.
    async fn list_page(&self, request: PageRequest) -> StoreResult<Page<IdentityRecord>>;

    /// 연결 상태 확인.
    async fn ping(&self) -> StoreResult<()>;
}

/// 모든 연산을 데드라인으로 제한하는 데코레이터.
pub struct BoundedStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S> BoundedStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>> + Send,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                let deadline_ms = self.deadline.as_millis() as u64;
                tracing::warn!(operation, deadline_ms, "Store operation timed out");
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait]
impl<S: IdentityStore> IdentityStore for BoundedStore<S> {
    async fn insert(&self, record: &IdentityRecord) -> StoreResult<InsertAck> {
        self.bounded("insert", self.inner.insert(record)).await
    }

    async fn upsert_tokens(
        &self,
        user_id: &ExternalUserId,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.bounded(
            "upsert_tokens",
            self.inner
                .upsert_tokens(user_id, token, refresh_token, updated_at),
        )
        .await
    }

    async fn rotate_tokens(
        &self,
        user_id: &ExternalUserId,
        expected_refresh: &str,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.bounded(
            "rotate_tokens",
            self.inner
                .rotate_tokens(user_id, expected_refresh, token, refresh_token, updated_at),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        self.bounded("find_by_email", self.inner.find_by_email(email))
            .await
    }

    async fn find_by_external_id(
        &self,
        user_id: &ExternalUserId,
    ) -> StoreResult<Option<IdentityRecord>> {
        self.bounded(
            "find_by_external_id",
            self.inner.find_by_external_id(user_id),
        )
        .await
    }

    async fn count_by_email(&self, email: &str) -> StoreResult<u64> {
        self.bounded("count_by_email", self.inner.count_by_email(email))
            .await
    }

    async fn count_by_phone(&self, phone: &str) -> StoreResult<u64> {
        self.bounded("count_by_phone", self.inner.count_by_phone(phone))
            .await
    }

    async fn list_page(&self, request: PageRequest) -> StoreResult<Page<IdentityRecord>> {
        self.bounded("list_page", self.inner.list_page(request)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.bounded("ping", self.inner.ping()).await
    }
}
