//! Identity Repository (PostgreSQL)
//!
//! 신원 레코드 관련 데이터베이스 연산을 담당합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use gatekeeper_core::{ExternalUserId, IdentityRecord, Page, PageRequest, Role};

use super::{IdentityStore, InsertAck, StoreError, StoreResult, UniqueField};

// ================================================================================================
// Types
// ================================================================================================

/// identities 테이블 행
#[derive(Debug, Clone, FromRow)]
struct IdentityRow {
    id: Uuid,
    user_id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    password_hash: String,
    role: String,
    #[sqlx(default)]
    token: Option<String>,
    #[sqlx(default)]
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    /// 도메인 레코드로 변환. 알 수 없는 역할은 `Corrupt`.
    fn into_record(self) -> StoreResult<IdentityRecord> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role '{}'", self.role)))?;

        Ok(IdentityRecord {
            id: self.id,
            user_id: ExternalUserId::from(self.user_id),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            role,
            token: self.token,
            refresh_token: self.refresh_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    id, user_id, first_name, last_name, email, phone, password_hash, role,
    token, refresh_token, created_at, updated_at
"#;

/// 유일성 제약 이름 → 필드.
fn unique_field(constraint: Option<&str>) -> Option<UniqueField> {
    match constraint? {
        "identities_email_key" => Some(UniqueField::Email),
        "identities_phone_key" => Some(UniqueField::Phone),
        _ => None,
    }
}

/// sqlx 에러를 저장소 에러로 변환.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            if let Some(field) = unique_field(db_err.constraint()) {
                return StoreError::Duplicate(field);
            }
        }
    }
    StoreError::Database(e.to_string())
}

// ================================================================================================
// Repository
// ================================================================================================

/// PostgreSQL 신원 저장소.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> StoreResult<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("Migrations completed successfully");
        Ok(())
    }

    async fn count_where(&self, column: &'static str, value: &str) -> StoreResult<u64> {
        let query = format!("SELECT COUNT(*) FROM identities WHERE {column} = $1");
        let count: i64 = sqlx::query_scalar(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert(&self, record: &IdentityRecord) -> StoreResult<InsertAck> {
        let inserted_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO identities (
                id, user_id, first_name, last_name, email, phone, password_hash, role,
                token, refresh_token, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(record.user_id.as_str())
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.password_hash)
        .bind(record.role.as_str())
        .bind(record.token.as_deref())
        .bind(record.refresh_token.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(InsertAck { inserted_id })
    }

    async fn upsert_tokens(
        &self,
        user_id: &ExternalUserId,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET token = $2, refresh_token = $3, updated_at = $4
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(token)
        .bind(refresh_token)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn rotate_tokens(
        &self,
        user_id: &ExternalUserId,
        expected_refresh: &str,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // 조건부 UPDATE 한 문장으로 비교와 교체를 묶음
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET token = $3, refresh_token = $4, updated_at = $5
            WHERE user_id = $1 AND refresh_token = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(expected_refresh)
        .bind(token)
        .bind(refresh_token)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM identities WHERE email = $1");
        sqlx::query_as::<_, IdentityRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(IdentityRow::into_record)
            .transpose()
    }

    async fn find_by_external_id(
        &self,
        user_id: &ExternalUserId,
    ) -> StoreResult<Option<IdentityRecord>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM identities WHERE user_id = $1");
        sqlx::query_as::<_, IdentityRow>(&query)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?
            .map(IdentityRow::into_record)
            .transpose()
    }

    async fn count_by_email(&self, email: &str) -> StoreResult<u64> {
        self.count_where("email", email).await
    }

    async fn count_by_phone(&self, phone: &str) -> StoreResult<u64> {
        self.count_where("phone", phone).await
    }

    async fn list_page(&self, request: PageRequest) -> StoreResult<Page<IdentityRecord>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM identities ORDER BY created_at, id LIMIT $1 OFFSET $2"
        );
        let offset = i64::try_from(request.offset()).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, IdentityRow>(&query)
            .bind(i64::from(request.per_page()))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        let items = rows
            .into_iter()
            .map(IdentityRow::into_record)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            total_count: total.max(0) as u64,
            items,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }
}
