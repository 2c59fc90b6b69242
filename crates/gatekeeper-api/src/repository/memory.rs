//! 메모리 기반 신원 저장소.
//!
//! 데이터베이스가 설정되지 않았을 때 사용합니다. 프로세스가 종료되면 데이터가 사라집니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gatekeeper_core::{ExternalUserId, IdentityRecord, Page, PageRequest};

use super::{IdentityStore, InsertAck, StoreError, StoreResult, UniqueField};

/// 삽입 순서를 유지하는 메모리 저장소.
///
/// 유일성 검사와 삽입은 같은 쓰기 락 안에서 수행됩니다.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: RwLock<Vec<IdentityRecord>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 수.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, record: &IdentityRecord) -> StoreResult<InsertAck> {
        let mut records = self.records.write().await;

        if records.iter().any(|r| r.email == record.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if records.iter().any(|r| r.phone == record.phone) {
            return Err(StoreError::Duplicate(UniqueField::Phone));
        }
        if records.iter().any(|r| r.id == record.id || r.user_id == record.user_id) {
            return Err(StoreError::Database(format!(
                "identity {} already exists",
                record.user_id
            )));
        }

        records.push(record.clone());
        Ok(InsertAck {
            inserted_id: record.id,
        })
    }

    async fn upsert_tokens(
        &self,
        user_id: &ExternalUserId,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| &r.user_id == user_id)
            .ok_or(StoreError::NotFound)?;

        record.set_tokens(token, refresh_token, updated_at);
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
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| &r.user_id == user_id) else {
            return Ok(false);
        };
        if record.refresh_token.as_deref() != Some(expected_refresh) {
            return Ok(false);
        }

        record.set_tokens(token, refresh_token, updated_at);
        Ok(true)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.email == email).cloned())
    }

    async fn find_by_external_id(
        &self,
        user_id: &ExternalUserId,
    ) -> StoreResult<Option<IdentityRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| &r.user_id == user_id).cloned())
    }

    async fn count_by_email(&self, email: &str) -> StoreResult<u64> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.email == email).count() as u64)
    }

    async fn count_by_phone(&self, phone: &str) -> StoreResult<u64> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.phone == phone).count() as u64)
    }

    async fn list_page(&self, request: PageRequest) -> StoreResult<Page<IdentityRecord>> {
        let records = self.records.read().await;

        let mut ordered: Vec<&IdentityRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(Page {
            total_count: ordered.len() as u64,
            items: request
                .slice(&ordered)
                .iter()
                .map(|r| (*r).clone())
                .collect(),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
