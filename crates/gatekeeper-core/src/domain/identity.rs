//! 신원 레코드.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Role;

/// 외부에 노출되는 사용자 ID.
///
/// 생성 시 내부 ID에서 한 번 파생되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ExternalUserId(String);

impl ExternalUserId {
    /// 내부 ID의 안정적인 문자열 형태.
    pub fn from_internal(id: &Uuid) -> Self {
        Self(id.simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ExternalUserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ExternalUserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for ExternalUserId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ExternalUserId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// 해시 처리가 끝난 가입 정보.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
}

/// 영속 신원 레코드.
///
/// 비밀번호 해시는 직렬화되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// 내부 ID
    pub id: Uuid,
    /// 외부 사용자 ID (내부 ID에서 파생)
    pub user_id: ExternalUserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    /// 마지막으로 발급된 Access Token
    pub token: Option<String>,
    /// 마지막으로 발급된 Refresh Token
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// 새 레코드 생성. 내부 ID와 외부 ID가 함께 생성됩니다.
    pub fn create(input: NewIdentity, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            user_id: ExternalUserId::from_internal(&id),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            password_hash: input.password_hash,
            role: input.role,
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 토큰 쌍과 갱신 시각을 교체합니다.
    pub fn set_tokens(
        &mut self,
        token: impl Into<String>,
        refresh_token: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) {
        self.token = Some(token.into());
        self.refresh_token = Some(refresh_token.into());
        self.updated_at = updated_at;
    }
}
