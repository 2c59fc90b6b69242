//! JWT 토큰 처리.
//!
//! Access Token 및 Refresh Token 발급/검증 로직.
//! 검증은 상태를 갖지 않으며 저장소를 조회하지 않습니다. 따라서 Claims는
//! 발급 시점의 신원을 반영합니다.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use gatekeeper_core::{AuthConfig, ExternalUserId, IdentityRecord, Role};

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// 토큰에 담기는 주체 신원 필드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// 외부 사용자 ID
    pub uid: ExternalUserId,
}

impl From<&IdentityRecord> for IdentityClaims {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            role: record.role,
            uid: record.user_id.clone(),
        }
    }
}

/// JWT Access Token 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: IdentityClaims,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// 토큰 종류 (항상 access)
    pub typ: TokenKind,
    /// JWT ID
    pub jti: String,
}

/// Refresh Token 페이로드.
///
/// 주체를 식별하는 데 필요한 최소 필드만 담습니다 (역할/이름 없음).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject - 외부 사용자 ID
    pub sub: ExternalUserId,
    pub iat: i64,
    pub exp: i64,
    /// 토큰 종류 (항상 refresh)
    pub typ: TokenKind,
    pub jti: String,
}

/// 검증 공통 필드 접근.
trait RegisteredClaims {
    fn iat(&self) -> i64;
    fn exp(&self) -> i64;
    fn kind(&self) -> TokenKind;
}

impl RegisteredClaims for Claims {
    fn iat(&self) -> i64 {
        self.iat
    }
    fn exp(&self) -> i64 {
        self.exp
    }
    fn kind(&self) -> TokenKind {
        self.typ
    }
}

impl RegisteredClaims for RefreshClaims {
    fn iat(&self) -> i64 {
        self.iat
    }
    fn exp(&self) -> i64 {
        self.exp
    }
    fn kind(&self) -> TokenKind {
        self.typ
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: i64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

/// JWT 토큰 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("서명 키가 설정되지 않았습니다")]
    MissingSecret,
    #[error("토큰 유효 시간은 0보다 커야 합니다")]
    InvalidValidity,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("잘못된 토큰 형식")]
    Malformed,
    #[error("토큰이 만료되었습니다")]
    Expired,
}

/// 토큰 발급/검증기.
///
/// 서명 키와 유효 시간은 생성 시 주입되며 이후 변경되지 않습니다.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// 설정에서 생성. 서명 키가 비어 있으면 실패합니다.
    pub fn new(config: &AuthConfig) -> Result<Self, JwtError> {
        let secret = config.jwt_secret.expose_secret();
        if secret.trim().is_empty() {
            return Err(JwtError::MissingSecret);
        }
        if config.access_token_ttl_minutes <= 0 || config.refresh_token_ttl_minutes <= 0 {
            return Err(JwtError::InvalidValidity);
        }

        // 만료는 leeway 없이 직접 비교합니다.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::minutes(config.refresh_token_ttl_minutes),
        })
    }

    /// Access Token 발급.
    ///
    /// # Arguments
    ///
    /// * `identity` - 토큰에 담을 신원 필드
    /// * `validity` - 유효 시간 (0보다 커야 함)
    pub fn issue(&self, identity: &IdentityClaims, validity: Duration) -> Result<String, JwtError> {
        let (iat, exp) = Self::window(validity)?;
        let claims = Claims {
            identity: identity.clone(),
            iat,
            exp,
            typ: TokenKind::Access,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    /// Refresh Token 발급.
    pub fn issue_refresh(
        &self,
        subject: &ExternalUserId,
        validity: Duration,
    ) -> Result<String, JwtError> {
        let (iat, exp) = Self::window(validity)?;
        let claims = RefreshClaims {
            sub: subject.clone(),
            iat,
            exp,
            typ: TokenKind::Refresh,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    /// 설정된 유효 시간으로 Access Token + Refresh Token 쌍 발급.
    pub fn issue_pair(&self, identity: &IdentityClaims) -> Result<TokenPair, JwtError> {
        let access_token = self.issue(identity, self.access_ttl)?;
        let refresh_token = self.issue_refresh(&identity.uid, self.refresh_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
            token_type: "Bearer".to_string(),
        })
    }

    /// 현재 시각 기준 Access Token 검증.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, Utc::now())
    }

    /// 주어진 시각 기준 Access Token 검증.
    ///
    /// 서명 불일치/파싱 실패/종류 불일치는 `Malformed`, `now >= exp`이면 `Expired`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        self.decode_checked(token, now, TokenKind::Access)
    }

    /// 현재 시각 기준 Refresh Token 검증.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        self.verify_refresh_at(token, Utc::now())
    }

    /// 주어진 시각 기준 Refresh Token 검증.
    pub fn verify_refresh_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, JwtError> {
        self.decode_checked(token, now, TokenKind::Refresh)
    }

    fn window(validity: Duration) -> Result<(i64, i64), JwtError> {
        if validity <= Duration::zero() {
            return Err(JwtError::InvalidValidity);
        }
        let iat = Utc::now().timestamp();
        Ok((iat, iat + validity.num_seconds().max(1)))
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(JwtError::from)
    }

    fn decode_checked<T>(&self, token: &str, now: DateTime<Utc>, kind: TokenKind) -> Result<T, JwtError>
    where
        T: DeserializeOwned + RegisteredClaims,
    {
        let data = decode::<T>(token, &self.decoding_key, &self.validation)
            .map_err(|_| JwtError::Malformed)?;
        let claims = data.claims;

        if claims.kind() != kind || claims.exp() <= claims.iat() {
            return Err(JwtError::Malformed);
        }
        if now.timestamp() >= claims.exp() {
            return Err(JwtError::Expired);
        }
        Ok(claims)
    }
}
