//! Axum용 Access Guard.
//!
//! 요청 헤더에서 Access Token을 찾아 검증하고, 성공하면 이후 핸들러에
//! 명시적인 [`AuthContext`] 값을 넘깁니다. 요청별 가변 저장소는 사용하지 않습니다.
//!
//! 토큰은 설정된 헤더(기본 `token`)에서 먼저 찾고, 없으면
//! `Authorization: Bearer <token>`을 확인합니다.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

use gatekeeper_core::{ExternalUserId, Role};

use super::jwt::{Claims, JwtError, TokenCodec};
use super::policy::require_role;
use crate::error::{token_expired_status, ApiError};
use crate::metrics::record_auth_event;
use crate::state::AppState;

/// 인증된 요청의 주체 정보.
///
/// Access Token의 Claims에서 만들어지며 저장소를 다시 조회하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub uid: ExternalUserId,
    pub role: Role,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        let identity = claims.identity;
        Self {
            email: identity.email,
            first_name: identity.first_name,
            last_name: identity.last_name,
            uid: identity.uid,
            role: identity.role,
        }
    }
}

/// Access Guard 거부 사유.
///
/// 클라이언트가 재시도 전략을 고를 수 있도록 상태 코드가 서로 다릅니다.
/// 토큰 없음은 로그인, 만료는 재발급이 필요함을 뜻합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardRejection {
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
}

impl GuardRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardRejection::MissingToken => StatusCode::UNAUTHORIZED,
            GuardRejection::InvalidToken => StatusCode::BAD_REQUEST,
            GuardRejection::TokenExpired => token_expired_status(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GuardRejection::MissingToken => "MISSING_TOKEN",
            GuardRejection::InvalidToken => "INVALID_TOKEN",
            GuardRejection::TokenExpired => "TOKEN_EXPIRED",
        }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// 헤더에서 토큰 문자열 추출.
fn extract_token<'a>(
    headers: &'a HeaderMap,
    header_name: &HeaderName,
) -> Result<&'a str, GuardRejection> {
    if let Some(value) = headers.get(header_name) {
        let token = value.to_str().map_err(|_| GuardRejection::InvalidToken)?.trim();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let bearer = headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| GuardRejection::InvalidToken))
        .transpose()?
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.ok_or(GuardRejection::MissingToken)
}

/// 요청 헤더를 검증해 [`AuthContext`]를 만듭니다.
///
/// 부수 효과는 메트릭 기록뿐입니다.
pub fn guard(
    headers: &HeaderMap,
    header_name: &HeaderName,
    codec: &TokenCodec,
) -> Result<AuthContext, GuardRejection> {
    let result = extract_token(headers, header_name).and_then(|token| {
        codec.verify(token).map(AuthContext::from).map_err(|e| match e {
            JwtError::Expired => GuardRejection::TokenExpired,
            _ => GuardRejection::InvalidToken,
        })
    });

    match &result {
        Ok(_) => record_auth_event("guard", "success"),
        Err(rejection) => {
            tracing::debug!(reason = rejection.code(), "Access guard rejected request");
            record_auth_event("guard", rejection.code());
        }
    }
    result
}

impl<S> FromRequestParts<S> for AuthContext
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        guard(&parts.headers, &app_state.token_header, &app_state.codec)
    }
}

/// ADMIN 역할을 요구하는 추출기.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

impl<S> FromRequestParts<S> for AdminContext
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AuthContext::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        require_role(&ctx, Role::Admin).map_err(IntoResponse::into_response)?;
        Ok(AdminContext(ctx))
    }
}
