//! 통합 API 에러 응답 타입.
//!
//! 모든 API 엔드포인트와 추출기가 같은 에러 형식을 사용합니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AccessDenied, GuardRejection};
use crate::services::AuthError;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "DUPLICATE_EMAIL",
///   "message": "이미 사용 중인 이메일입니다",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "TOKEN_EXPIRED")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 에러 (상태 코드 + 본문).
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 비표준 419 (토큰 만료).
pub fn token_expired_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::UNAUTHORIZED)
}

// ==================== Conversions ====================

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = match &e {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::DuplicateEmail | AuthError::DuplicatePhone => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidRefreshToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Persistence(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        // Persistence/Internal 상세는 Display에 포함되지 않음
        (status, Json(ApiErrorResponse::new(e.code(), e.to_string())))
    }
}

impl From<GuardRejection> for ApiError {
    fn from(e: GuardRejection) -> Self {
        (e.status(), Json(ApiErrorResponse::new(e.code(), e.to_string())))
    }
}

impl From<AccessDenied> for ApiError {
    fn from(e: AccessDenied) -> Self {
        (
            StatusCode::FORBIDDEN,
            Json(ApiErrorResponse::new("FORBIDDEN", e.to_string())),
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_mapping() {
        let cases = [
            (AuthError::Validation("x".into()), 400, "VALIDATION_ERROR"),
            (AuthError::DuplicateEmail, 409, "DUPLICATE_EMAIL"),
            (AuthError::DuplicatePhone, 409, "DUPLICATE_PHONE"),
            (AuthError::InvalidCredentials, 401, "INVALID_CREDENTIALS"),
            (AuthError::InvalidRefreshToken, 401, "INVALID_REFRESH_TOKEN"),
            (AuthError::NotFound, 404, "NOT_FOUND"),
            (AuthError::Persistence("pool closed".into()), 500, "PERSISTENCE_ERROR"),
        ];

        for (error, status, code) in cases {
            let (actual_status, Json(body)) = ApiError::from(error);
            assert_eq!(actual_status.as_u16(), status);
            assert_eq!(body.code, code);
        }
    }

    #[test]
    fn test_persistence_detail_not_exposed() {
        let (_, Json(body)) = ApiError::from(AuthError::Persistence("password=hunter2".into()));
        assert!(!body.message.contains("hunter2"));
    }

    #[test]
    fn test_guard_and_policy_mapping() {
        let (status, Json(body)) = ApiError::from(GuardRejection::TokenExpired);
        assert_eq!(status, token_expired_status());
        assert_eq!(body.code, "TOKEN_EXPIRED");

        let (status, Json(body)) = ApiError::from(AccessDenied);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.code, "FORBIDDEN");
    }

    #[test]
    fn test_error_serialization_shape() {
        let json = serde_json::to_value(ApiErrorResponse::new("NOT_FOUND", "missing")).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "missing");
        assert!(json.get("timestamp").is_some());
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}
