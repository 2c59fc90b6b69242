//! 사용자 가입/로그인/조회 endpoint.
//!
//! - `POST /api/v1/users/signup`
//! - `POST /api/v1/users/login`
//! - `POST /api/v1/users/refresh`
//! - `GET  /api/v1/users` (ADMIN)
//! - `GET  /api/v1/users/{user_id}` (본인 또는 ADMIN)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use gatekeeper_core::{ExternalUserId, IdentityRecord, PageRequest, Role};

use crate::auth::{require_self_or_role, AdminContext, AuthContext};
use crate::error::{ApiErrorResponse, ApiResult};
use crate::services::{AuthError, LoginRequest, RefreshRequest, SignupRequest};
use crate::state::AppState;

// ================================================================================================
// Types
// ================================================================================================

/// 가입 결과 (삽입 확인).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    /// 내부 ID
    pub inserted_id: Uuid,
    /// 외부 사용자 ID
    pub user_id: ExternalUserId,
}

/// 사용자 목록 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    /// 전체 사용자 수
    pub total_count: u64,
    /// 현재 페이지의 사용자
    pub user_items: Vec<IdentityRecord>,
}

/// 사용자 목록 쿼리.
///
/// 숫자가 아니거나 1 미만인 값은 기본값(page 1, 10개)으로 대체됩니다.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// 페이지 번호 (1부터)
    pub page: Option<String>,
    /// 페이지 크기
    pub record_per_page: Option<String>,
}

impl ListUsersQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest::from_raw(self.page.as_deref(), self.record_per_page.as_deref())
    }
}

/// JSON 본문 파싱 실패를 검증 에러로 변환.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AuthError::Validation(rejection.body_text()))
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 신규 사용자 가입.
#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    tag = "users",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "가입 완료", body = SignupResponse),
        (status = 400, description = "입력 검증 실패", body = ApiErrorResponse),
        (status = 409, description = "이메일 또는 전화번호 중복", body = ApiErrorResponse),
        (status = 500, description = "저장소 오류", body = ApiErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<Json<SignupResponse>> {
    let request = body(payload)?;
    let record = state.authenticator.signup(request).await?;

    Ok(Json(SignupResponse {
        inserted_id: record.id,
        user_id: record.user_id,
    }))
}

/// 로그인. 새 토큰 쌍이 담긴 사용자 레코드를 반환합니다.
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = IdentityRecord),
        (status = 401, description = "이메일 또는 비밀번호 불일치", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<IdentityRecord>> {
    let request = body(payload)?;
    let record = state.authenticator.login(request).await?;
    Ok(Json(record))
}

/// Refresh Token으로 토큰 쌍 재발급.
#[utoipa::path(
    post,
    path = "/api/v1/users/refresh",
    tag = "users",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "재발급 성공", body = IdentityRecord),
        (status = 401, description = "유효하지 않은 Refresh Token", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<IdentityRecord>> {
    let request = body(payload)?;
    let record = state.authenticator.refresh(request).await?;
    Ok(Json(record))
}

/// 사용자 목록 (ADMIN 전용).
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(ListUsersQuery),
    security(("token" = [])),
    responses(
        (status = 200, description = "사용자 목록", body = UserListResponse),
        (status = 401, description = "토큰 없음", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminContext(admin): AdminContext,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let request = query.page_request();
    tracing::debug!(
        requested_by = %admin.uid,
        page = request.page(),
        per_page = request.per_page(),
        "Listing identities"
    );

    let page = state.authenticator.list_identities(request).await?;
    Ok(Json(UserListResponse {
        total_count: page.total_count,
        user_items: page.items,
    }))
}

/// 사용자 조회 (본인 또는 ADMIN).
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = String, Path, description = "외부 사용자 ID")),
    security(("token" = [])),
    responses(
        (status = 200, description = "사용자 레코드", body = IdentityRecord),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    Path(user_id): Path<String>,
) -> ApiResult<Json<IdentityRecord>> {
    let target = ExternalUserId::from(user_id);
    require_self_or_role(&ctx, &target, Role::Admin)?;

    let record = state.authenticator.get_identity(&target).await?;
    Ok(Json(record))
}

// ================================================================================================
// Router
// ================================================================================================

/// 사용자 라우터 생성.
pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/{user_id}", get(get_user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .nest("/api/v1/users", users_router())
            .with_state(Arc::new(create_test_state()))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_signup_invalid_json_is_validation_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/users/signup")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_signup_missing_fields() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/users/signup",
                serde_json::json!({ "email": "a@x.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/users/login",
                serde_json::json!({ "email": "a@x.com", "password": "abcdef" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error.code, "INVALID_CREDENTIALS");
        assert_eq!(error.message, "email or password is incorrect");
    }

    #[tokio::test]
    async fn test_list_requires_token() {
        let request = Request::builder()
            .uri("/api/v1/users")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_list_query_defaults() {
        let query = ListUsersQuery {
            page: Some("abc".to_string()),
            record_per_page: Some("-3".to_string()),
        };
        let request = query.page_request();
        assert_eq!(request.page(), 1);
        assert_eq!(request.per_page(), 10);

        let query = ListUsersQuery {
            page: Some("2".to_string()),
            record_per_page: Some("5".to_string()),
        };
        assert_eq!(query.page_request().offset(), 5);
    }
}
