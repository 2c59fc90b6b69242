//! OpenAPI 문서화 설정.
//!
//! utoipa로 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새 엔드포인트를 추가할 때는 핸들러에 `#[utoipa::path(...)]`를 붙이고
//! 이 파일의 `paths(...)`와 `components(schemas(...))`에 등록합니다.

use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use gatekeeper_core::{ExternalUserId, IdentityRecord, Role};

use crate::error::ApiErrorResponse;
use crate::routes::{
    health, users, ComponentHealth, ComponentState, ComponentStatus, HealthResponse,
    SignupResponse, UserListResponse,
};
use crate::services::{LoginRequest, RefreshRequest, SignupRequest};
use crate::state::DEFAULT_TOKEN_HEADER;

/// `token` 헤더 보안 스키마 등록.
struct TokenHeaderSecurity;

impl Modify for TokenHeaderSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(DEFAULT_TOKEN_HEADER))),
            );
        }
    }
}

/// Gatekeeper API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gatekeeper Identity API",
        version = "0.1.0",
        description = r#"
# Gatekeeper 신원/인증 REST API

사용자 가입, 로그인, 토큰 재발급과 역할 기반 사용자 조회를 제공합니다.

## 인증

보호된 엔드포인트는 Access Token이 필요합니다.
`token: <access token>` 헤더 또는 `Authorization: Bearer <token>` 헤더를 포함하세요.

- 토큰 없음: 401 `MISSING_TOKEN`
- 잘못된 토큰: 400 `INVALID_TOKEN`
- 만료된 토큰: 419 `TOKEN_EXPIRED` (refresh 또는 재로그인)
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "users", description = "사용자 - 가입, 로그인, 토큰 재발급, 조회")
    ),
    modifiers(&TokenHeaderSecurity),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentState,
            ComponentStatus,
            // ===== Common =====
            ApiErrorResponse,
            // ===== Users =====
            SignupRequest,
            SignupResponse,
            LoginRequest,
            RefreshRequest,
            UserListResponse,
            IdentityRecord,
            ExternalUserId,
            Role,
        )
    ),
    paths(
        // ===== Health =====
        health::health_check,
        health::health_ready,
        // ===== Users =====
        users::signup,
        users::login,
        users::refresh,
        users::list_users,
        users::get_user,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
