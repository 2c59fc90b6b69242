//! REST API 라우트.
//!
//! - `/health`: 헬스 체크
//! - `/api/v1/users`: 가입, 로그인, 재발급, 사용자 조회

pub mod health;
pub mod users;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub use health::{health_router, ComponentHealth, ComponentState, ComponentStatus, HealthResponse};
pub use users::{users_router, ListUsersQuery, SignupResponse, UserListResponse};

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/users", users_router())
}
