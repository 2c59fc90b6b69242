//! 헬스 체크 endpoint.
//!
//! `/health`는 프로세스 생존만, `/health/ready`는 신원 저장소까지 확인합니다.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// readiness 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// 저장소가 응답하면 `healthy`
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// RFC 3339
    pub timestamp: String,
    pub components: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub store: ComponentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
}

/// 신원 저장소 상태.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: ComponentState,
    /// `postgres` 또는 `in-memory`
    pub backend: String,
    /// ping 왕복 시간
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn backend_name(state: &AppState) -> &'static str {
        if state.persistent_store {
            "postgres"
        } else {
            "in-memory"
        }
    }

    /// 저장소 ping으로 상태를 측정합니다. 저장소 에러 상세는 응답에 포함하지 않습니다.
    async fn measure(state: &AppState) -> Self {
        let started = Instant::now();
        let result = state.store.ping().await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, message) = match result {
            Ok(()) => (ComponentState::Up, None),
            Err(e) => {
                tracing::warn!(error = %e, "Identity store readiness check failed");
                (ComponentState::Down, Some("저장소에 연결할 수 없습니다".to_string()))
            }
        };

        Self {
            status,
            backend: Self::backend_name(state).to_string(),
            latency_ms,
            message,
        }
    }
}

/// liveness 확인.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "서버 응답 가능"))
)]
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// readiness 확인. 저장소가 응답하지 않으면 503입니다.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "준비 완료", body = HealthResponse),
        (status = 503, description = "저장소 연결 실패", body = HealthResponse)
    )
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = ComponentStatus::measure(&state).await;
    let (overall, code) = match store.status {
        ComponentState::Up => ("healthy", StatusCode::OK),
        ComponentState::Down => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE),
    };

    let response = HealthResponse {
        status: overall.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth { store },
    };

    (code, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
