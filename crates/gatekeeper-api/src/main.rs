//! Gatekeeper API 서버.
//!
//! 설정을 읽고 신원 저장소와 토큰 코덱을 구성한 뒤 Axum 서버를 시작합니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use gatekeeper_api::metrics::setup_metrics_recorder;
use gatekeeper_api::middleware::metrics_layer;
use gatekeeper_api::openapi::swagger_ui_router;
use gatekeeper_api::repository::{
    BoundedStore, IdentityStore, InMemoryIdentityStore, PgIdentityStore,
};
use gatekeeper_api::routes::create_api_router;
use gatekeeper_api::state::AppState;
use gatekeeper_core::{init_logging, AppConfig, DatabaseConfig, LoggingConfig, ServerConfig};

/// CORS 레이어.
///
/// origin 목록이 비어 있으면 모든 origin을 허용합니다. Access Token 헤더는
/// 브라우저 preflight를 통과하도록 허용 헤더에 포함합니다.
fn cors_layer(origins: &[String], token_header: &HeaderName) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if parsed.is_empty() {
        warn!("No CORS origins configured, allowing any origin");
        AllowOrigin::any()
    } else {
        info!(count = parsed.len(), "CORS restricted to configured origins");
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT, token_header.clone()])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 신원 저장소 구성.
///
/// 데이터베이스 URL이 없으면 메모리 저장소를 사용합니다. 연결은 지연 생성되므로
/// 데이터베이스가 내려가 있어도 서버는 시작되며, readiness가 실패를 보고합니다.
async fn create_store(config: &DatabaseConfig) -> anyhow::Result<(Arc<dyn IdentityStore>, bool)> {
    let deadline = config.operation_timeout();

    let Some(url) = config.url.as_deref() else {
        warn!("DATABASE_URL not set, using in-memory identity store (data is not persisted)");
        let store = BoundedStore::new(InMemoryIdentityStore::new(), deadline);
        return Ok((Arc::new(store), false));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_lazy(url)
        .context("데이터베이스 URL이 유효하지 않습니다")?;

    let pg_store = PgIdentityStore::new(pool);
    if let Err(e) = pg_store.migrate().await {
        warn!(error = %e, "Database migration failed, store will report as unavailable");
    }

    info!(
        max_connections = config.max_connections,
        operation_timeout_secs = config.operation_timeout_secs,
        "PostgreSQL identity store configured"
    );
    Ok((Arc::new(BoundedStore::new(pg_store, deadline)), true))
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    server: &ServerConfig,
) -> Router {
    let cors = cors_layer(&server.cors_origins, &state.token_header);

    // 메트릭 라우터 (별도 상태)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout_secs),
        ))
        .layer(cors)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match AppConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            // 설정을 읽지 못했으므로 기본 로깅으로 보고
            init_logging(&LoggingConfig::default())
                .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;
            error!(error = %e, "Invalid configuration, refusing to start");
            return Err(e.into());
        }
    };

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;
    info!("Starting Gatekeeper API server...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr = config.server.socket_addr().map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. API_HOST, PORT 환경변수를 확인하세요."
        );
        e
    })?;

    let (store, persistent) = create_store(&config.database).await?;
    let state = Arc::new(
        AppState::from_config(&config.auth, store)?.with_persistent_store(persistent),
    );
    info!(
        version = %state.version,
        persistent_store = state.persistent_store,
        token_header = %state.token_header,
        access_ttl_minutes = config.auth.access_token_ttl_minutes,
        refresh_ttl_minutes = config.auth.refresh_token_ttl_minutes,
        "Application state initialized"
    );

    let app = create_router(state, metrics_handle, &config.server);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 반환합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
