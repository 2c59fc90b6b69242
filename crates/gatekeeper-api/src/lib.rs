//! 신원 자격증명 REST API.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - JWT 기반 Access/Refresh Token 발급 및 검증
//! - 가입/로그인/토큰 재발급
//! - 요청별 Access Guard 및 역할 기반 접근 정책
//! - PostgreSQL/메모리 신원 저장소
//! - 헬스 체크, Prometheus 메트릭, OpenAPI 문서
//!
//! # 모듈 구성
//!
//! - [`auth`]: 토큰 코덱, 비밀번호 해싱, Access Guard, 접근 정책
//! - [`repository`]: 신원 저장소
//! - [`services`]: Authenticator
//! - [`routes`]: REST API 엔드포인트
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::{AuthContext, GuardRejection, TokenCodec};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use repository::{BoundedStore, IdentityStore, InMemoryIdentityStore, PgIdentityStore};
pub use routes::create_api_router;
pub use services::Authenticator;
pub use state::AppState;
