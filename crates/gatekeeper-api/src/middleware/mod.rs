//! 라우터 전체에 적용되는 HTTP 미들웨어.
//!
//! 인증은 미들웨어가 아니라 핸들러 추출기([`crate::auth::AuthContext`])가 담당합니다.

mod metrics;

pub use metrics::metrics_layer;
