//! 애플리케이션 서비스 모듈.
//!
//! 라우트 핸들러에서 호출되는 인증 도메인 로직을 제공합니다.

pub mod authenticator;

pub use authenticator::{
    AuthError, Authenticator, LoginRequest, RefreshRequest, SignupRequest,
};
