//! 인증 및 인가 모듈.
//!
//! - JWT 기반 토큰 발급/검증 (Credential Codec)
//! - Argon2 비밀번호 해싱
//! - Access Guard 추출기
//! - 역할 기반 접근 정책

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;

pub use jwt::{Claims, IdentityClaims, JwtError, RefreshClaims, TokenCodec, TokenKind, TokenPair};
pub use middleware::{guard, AdminContext, AuthContext, GuardRejection};
pub use password::{hash_password, verify_password, PasswordError, MIN_PASSWORD_LEN};
pub use policy::{require_role, require_self_or_role, AccessDenied};
