//! 역할 기반 접근 정책.
//!
//! 상태를 갖지 않는 순수 함수입니다. 입력은 Access Guard가 만든 [`AuthContext`]뿐입니다.

use axum::response::{IntoResponse, Response};

use gatekeeper_core::{ExternalUserId, Role};

use super::AuthContext;
use crate::error::ApiError;

/// 접근 거부.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("이 리소스에 접근할 권한이 없습니다")]
pub struct AccessDenied;

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// 요청자의 역할이 정확히 `required`인지 확인합니다.
///
/// 역할 간 계층은 없습니다.
pub fn require_role(ctx: &AuthContext, required: Role) -> Result<(), AccessDenied> {
    if ctx.role == required {
        Ok(())
    } else {
        Err(AccessDenied)
    }
}

/// 본인 또는 `role` 보유자만 허용합니다.
///
/// USER는 대상 ID가 자신의 ID와 같아야 합니다. 그 외 역할은
/// [`require_role`] 판정을 따릅니다.
pub fn require_self_or_role(
    ctx: &AuthContext,
    target: &ExternalUserId,
    role: Role,
) -> Result<(), AccessDenied> {
    match ctx.role {
        Role::User if &ctx.uid == target => Ok(()),
        Role::User => Err(AccessDenied),
        _ => require_role(ctx, role),
    }
}
