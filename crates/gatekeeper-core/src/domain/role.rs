//! 역할 정의.
//!
//! 역할은 닫힌 집합이며, 발급 시점에 토큰에 포함됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// 사용자 역할.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// 관리자 - 모든 신원 조회 가능
    Admin,
    /// 일반 사용자 - 자기 자신만 조회 가능
    User,
}

impl Role {
    /// 와이어 표현 ("ADMIN" | "USER").
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    /// 와이어 표현에서 역할 파싱. 정확히 일치해야 합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| CoreError::UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("USER"), Some(Role::User));
        assert_eq!(Role::parse("user"), None);
        assert_eq!(Role::parse(" ADMIN "), None);
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse("SUPERUSER"), None);
        assert_eq!(Role::parse(""), None);
        assert!("ROOT".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"ADMIN\"");

        let parsed: Role = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(parsed, Role::User);

        assert!(serde_json::from_str::<Role>("\"GUEST\"").is_err());
    }

    #[test]
    fn test_role_display_round_trips() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(Role::parse(&role.to_string()), Some(role));
        }
    }
}
