//! 코어 에러 타입.

use thiserror::Error;

/// 설정 및 도메인 변환 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 로드 실패
    #[error("설정 로드 실패: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// 설정 값이 유효하지 않음
    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    /// 알 수 없는 역할
    #[error("알 수 없는 역할: {0}")]
    UnknownRole(String),
}

/// 코어 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;
