//! 비밀번호 해싱.
//!
//! Argon2id PHC 문자열만 저장합니다. 해싱은 CPU를 오래 점유하므로 요청 경로에서는
//! `*_blocking` 버전을 사용합니다.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// 가입 시 요구되는 최소 비밀번호 길이.
pub const MIN_PASSWORD_LEN: u64 = 6;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패: {0}")]
    HashingFailed(String),
    /// 비밀번호 불일치
    #[error("비밀번호가 일치하지 않습니다")]
    Mismatch,
    /// 저장된 값이 PHC 문자열이 아님
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("해싱 작업이 중단되었습니다: {0}")]
    TaskFailed(String),
}

/// 임의 솔트로 해싱한 PHC 문자열을 반환합니다.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// 해시에 기록된 파라미터로 다시 계산해 비교합니다.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(PasswordError::Mismatch),
        Err(e) => Err(PasswordError::HashingFailed(e.to_string())),
    }
}

/// 존재하지 않는 계정용 해시. 실제 해시와 같은 파라미터로 한 번만 계산합니다.
fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("gatekeeper-decoy-password").unwrap_or_default())
}

pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<(), PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
}

/// 계정이 없을 때도 검증 한 번의 비용을 치릅니다. 결과는 항상 버립니다.
pub async fn verify_decoy_blocking(password: String) {
    let _ = tokio::task::spawn_blocking(move || verify_password(&password, decoy_hash())).await;
}
