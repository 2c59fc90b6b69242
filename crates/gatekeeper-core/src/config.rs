//! 설정 관리.
//!
//! 기본값 → 설정 파일 → `GATEKEEPER__` 환경 변수 → 관례적 환경 변수
//! (`JWT_SECRET`, `DATABASE_URL`, `PORT`, `API_HOST`, `CORS_ORIGINS`) 순서로 덮어씁니다.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, CoreResult};

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 토큰 발급 설정
    #[serde(default)]
    pub auth: AuthConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 전체 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin. 비어 있으면 모든 origin 허용 (개발용)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// 소켓 주소 반환.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL (없으면 메모리 저장소 사용)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 저장소 작업 하나당 데드라인 (초)
    pub operation_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 10,
            operation_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// 저장소 작업 데드라인.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// 토큰 발급 설정.
///
/// 서명 키는 프로세스 시작 후 읽기 전용이며, 각 컴포넌트에 명시적으로 주입됩니다.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 서명 키
    #[serde(deserialize_with = "deserialize_secret")]
    pub jwt_secret: SecretString,
    /// Access Token 유효 시간 (분)
    pub access_token_ttl_minutes: i64,
    /// Refresh Token 유효 시간 (분)
    pub refresh_token_ttl_minutes: i64,
    /// 토큰을 담는 요청 헤더 이름
    pub token_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::new(String::new().into_boxed_str()),
            access_token_ttl_minutes: 24 * 60,
            refresh_token_ttl_minutes: 7 * 24 * 60,
            token_header: "token".to_string(),
        }
    }
}

impl AuthConfig {
    /// 주어진 서명 키로 기본 설정 생성.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: SecretString::new(secret.into().into_boxed_str()),
            ..Default::default()
        }
    }

    /// 서명 키 존재 여부 및 유효 시간 검증.
    pub fn validate(&self) -> CoreResult<()> {
        if self.jwt_secret.expose_secret().trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "auth.jwt_secret (JWT_SECRET)이 설정되지 않았습니다".to_string(),
            ));
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_minutes <= 0 {
            return Err(CoreError::InvalidConfig(
                "토큰 유효 시간은 0보다 커야 합니다".to_string(),
            ));
        }
        if self.refresh_token_ttl_minutes <= self.access_token_ttl_minutes {
            return Err(CoreError::InvalidConfig(
                "refresh_token_ttl_minutes는 access_token_ttl_minutes보다 커야 합니다".to_string(),
            ));
        }
        if self.token_header.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "auth.token_header가 비어 있습니다".to_string(),
            ));
        }
        Ok(())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into_boxed_str()))
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "gatekeeper_api=info,gatekeeper_core=info,tower_http=info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드하고 검증합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.trim().parse::<i64>().ok());
        let cors_origins = std::env::var("CORS_ORIGINS").ok().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("GATEKEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.host", std::env::var("API_HOST").ok())?
            .set_override_option("server.port", port)?
            .set_override_option("server.cors_origins", cors_origins)?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load("config/default.toml")
    }

    /// 시작 시점 검증. 실패는 프로세스 기동 실패로 취급됩니다.
    pub fn validate(&self) -> CoreResult<()> {
        self.auth.validate()?;
        self.logging.format.parse::<crate::logging::LogFormat>()?;
        if self.database.operation_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "database.operation_timeout_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.access_token_ttl_minutes, 1440);
        assert_eq!(config.auth.refresh_token_ttl_minutes, 10080);
        assert_eq!(config.auth.token_header, "token");
        assert_eq!(config.database.operation_timeout(), Duration::from_secs(30));
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_valid_secret_passes() {
        let config = AppConfig {
            auth: AuthConfig::with_secret("a-long-enough-signing-secret"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let mut auth = AuthConfig::with_secret("secret");
        auth.refresh_token_ttl_minutes = auth.access_token_ttl_minutes;
        assert!(auth.validate().is_err());

        auth.refresh_token_ttl_minutes = auth.access_token_ttl_minutes + 1;
        assert!(auth.validate().is_ok());

        auth.access_token_ttl_minutes = 0;
        assert!(auth.validate().is_err());
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let auth = AuthConfig::with_secret("super-secret-value");
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.socket_addr().unwrap().port(), 8000);

        let bad = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_deserialize_from_toml_source() {
        let raw = r#"
            [auth]
            jwt_secret = "from-file"
            access_token_ttl_minutes = 15

            [database]
            operation_timeout_secs = 5
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.auth.jwt_secret.expose_secret(), "from-file");
        assert_eq!(config.auth.access_token_ttl_minutes, 15);
        assert_eq!(config.auth.refresh_token_ttl_minutes, 10080);
        assert_eq!(config.database.operation_timeout_secs, 5);
        assert_eq!(config.server.port, 8000);
        assert!(config.validate().is_ok());
    }
}
