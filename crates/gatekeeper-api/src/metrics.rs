//! Prometheus 메트릭.
//!
//! HTTP 계층 메트릭과 인증 이벤트 카운터를 정의합니다. 레코더가 설치되지 않은
//! 상태(단위 테스트 등)에서는 모든 기록이 무시됩니다.

use std::time::Instant;

use axum::http::{Method, StatusCode};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_RESPONSES_TOTAL: &str = "http_responses_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const AUTH_EVENTS_TOTAL: &str = "auth_events_total";

/// 응답 시간 버킷 (초). 비밀번호 해싱 구간까지 포함합니다.
const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// 전역 레코더를 설치하고 `/metrics` 렌더링용 핸들을 반환합니다.
///
/// 프로세스당 한 번만 호출할 수 있습니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            DURATION_BUCKETS,
        )?
        .install_recorder()
}

/// 진행 중인 HTTP 요청 하나의 관측값.
///
/// 생성 시 요청 카운터를, [`HttpObservation::finish`]에서 응답 카운터와
/// 처리 시간을 기록합니다.
#[derive(Debug)]
pub struct HttpObservation {
    method: String,
    route: String,
    started: Instant,
}

impl HttpObservation {
    /// `route`는 라우트 템플릿(`/api/v1/users/{user_id}`) 또는 [`fallback_route`] 결과입니다.
    pub fn start(method: &Method, route: impl Into<String>) -> Self {
        let observation = Self {
            method: method.as_str().to_owned(),
            route: route.into(),
            started: Instant::now(),
        };
        counter!(
            HTTP_REQUESTS_TOTAL,
            "method" => observation.method.clone(),
            "path" => observation.route.clone()
        )
        .increment(1);
        observation
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn finish(self, status: StatusCode) {
        let elapsed = self.started.elapsed().as_secs_f64();
        counter!(
            HTTP_RESPONSES_TOTAL,
            "method" => self.method.clone(),
            "path" => self.route.clone(),
            "status" => status.as_str().to_owned()
        )
        .increment(1);
        histogram!(
            HTTP_REQUEST_DURATION_SECONDS,
            "method" => self.method,
            "path" => self.route
        )
        .record(elapsed);
    }
}

/// 인증 이벤트 카운터 증가.
///
/// `operation`은 signup, login, refresh, guard 중 하나이고
/// `outcome`은 `success` 또는 에러 코드입니다.
pub fn record_auth_event(operation: &'static str, outcome: &'static str) {
    counter!(AUTH_EVENTS_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
}

/// 라우트에 매칭되지 않은 요청의 경로 라벨.
///
/// 사용자 ID처럼 보이는 세그먼트는 `:id`로 접어 라벨 수가 늘지 않게 합니다.
pub fn fallback_route(path: &str) -> String {
    path.split('/')
        .map(|segment| if looks_like_id(segment) { ":id" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_id(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    let hex_or_dash = segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    match segment.len() {
        // 외부 사용자 ID (하이픈 없는 uuid)
        32 => hex_or_dash && !segment.contains('-'),
        36 => hex_or_dash && segment.matches('-').count() == 4,
        _ => segment.chars().all(|c| c.is_ascii_digit()),
    }
}
