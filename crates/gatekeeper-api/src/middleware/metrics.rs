//! 요청 단위 HTTP 메트릭 수집.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use crate::metrics::{fallback_route, HttpObservation};

/// 요청의 메트릭 경로 라벨.
///
/// 라우트에 매칭된 요청은 템플릿을 그대로 쓰고, 그렇지 않으면 실제 경로를 정규화합니다.
fn route_label(request: &Request) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => fallback_route(request.uri().path()),
    }
}

/// `axum::middleware::from_fn`으로 라우터 전체에 적용합니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let observation = HttpObservation::start(request.method(), route_label(&request));
    let response = next.run(request).await;
    observation.finish(response.status());
    response
}
