// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::Extension,
    middleware,
    routing::get,
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::domain::services::token_verifier::TokenVerifier;
use crate::notifications::hub::NotificationHub;
use crate::presentation::handlers::{job_handler, ws_handler};
use crate::presentation::middleware::auth_middleware::{auth_middleware, AuthState};
use crate::queue::coordinator::JobQueueCoordinator;

/// 创建应用路由
///
/// # 参数
///
/// * `coordinator` - 队列协调器
/// * `hub` - 通知扇出中心
/// * `verifier` - 令牌校验器
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(
    coordinator: Arc<JobQueueCoordinator>,
    hub: Arc<NotificationHub>,
    verifier: Arc<dyn TokenVerifier>,
) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let protected_routes = Router::new()
        .route(
            "/v1/jobs",
            post(job_handler::submit_job).get(job_handler::list_active_jobs),
        )
        .route(
            "/v1/jobs/{id}",
            get(job_handler::get_job).delete(job_handler::cancel_job),
        )
        .route("/v1/queue/stats", get(job_handler::queue_stats))
        .route("/v1/queue/health", get(job_handler::queue_health))
        .layer(middleware::from_fn_with_state(
            AuthState {
                verifier: verifier.clone(),
            },
            auth_middleware,
        ));

    // WebSocket握手通过查询参数令牌自行认证
    let realtime_routes = Router::new().route("/v1/ws", get(ws_handler::ws_upgrade));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(realtime_routes)
        .layer(Extension(coordinator))
        .layer(Extension(hub))
        .layer(Extension(verifier))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
