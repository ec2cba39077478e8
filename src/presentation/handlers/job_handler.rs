// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::application::dto::job_request::SubmitJobRequestDto;
use crate::application::dto::job_response::{JobListResponseDto, SubmitJobResponseDto};
use crate::domain::models::progress::ProgressRecord;
use crate::domain::services::token_verifier::AuthContext;
use crate::presentation::errors::{AppError, NotFound};
use crate::queue::coordinator::{JobQueueCoordinator, QueueHealth, QueueStats};

/// 提交创意分析作业
///
/// # 返回值
///
/// * `202 Accepted` - 作业已入队（或按幂等键去重）
/// * `400 Bad Request` - 请求参数不合法
pub async fn submit_job(
    Extension(coordinator): Extension<Arc<JobQueueCoordinator>>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SubmitJobRequestDto>,
) -> Result<(StatusCode, Json<SubmitJobResponseDto>), AppError> {
    request
        .validate()
        .map_err(|e| anyhow::anyhow!("validation failed: {}", e))?;

    info!("User {} submitting job {}", auth.user_id, request.job_id);
    let receipt = coordinator.submit(request.into_job(auth.user_id)).await?;

    Ok((StatusCode::ACCEPTED, Json(receipt.into())))
}

/// 查询作业进度
///
/// 只能查询属于当前用户的作业，其余一律返回404。
pub async fn get_job(
    Extension(coordinator): Extension<Arc<JobQueueCoordinator>>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<String>,
) -> Result<Json<ProgressRecord>, AppError> {
    match coordinator.status(&job_id).await? {
        Some(record) if record.user_id == auth.user_id => Ok(Json(record)),
        _ => Err(NotFound.into()),
    }
}

/// 取消作业
pub async fn cancel_job(
    Extension(coordinator): Extension<Arc<JobQueueCoordinator>>,
    Extension(auth): Extension<AuthContext>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    // 归属校验与查询一致，不向其他用户泄露作业ID
    let owned = matches!(
        coordinator.status(&job_id).await?,
        Some(record) if record.user_id == auth.user_id
    );
    if !owned {
        return Err(NotFound.into());
    }

    let cancelled = coordinator.cancel(&job_id).await?;
    info!("User {} cancel of job {}: {}", auth.user_id, job_id, cancelled);
    Ok(Json(serde_json::json!({ "cancelled": cancelled })))
}

/// 列出当前用户的全部非终态作业
pub async fn list_active_jobs(
    Extension(coordinator): Extension<Arc<JobQueueCoordinator>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<JobListResponseDto>, AppError> {
    let jobs = coordinator.list_active(auth.user_id).await?;
    Ok(Json(jobs.into()))
}

/// 队列聚合统计
pub async fn queue_stats(
    Extension(coordinator): Extension<Arc<JobQueueCoordinator>>,
) -> Json<QueueStats> {
    Json(coordinator.stats())
}

/// 队列健康检查
pub async fn queue_health(
    Extension(coordinator): Extension<Arc<JobQueueCoordinator>>,
) -> (StatusCode, Json<QueueHealth>) {
    let health = coordinator.health().await;
    let status = if health.queue_reachable && health.worker_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
