// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::repositories::progress_repository::StoreError;
use crate::queue::coordinator::QueueError;

/// 资源不存在错误
///
/// 包括存在但不属于当前用户的作业，避免泄露作业ID
#[derive(Debug, thiserror::Error)]
#[error("Job not found")]
pub struct NotFound;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_message = self.0.to_string();

        let status = if self.0.downcast_ref::<NotFound>().is_some() {
            StatusCode::NOT_FOUND
        } else if let Some(queue_err) = self.0.downcast_ref::<QueueError>() {
            match queue_err {
                QueueError::Invalid(_) => StatusCode::BAD_REQUEST,
                QueueError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                QueueError::Store(StoreError::Serialization(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        } else if let Some(store_err) = self.0.downcast_ref::<StoreError>() {
            match store_err {
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else if error_message.contains("cannot be empty")
            || error_message.contains("invalid")
            || error_message.contains("must be")
            || error_message.contains("validation")
        {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
