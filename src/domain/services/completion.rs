// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 一次AI补全调用的请求参数
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// 模型名称
    pub model: String,
    /// 用户提示词
    pub prompt: String,
    /// 系统消息（可选）
    pub system_message: Option<String>,
    /// 最大生成令牌数
    pub max_tokens: u32,
    /// 采样温度
    pub temperature: f32,
}

/// 一次AI补全调用的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// 生成的文本内容
    pub content: String,
    /// 实际消耗的令牌总数
    pub tokens_used: u32,
    /// 实际花费（美元）
    pub cost: f64,
    /// 调用耗时（毫秒）
    pub elapsed_ms: u64,
}

/// AI补全错误的封闭分类
///
/// 错误在外部调用封装的边界处分类一次，下游只依赖
/// 类型化的变体，不做临时字段检查。
#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    /// 速率受限（HTTP 429 或本地速率窗口拒绝），可重试
    #[error("Rate limit exceeded, retry after {retry_after_ms}ms")]
    RateLimit { retry_after_ms: u64 },

    /// 配额/预算耗尽（HTTP 402 或配额类400，或本地日花费上限拒绝），不可重试
    #[error("Insufficient quota: {0}")]
    InsufficientQuota(String),

    /// 服务端错误（HTTP ≥500 及其他未分类错误），可重试
    #[error("API error: {0}")]
    Api(String),

    /// 网络错误（DNS/连接重置等），可重试
    #[error("Network error: {0}")]
    Network(String),

    /// 调用超时，可重试
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// 请求校验失败（HTTP 401 或格式错误的400），不可重试
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CompletionError {
    /// 判断该错误是否值得自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimit { .. }
                | CompletionError::Api(_)
                | CompletionError::Network(_)
                | CompletionError::Timeout(_)
        )
    }

    /// 服务端建议的重试等待时间（仅速率受限时存在）
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CompletionError::RateLimit { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }

    /// 错误类别的稳定标识，用于日志与指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::RateLimit { .. } => "rate_limit",
            CompletionError::InsufficientQuota(_) => "insufficient_quota",
            CompletionError::Api(_) => "api_error",
            CompletionError::Network(_) => "network_error",
            CompletionError::Timeout(_) => "timeout",
            CompletionError::Validation(_) => "validation_error",
        }
    }
}

/// AI补全服务特质
///
/// 外部AI补全服务的唯一调用边界。
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// 执行一次补全调用
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CompletionError::RateLimit { retry_after_ms: 500 }.is_retryable());
        assert!(CompletionError::Api("502 bad gateway".into()).is_retryable());
        assert!(CompletionError::Network("connection reset".into()).is_retryable());
        assert!(CompletionError::Timeout(30_000).is_retryable());

        assert!(!CompletionError::InsufficientQuota("billing".into()).is_retryable());
        assert!(!CompletionError::Validation("bad api key".into()).is_retryable());
    }

    #[test]
    fn test_retry_after_hint() {
        let err = CompletionError::RateLimit {
            retry_after_ms: 2000,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_millis(2000)));
        assert_eq!(CompletionError::Timeout(1).retry_after(), None);
    }
}
