// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::domain::services::completion::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService,
};
use crate::infrastructure::ai::pricing;

/// 速率受限时服务端未给出建议的默认等待时间
const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

/// OpenAI兼容的补全客户端
///
/// 外部AI补全服务的HTTP实现。错误在此处分类一次，
/// 产生封闭的 `CompletionError` 变体集合。
pub struct OpenAiClient {
    api_key: String,
    api_base_url: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// 创建新的客户端实例
    ///
    /// # 参数
    ///
    /// * `api_key` - API密钥
    /// * `api_base_url` - API基础URL（例如 https://api.openai.com/v1）
    /// * `request_timeout` - 单次调用超时
    pub fn new(api_key: String, api_base_url: String, request_timeout: Duration) -> Self {
        Self {
            api_key,
            api_base_url,
            request_timeout,
            client: reqwest::Client::new(),
        }
    }

    /// 将HTTP错误响应分类为封闭的错误变体
    ///
    /// 429 → rate_limit（携带服务端 Retry-After）；
    /// 402 与配额类400 → insufficient_quota；
    /// 401/403 与其余400 → validation_error；
    /// ≥500 与未识别状态 → api_error。
    fn classify_status(
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
    ) -> CompletionError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimit {
                retry_after_ms: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_MS),
            },
            StatusCode::PAYMENT_REQUIRED => {
                CompletionError::InsufficientQuota(format!("payment required: {}", body))
            }
            StatusCode::BAD_REQUEST => {
                let lower = body.to_lowercase();
                if lower.contains("quota") || lower.contains("billing") {
                    CompletionError::InsufficientQuota(body.to_string())
                } else {
                    CompletionError::Validation(body.to_string())
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CompletionError::Validation(format!("authentication failed: {}", body))
            }
            s if s.is_server_error() => {
                CompletionError::Api(format!("{}: {}", s, body))
            }
            s => CompletionError::Api(format!("unexpected status {}: {}", s, body)),
        }
    }

    /// 将传输层错误分类为封闭的错误变体
    fn classify_transport(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            CompletionError::Timeout(self.request_timeout.as_millis() as u64)
        } else if err.is_connect() {
            CompletionError::Network(err.to_string())
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_message {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);

        let text = response
            .text()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, retry_after, &text));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Api(format!("malformed response body: {}", e)))?;

        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CompletionError::Api("response missing message content".to_string()))?
            .to_string();

        let prompt_tokens = parsed["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let completion_tokens = parsed["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;
        let tokens_used = parsed["usage"]["total_tokens"]
            .as_u64()
            .unwrap_or((prompt_tokens + completion_tokens) as u64) as u32;

        Ok(CompletionResponse {
            content,
            tokens_used,
            cost: pricing::actual_cost(&request.model, prompt_tokens, completion_tokens),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
#[path = "openai_client_test.rs"]
mod tests;
