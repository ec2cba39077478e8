// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use metrics::{counter, histogram};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::budget::BudgetGuard;
use crate::domain::services::completion::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService,
};
use crate::infrastructure::ai::pricing;
use crate::utils::retry_policy::RetryPolicy;

/// 具备弹性的补全客户端
///
/// 包装底层补全服务：调用前咨询预算守卫（被拒绝时不发出
/// 任何网络调用），对可重试的失败按指数退避自动重试，
/// 成功后将实际用量回报给预算守卫记账。
pub struct ResilientCompletionClient {
    inner: Arc<dyn CompletionService>,
    budget: Arc<BudgetGuard>,
    policy: RetryPolicy,
}

impl ResilientCompletionClient {
    /// 创建新的弹性客户端实例
    ///
    /// # 参数
    ///
    /// * `inner` - 底层补全服务
    /// * `budget` - 预算守卫
    /// * `policy` - 单次调用的重试策略
    pub fn new(
        inner: Arc<dyn CompletionService>,
        budget: Arc<BudgetGuard>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            budget,
            policy,
        }
    }
}

#[async_trait]
impl CompletionService for ResilientCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        // 调用前估算：提示令牌按字符数÷4，生成部分按最大令牌数
        let prompt_tokens = pricing::estimate_tokens(&request.prompt)
            + request
                .system_message
                .as_deref()
                .map(pricing::estimate_tokens)
                .unwrap_or(0);
        let estimated_tokens = prompt_tokens + request.max_tokens as u64;

        if !self.budget.can_proceed(estimated_tokens) {
            let hint = self.budget.wait_hint();
            counter!("ai_requests_rejected_total", "reason" => "rate_window").increment(1);
            return Err(CompletionError::RateLimit {
                retry_after_ms: hint.as_millis() as u64,
            });
        }

        let estimated_cost =
            pricing::estimate_cost(&request.model, prompt_tokens, request.max_tokens as u64);
        if !self.budget.can_afford_cost(estimated_cost) {
            counter!("ai_requests_rejected_total", "reason" => "daily_budget").increment(1);
            return Err(CompletionError::InsufficientQuota(format!(
                "daily budget exhausted: ${:.2} spent today, call estimated at ${:.4}",
                self.budget.daily_spend(),
                estimated_cost
            )));
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            counter!("ai_requests_total").increment(1);

            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    // 事后按实际用量记账
                    self.budget.record_usage(response.tokens_used as u64);
                    self.budget.record_cost(response.cost);
                    histogram!("ai_request_duration_seconds")
                        .record(response.elapsed_ms as f64 / 1000.0);
                    histogram!("ai_request_cost_dollars").record(response.cost);
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && self.policy.has_attempts_left(attempt) => {
                    let delay = self.policy.delay_for(attempt, e.retry_after());
                    warn!(
                        "AI call failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt, self.policy.max_attempts, e, delay
                    );
                    counter!("ai_request_retries_total", "kind" => e.kind()).increment(1);
                    sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        "AI call failed permanently after {} attempt(s): {}",
                        attempt, e
                    );
                    counter!("ai_requests_failed_total", "kind" => e.kind()).increment(1);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "resilient_client_test.rs"]
mod tests;
