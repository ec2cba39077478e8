use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::budget::{BudgetConfig, BudgetGuard};
use crate::domain::services::completion::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService,
};
use crate::infrastructure::ai::resilient_client::ResilientCompletionClient;
use crate::utils::retry_policy::RetryPolicy;

/// 前 `failures` 次调用返回指定错误，之后成功
struct FlakyService {
    failures: u32,
    error: CompletionError,
    calls: AtomicU32,
}

impl FlakyService {
    fn new(failures: u32, error: CompletionError) -> Self {
        Self {
            failures,
            error,
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FlakyService {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(self.error.clone())
        } else {
            Ok(CompletionResponse {
                content: "analysis text".to_string(),
                tokens_used: 100,
                cost: 0.001,
                elapsed_ms: 5,
            })
        }
    }
}

fn request() -> CompletionRequest {
    CompletionRequest {
        model: "gpt-3.5-turbo".to_string(),
        prompt: "Analyze this idea".to_string(),
        system_message: None,
        max_tokens: 256,
        temperature: 0.7,
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        jitter_factor: 0.0,
    }
}

#[tokio::test]
async fn test_retryable_failures_then_success_makes_three_attempts() {
    let service = Arc::new(FlakyService::new(
        2,
        CompletionError::Network("connection reset".to_string()),
    ));
    let budget = Arc::new(BudgetGuard::new(BudgetConfig::default()));
    let client = ResilientCompletionClient::new(service.clone(), budget, fast_policy());

    let response = client.complete(request()).await.unwrap();

    assert_eq!(response.content, "analysis text");
    assert_eq!(service.call_count(), 3);
}

#[tokio::test]
async fn test_insufficient_quota_fails_without_retry() {
    let service = Arc::new(FlakyService::new(
        1,
        CompletionError::InsufficientQuota("billing hard limit reached".to_string()),
    ));
    let budget = Arc::new(BudgetGuard::new(BudgetConfig::default()));
    let client = ResilientCompletionClient::new(service.clone(), budget, fast_policy());

    let err = client.complete(request()).await.unwrap_err();

    assert!(matches!(err, CompletionError::InsufficientQuota(_)));
    assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn test_attempt_exhaustion_surfaces_last_error() {
    let service = Arc::new(FlakyService::new(
        10,
        CompletionError::Api("502 bad gateway".to_string()),
    ));
    let budget = Arc::new(BudgetGuard::new(BudgetConfig::default()));
    let client = ResilientCompletionClient::new(service.clone(), budget, fast_policy());

    let err = client.complete(request()).await.unwrap_err();

    assert!(matches!(err, CompletionError::Api(_)));
    assert_eq!(service.call_count(), 3);
}

#[tokio::test]
async fn test_daily_budget_rejection_makes_no_call() {
    let service = Arc::new(FlakyService::new(0, CompletionError::Api("unused".into())));
    let budget = Arc::new(BudgetGuard::new(BudgetConfig {
        daily_cost_ceiling: 5.0,
        max_tokens_per_minute: 1_000_000,
        ..Default::default()
    }));
    budget.record_cost(4.99);

    let mut big_request = request();
    big_request.prompt = "x".repeat(400_000);
    big_request.max_tokens = 4096;

    let client = ResilientCompletionClient::new(service.clone(), budget, fast_policy());
    let err = client.complete(big_request).await.unwrap_err();

    assert!(matches!(err, CompletionError::InsufficientQuota(_)));
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn test_rate_window_rejection_makes_no_call() {
    let service = Arc::new(FlakyService::new(0, CompletionError::Api("unused".into())));
    let budget = Arc::new(BudgetGuard::new(BudgetConfig {
        max_requests_per_minute: 1,
        ..Default::default()
    }));
    budget.record_usage(100);

    let client = ResilientCompletionClient::new(service.clone(), budget, fast_policy());
    let err = client.complete(request()).await.unwrap_err();

    assert!(matches!(err, CompletionError::RateLimit { .. }));
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn test_success_reports_usage_to_budget() {
    let service = Arc::new(FlakyService::new(0, CompletionError::Api("unused".into())));
    let budget = Arc::new(BudgetGuard::new(BudgetConfig::default()));
    let client = ResilientCompletionClient::new(service, budget.clone(), fast_policy());

    client.complete(request()).await.unwrap();

    assert!((budget.daily_spend() - 0.001).abs() < 1e-9);
}
