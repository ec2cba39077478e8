// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use ideaforge::domain::models::job::{Job, JobInput};
use ideaforge::domain::models::progress::JobStatus;
use ideaforge::domain::repositories::progress_repository::ProgressRepository;
use ideaforge::domain::services::completion::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService,
};
use ideaforge::domain::services::token_verifier::TokenVerifier;
use ideaforge::infrastructure::auth::static_token_verifier::StaticTokenVerifier;
use ideaforge::infrastructure::repositories::memory_progress_repo::MemoryProgressRepo;
use ideaforge::notifications::hub::NotificationHub;
use ideaforge::notifications::messages::OutboundMessage;
use ideaforge::pipeline::orchestrator::PipelineOrchestrator;
use ideaforge::presentation::routes;
use ideaforge::queue::coordinator::{JobQueueCoordinator, QueueConfig};
use ideaforge::utils::retry_policy::RetryPolicy;
use ideaforge::workers::manager::WorkerManager;

/// 模拟的AI补全服务，每次调用带少量延迟
struct MockAnalyst {
    delay: Duration,
    failure: Option<fn() -> CompletionError>,
}

impl MockAnalyst {
    fn instant() -> Self {
        Self {
            delay: Duration::from_millis(1),
            failure: None,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            failure: None,
        }
    }

    fn failing(failure: fn() -> CompletionError) -> Self {
        Self {
            delay: Duration::from_millis(1),
            failure: Some(failure),
        }
    }
}

#[async_trait]
impl CompletionService for MockAnalyst {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        tokio::time::sleep(self.delay).await;
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(CompletionResponse {
            content: format!("analysis based on {} chars of prompt", request.prompt.len()),
            tokens_used: 120,
            cost: 0.0024,
            elapsed_ms: self.delay.as_millis() as u64,
        })
    }
}

struct TestApp {
    coordinator: Arc<JobQueueCoordinator>,
    repo: Arc<MemoryProgressRepo>,
    hub: Arc<NotificationHub>,
}

async fn spawn_app(service: MockAnalyst) -> TestApp {
    let repo = Arc::new(MemoryProgressRepo::new(Duration::from_secs(3600)));
    let coordinator = Arc::new(JobQueueCoordinator::new(
        repo.clone(),
        QueueConfig::default(),
    ));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::new(service),
        "gpt-4o-mini".to_string(),
        512,
        0.7,
    ));
    let hub = Arc::new(NotificationHub::new());

    let mut manager = WorkerManager::new(
        coordinator.clone(),
        orchestrator,
        repo.clone(),
        hub.clone(),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            jitter_factor: 0.0,
        },
        Duration::from_secs(30),
    );
    manager.start_workers(2).await;

    TestApp {
        coordinator,
        repo,
        hub,
    }
}

fn sample_job(id: &str, user_id: Uuid) -> Job {
    Job::new(
        id.to_string(),
        user_id,
        Uuid::new_v4(),
        JobInput {
            description: "AI chatbot for support tickets".to_string(),
            target_audience: "mid-market SaaS companies".to_string(),
            problem_statement: "support teams are overwhelmed".to_string(),
            preferred_features: vec!["ticket triage".to_string()],
            preferred_tech: vec!["PostgreSQL".to_string()],
        },
        5,
    )
}

async fn wait_for_terminal(app: &TestApp, job_id: &str) -> ideaforge::domain::models::progress::ProgressRecord {
    for _ in 0..200 {
        if let Some(record) = app.repo.get(job_id).await.unwrap() {
            if record.status.is_terminal() {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not reach a terminal state", job_id);
}

#[tokio::test]
async fn test_job_runs_to_completion_with_live_progress() {
    let app = spawn_app(MockAnalyst::instant()).await;
    let user = Uuid::new_v4();
    let (_conn, mut updates) = app.hub.register(user);

    let receipt = app
        .coordinator
        .submit(sample_job("e2e-success", user))
        .await
        .unwrap();
    assert_eq!(receipt.status, JobStatus::Waiting);

    let record = wait_for_terminal(&app, "e2e-success").await;
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.percent, 100);
    assert_eq!(record.metrics.steps_completed.len(), 7);
    assert_eq!(record.metrics.total_tokens, 480);
    assert!(record.metrics.total_cost > 0.009);
    assert!(record.started_at.is_some());
    assert!(record.finished_at.is_some());

    // 结果负载包含全部分析部分
    let result = record.result.unwrap();
    for field in [
        "business_analysis",
        "market_validation",
        "features",
        "tech_stack",
        "summary",
        "generated_at",
    ] {
        assert!(
            !result[field].is_null(),
            "missing result field {}",
            field
        );
    }

    // 通知流中的进度百分比单调不减，且覆盖全部里程碑
    let mut percents = Vec::new();
    while let Ok(message) = updates.try_recv() {
        if let OutboundMessage::Progress { record } = message {
            percents.push(record.percent);
        }
    }
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    for milestone in [15, 30, 50, 70, 85, 95, 100] {
        assert!(percents.contains(&milestone), "missing milestone {}", milestone);
    }
}

#[tokio::test]
async fn test_resubmit_returns_existing_job() {
    let app = spawn_app(MockAnalyst::instant()).await;
    let user = Uuid::new_v4();

    app.coordinator
        .submit(sample_job("e2e-idempotent", user))
        .await
        .unwrap();
    let record = wait_for_terminal(&app, "e2e-idempotent").await;
    assert_eq!(record.status, JobStatus::Completed);

    // 终态后的重复提交仍返回现有作业，不重新执行
    let receipt = app
        .coordinator
        .submit(sample_job("e2e-idempotent", user))
        .await
        .unwrap();
    assert!(receipt.deduplicated);
    assert_eq!(receipt.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_non_retryable_failure_reports_error() {
    let app = spawn_app(MockAnalyst::failing(|| {
        CompletionError::Validation("prompt rejected".to_string())
    }))
    .await;
    let user = Uuid::new_v4();

    app.coordinator
        .submit(sample_job("e2e-failure", user))
        .await
        .unwrap();

    let record = wait_for_terminal(&app, "e2e-failure").await;
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("prompt rejected"));
    assert!(record.result.is_none());
}

#[tokio::test]
async fn test_cancel_active_job_stops_mid_pipeline() {
    let app = spawn_app(MockAnalyst::slow(Duration::from_millis(150))).await;
    let user = Uuid::new_v4();

    app.coordinator
        .submit(sample_job("e2e-cancel", user))
        .await
        .unwrap();

    // 等作业进入活跃状态后请求取消
    for _ in 0..100 {
        let record = app.repo.get("e2e-cancel").await.unwrap().unwrap();
        if record.status == JobStatus::Active {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(app.coordinator.cancel("e2e-cancel").await.unwrap());

    let record = wait_for_terminal(&app, "e2e-cancel").await;
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("Cancelled by user"));
    assert!(record.percent < 100);
}

#[tokio::test]
async fn test_http_surface_submit_poll_cancel() {
    let app = spawn_app(MockAnalyst::instant()).await;
    let user = Uuid::new_v4();
    let token = "integration-token";
    let verifier: Arc<dyn TokenVerifier> = Arc::new(StaticTokenVerifier::from_spec(&format!(
        "{}={}",
        token, user
    )));

    let router = routes::routes(app.coordinator.clone(), app.hub.clone(), verifier);

    // 未认证的提交被拒绝
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/jobs")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 带令牌的提交返回202
    let payload = serde_json::json!({
        "jobId": "http-job",
        "projectId": Uuid::new_v4(),
        "description": "AI chatbot for support tickets",
        "targetAudience": "mid-market SaaS companies",
        "problemStatement": "support teams are overwhelmed",
        "priority": 5
    });
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/jobs")
                .header("content-type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let record = wait_for_terminal(&app, "http-job").await;
    assert_eq!(record.status, JobStatus::Completed);

    // 进度查询返回完整记录
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/jobs/http-job")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 其他用户的作业一律404
    let other_verifier: Arc<dyn TokenVerifier> = Arc::new(StaticTokenVerifier::from_spec(
        &format!("other-token={}", Uuid::new_v4()),
    ));
    let other_router = routes::routes(
        app.coordinator.clone(),
        app.hub.clone(),
        other_verifier,
    );
    let response = other_router
        .oneshot(
            Request::builder()
                .uri("/v1/jobs/http-job")
                .header("Authorization", "Bearer other-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // 终态作业无法取消
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/v1/jobs/http-job")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["cancelled"], serde_json::json!(false));

    // 统计与健康端点
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/queue/stats")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/v1/queue/health")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
