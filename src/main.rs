// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ideaforge::budget::{BudgetConfig, BudgetGuard};
use ideaforge::config::settings::Settings;
use ideaforge::domain::repositories::progress_repository::ProgressRepository;
use ideaforge::domain::services::completion::CompletionService;
use ideaforge::domain::services::token_verifier::TokenVerifier;
use ideaforge::infrastructure::ai::openai_client::OpenAiClient;
use ideaforge::infrastructure::ai::resilient_client::ResilientCompletionClient;
use ideaforge::infrastructure::auth::static_token_verifier::StaticTokenVerifier;
use ideaforge::infrastructure::cache::redis_client::RedisClient;
use ideaforge::infrastructure::repositories::memory_progress_repo::MemoryProgressRepo;
use ideaforge::infrastructure::repositories::redis_progress_repo::RedisProgressRepo;
use ideaforge::notifications::hub::NotificationHub;
use ideaforge::pipeline::orchestrator::PipelineOrchestrator;
use ideaforge::presentation::routes;
use ideaforge::queue::coordinator::{JobQueueCoordinator, QueueConfig};
use ideaforge::queue::scheduler::QueueScheduler;
use ideaforge::utils::retry_policy::RetryPolicy;
use ideaforge::utils::telemetry;
use ideaforge::workers::expiration_worker::ExpirationWorker;
use ideaforge::workers::heartbeat_worker::HeartbeatWorker;
use ideaforge::workers::manager::WorkerManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting ideaforge...");

    // Initialize Prometheus Metrics
    ideaforge::infrastructure::metrics::init_metrics();

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Select progress store backend
    let progress: Arc<dyn ProgressRepository> = match settings.progress.backend.as_str() {
        "redis" => {
            let redis_settings = settings
                .redis
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("progress.backend is redis but redis.url is not set"))?;
            let redis = RedisClient::new(&redis_settings.url).await?;
            info!("Redis progress store initialized");
            Arc::new(RedisProgressRepo::new(
                redis,
                settings.progress.ttl_secs as usize,
            ))
        }
        _ => {
            info!("In-memory progress store initialized");
            Arc::new(MemoryProgressRepo::new(Duration::from_secs(
                settings.progress.ttl_secs,
            )))
        }
    };

    // 4. Initialize AI stack: budget guard, HTTP client, resilience wrapper
    let budget = Arc::new(BudgetGuard::new(BudgetConfig {
        max_requests_per_minute: settings.budget.max_requests_per_minute,
        max_tokens_per_minute: settings.budget.max_tokens_per_minute,
        daily_cost_ceiling: settings.budget.daily_cost_ceiling,
        warn_fraction: settings.budget.warn_fraction,
    }));
    let openai = Arc::new(OpenAiClient::new(
        settings.ai.api_key.clone(),
        settings.ai.api_base_url.clone(),
        Duration::from_secs(settings.ai.request_timeout_secs),
    ));
    let ai: Arc<dyn CompletionService> = Arc::new(ResilientCompletionClient::new(
        openai,
        budget.clone(),
        RetryPolicy::completion(),
    ));
    info!("AI completion client initialized");

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        ai,
        settings.ai.model.clone(),
        settings.ai.max_tokens,
        settings.ai.temperature,
    ));

    // 5. Initialize queue coordinator and notification hub
    let coordinator = Arc::new(JobQueueCoordinator::new(
        progress.clone(),
        QueueConfig {
            max_attempts: settings.queue.max_attempts,
            stall_timeout: Duration::from_secs(settings.queue.stall_timeout_secs),
            terminal_retention: Duration::from_secs(settings.queue.terminal_retention_secs),
        },
    ));
    let hub = Arc::new(NotificationHub::new());

    // 6. Start workers
    let job_retry = RetryPolicy {
        max_attempts: settings.queue.max_attempts,
        ..RetryPolicy::job()
    };
    let mut worker_manager = WorkerManager::new(
        coordinator.clone(),
        orchestrator.clone(),
        progress.clone(),
        hub.clone(),
        job_retry,
        Duration::from_secs(settings.queue.job_timeout_secs),
    );
    worker_manager.start_workers(settings.queue.worker_count).await;

    let scheduler = QueueScheduler::new(
        coordinator.clone(),
        Duration::from_secs(settings.queue.maintenance_interval_secs),
    );
    scheduler.start();

    ExpirationWorker::new(
        progress.clone(),
        Duration::from_secs(settings.progress.eviction_interval_secs),
    )
    .start();

    HeartbeatWorker::new(
        coordinator.clone(),
        hub.clone(),
        Duration::from_secs(settings.notifications.heartbeat_secs),
    )
    .start();

    // 7. Setup auth
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(StaticTokenVerifier::from_spec(&settings.auth.tokens));

    // 8. Start HTTP server
    let app = routes::routes(coordinator, hub, verifier);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    worker_manager.wait_for_shutdown().await;
    server.abort();

    Ok(())
}
