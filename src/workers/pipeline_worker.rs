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

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::progress::{JobStatus, ProgressMetrics, ProgressUpdate};
use crate::domain::repositories::progress_repository::ProgressRepository;
use crate::notifications::hub::NotificationHub;
use crate::notifications::messages::Severity;
use crate::pipeline::orchestrator::{
    PipelineError, PipelineOrchestrator, StepObserver, StepUpdate,
};
use crate::queue::coordinator::{JobLease, JobQueueCoordinator};
use crate::utils::retry_policy::RetryPolicy;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 管道工作器
///
/// 从协调器拉取租约并独占驱动一个作业：写入全部进度、
/// 在步骤边界响应取消、对可重试的补全失败安排退避重试。
pub struct PipelineWorker {
    coordinator: Arc<JobQueueCoordinator>,
    orchestrator: Arc<PipelineOrchestrator>,
    progress: Arc<dyn ProgressRepository>,
    hub: Arc<NotificationHub>,
    retry: RetryPolicy,
    job_timeout: Duration,
    worker_id: usize,
}

impl PipelineWorker {
    /// 创建新的管道工作器实例
    ///
    /// # 参数
    ///
    /// * `coordinator` - 队列协调器
    /// * `orchestrator` - AI编排服务
    /// * `progress` - 进度存储
    /// * `hub` - 通知扇出中心
    /// * `retry` - 作业级重试策略
    /// * `job_timeout` - 单次尝试的硬超时
    /// * `worker_id` - 工作器编号（用于日志）
    pub fn new(
        coordinator: Arc<JobQueueCoordinator>,
        orchestrator: Arc<PipelineOrchestrator>,
        progress: Arc<dyn ProgressRepository>,
        hub: Arc<NotificationHub>,
        retry: RetryPolicy,
        job_timeout: Duration,
        worker_id: usize,
    ) -> Self {
        Self {
            coordinator,
            orchestrator,
            progress,
            hub,
            retry,
            job_timeout,
            worker_id,
        }
    }

    /// 运行工作器循环
    ///
    /// 每个工作器同一时刻最多执行一个作业，并发上限由
    /// 工作器池的大小限定。
    pub async fn run(&self) {
        info!("Pipeline worker {} started", self.worker_id);
        loop {
            match self.coordinator.try_acquire_next() {
                Some(lease) => self.process(lease).await,
                None => sleep(IDLE_POLL_INTERVAL).await,
            }
        }
    }

    /// 处理一个租约
    #[instrument(skip_all, fields(job_id = %lease.job.id, attempt = lease.attempt, worker = self.worker_id))]
    pub(crate) async fn process(&self, lease: JobLease) {
        let job_id = lease.job.id.clone();
        let attempt = lease.attempt;
        let started = Instant::now();
        counter!("jobs_processed_total").increment(1);

        // 跨尝试累计的花费/令牌/耗时从现有记录带入，
        // 已完成步骤列表每次尝试重置
        let carried = match self.progress.get(&job_id).await {
            Ok(Some(record)) => record.metrics,
            _ => ProgressMetrics::default(),
        };
        let mut initial = carried.clone();
        initial.steps_completed.clear();

        let begun = self
            .merge_and_emit(
                &job_id,
                attempt,
                ProgressUpdate {
                    status: Some(JobStatus::Active),
                    percent: Some(0),
                    current_step: Some("Starting".to_string()),
                    started_at: Some(Utc::now()),
                    clear_error: true,
                    metrics: Some(initial.clone()),
                    ..Default::default()
                },
            )
            .await;
        if !begun {
            // 进度存储不可用时放弃本次尝试，卡死重排会再给一次机会
            error!("Could not mark job {} active, abandoning attempt", job_id);
            return;
        }

        let sink = WorkerProgressSink {
            coordinator: self.coordinator.clone(),
            hub: self.hub.clone(),
            job_id: job_id.clone(),
            attempt,
            cancelled: lease.cancelled.clone(),
            metrics: Mutex::new(initial),
            carried_ms: carried.processing_ms,
            attempt_started: started,
        };

        let outcome = tokio::time::timeout(
            self.job_timeout,
            self.orchestrator.run(&lease.job, &sink),
        )
        .await;
        let final_metrics = sink.snapshot();
        histogram!("job_processing_duration_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Err(_) => {
                warn!("Job {} exceeded {}s timeout", job_id, self.job_timeout.as_secs());
                counter!("jobs_timed_out_total").increment(1);
                self.finish_failed(
                    &job_id,
                    lease.job.user_id,
                    attempt,
                    final_metrics,
                    format!("Timed out after {}s", self.job_timeout.as_secs()),
                )
                .await;
            }
            Ok(Ok(result)) => {
                let payload = serde_json::to_value(&result).unwrap_or_default();
                let applied = self
                    .merge_and_emit(
                        &job_id,
                        attempt,
                        ProgressUpdate {
                            status: Some(JobStatus::Completed),
                            percent: Some(100),
                            current_step: Some("Completed".to_string()),
                            finished_at: Some(Utc::now()),
                            metrics: Some(final_metrics),
                            result: Some(payload),
                            ..Default::default()
                        },
                    )
                    .await;
                self.coordinator.mark_terminal(&job_id, attempt, true);
                if applied {
                    self.hub.notify_user(
                        lease.job.user_id,
                        format!("Job {} completed", job_id),
                        Severity::Info,
                    );
                }
                info!("Job {} completed in {}ms", job_id, started.elapsed().as_millis());
            }
            Ok(Err(PipelineError::Cancelled)) => {
                let update = ProgressUpdate {
                    metrics: Some(final_metrics),
                    ..ProgressUpdate::cancelled()
                };
                self.merge_and_emit(&job_id, attempt, update).await;
                self.coordinator.mark_terminal(&job_id, attempt, false);
                if lease.cancelled.load(Ordering::SeqCst) {
                    counter!("jobs_cancelled_total").increment(1);
                    info!("Job {} cancelled at step boundary", job_id);
                } else {
                    // 取消标志未置位却中途停下：租约已被新的尝试取代
                    info!("Job {} attempt {} lost its lease, stopping", job_id, attempt);
                }
            }
            Ok(Err(PipelineError::InvalidInput(message))) => {
                self.finish_failed(&job_id, lease.job.user_id, attempt, final_metrics, message)
                    .await;
            }
            Ok(Err(PipelineError::Completion(e))) => {
                let retryable = e.is_retryable()
                    && self.retry.has_attempts_left(attempt)
                    && !lease.cancelled.load(Ordering::SeqCst);
                if retryable {
                    let delay = self.retry.delay_for(attempt, e.retry_after());
                    warn!(
                        "Job {} attempt {} failed ({}), retrying in {:?}",
                        job_id, attempt, e, delay
                    );
                    self.merge_and_emit(
                        &job_id,
                        attempt,
                        ProgressUpdate {
                            status: Some(JobStatus::Delayed),
                            current_step: Some("Waiting to retry".to_string()),
                            error: Some(e.to_string()),
                            metrics: Some(final_metrics),
                            ..Default::default()
                        },
                    )
                    .await;
                    self.coordinator.schedule_retry(&job_id, attempt, delay);
                } else {
                    self.finish_failed(
                        &job_id,
                        lease.job.user_id,
                        attempt,
                        final_metrics,
                        e.to_string(),
                    )
                    .await;
                }
            }
        }
    }

    async fn finish_failed(
        &self,
        job_id: &str,
        user_id: Uuid,
        attempt: u32,
        metrics: ProgressMetrics,
        message: String,
    ) {
        error!("Job {} failed permanently: {}", job_id, message);
        let applied = self
            .merge_and_emit(
                job_id,
                attempt,
                ProgressUpdate {
                    status: Some(JobStatus::Failed),
                    percent: Some(0),
                    current_step: Some("Failed".to_string()),
                    finished_at: Some(Utc::now()),
                    error: Some(message.clone()),
                    metrics: Some(metrics),
                    ..Default::default()
                },
            )
            .await;
        // 失败计数由协调器在终态转换处统一累计
        self.coordinator.mark_terminal(job_id, attempt, false);
        if applied {
            self.hub.notify_user(
                user_id,
                format!("Job {} failed: {}", job_id, message),
                Severity::Error,
            );
        }
    }

    /// 经协调器的租约栅栏合并进度并推送通知
    ///
    /// # 返回值
    ///
    /// 写入被应用时返回 true
    async fn merge_and_emit(&self, job_id: &str, attempt: u32, update: ProgressUpdate) -> bool {
        match self.coordinator.merge_for_attempt(job_id, attempt, update).await {
            Ok(Some(record)) => {
                self.hub.emit_progress(&record);
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("Progress write for job {} failed: {}", job_id, e);
                false
            }
        }
    }
}

/// 作业执行期间的进度汇入端
///
/// 实现步骤观察者：在每个步骤边界检查取消标志、累计
/// 指标、经租约栅栏写入合并更新并推送通知。
struct WorkerProgressSink {
    coordinator: Arc<JobQueueCoordinator>,
    hub: Arc<NotificationHub>,
    job_id: String,
    attempt: u32,
    cancelled: Arc<AtomicBool>,
    metrics: Mutex<ProgressMetrics>,
    carried_ms: u64,
    attempt_started: Instant,
}

impl WorkerProgressSink {
    fn snapshot(&self) -> ProgressMetrics {
        let mut metrics = self.metrics.lock().clone();
        metrics.processing_ms = self.carried_ms + self.attempt_started.elapsed().as_millis() as u64;
        metrics
    }
}

#[async_trait]
impl StepObserver for WorkerProgressSink {
    async fn on_step_completed(&self, update: StepUpdate) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return false;
        }

        let metrics = {
            let mut metrics = self.metrics.lock();
            metrics.steps_completed.push(update.name.to_string());
            metrics.total_tokens += update.tokens_used;
            metrics.total_cost += update.cost;
            metrics.processing_ms =
                self.carried_ms + self.attempt_started.elapsed().as_millis() as u64;
            metrics.clone()
        };

        let merged = self
            .coordinator
            .merge_for_attempt(
                &self.job_id,
                self.attempt,
                ProgressUpdate {
                    status: Some(JobStatus::Active),
                    percent: Some(update.percent),
                    current_step: Some(update.label.to_string()),
                    metrics: Some(metrics),
                    ..Default::default()
                },
            )
            .await;
        match merged {
            Ok(Some(record)) => {
                self.hub.emit_progress(&record);
                true
            }
            // 写入被栅栏拒绝：租约已被新的尝试取代，停止本次执行
            Ok(None) => false,
            Err(e) => {
                // 进度写入失败不终止作业，卡死检测兜底
                warn!("Step progress write for job {} failed: {}", self.job_id, e);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_worker_test.rs"]
mod tests;
