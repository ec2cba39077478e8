// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::models::job::Job;
use crate::domain::models::progress::{JobStatus, ProgressRecord, ProgressUpdate};
use crate::domain::repositories::progress_repository::{ProgressRepository, StoreError};

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 作业参数不合法，在作业创建之前被拒绝
    #[error("Invalid job: {0}")]
    Invalid(String),

    /// 进度存储错误
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 队列配置
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// 每个作业的最大执行尝试次数
    pub max_attempts: u32,
    /// 无进度视为卡死的时间间隔
    pub stall_timeout: Duration,
    /// 终态作业在队列登记表中的保留时间
    pub terminal_retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            // 必须大于单个AI步骤的最坏耗时（补全级重试含退避约185秒），
            // 否则正常重试中的作业会被误判为卡死
            stall_timeout: Duration::from_secs(300),
            terminal_retention: Duration::from_secs(300),
        }
    }
}

/// 作业在协调器登记表中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    Waiting,
    Active,
    Delayed,
    Terminal,
}

/// 登记表条目
struct JobEntry {
    job: Job,
    phase: JobPhase,
    cancelled: Arc<AtomicBool>,
    attempts: u32,
    stall_requeued: bool,
    last_progress_at: DateTime<Utc>,
    terminal_at: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn new(job: Job) -> Self {
        Self {
            job,
            phase: JobPhase::Waiting,
            cancelled: Arc::new(AtomicBool::new(false)),
            attempts: 0,
            stall_requeued: false,
            last_progress_at: Utc::now(),
            terminal_at: None,
        }
    }

    fn status(&self) -> JobStatus {
        match self.phase {
            JobPhase::Waiting => JobStatus::Waiting,
            JobPhase::Active => JobStatus::Active,
            JobPhase::Delayed => JobStatus::Delayed,
            JobPhase::Terminal => JobStatus::Failed,
        }
    }
}

/// 等待集中的条目，按优先级降序、到达顺序升序出队
#[derive(Debug, Eq, PartialEq)]
struct WaitingJob {
    priority: i32,
    seq: u64,
    job_id: String,
}

impl Ord for WaitingJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for WaitingJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// 提交回执
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    /// 作业ID（幂等键）
    pub job_id: String,
    /// 提交时刻的作业状态
    pub status: JobStatus,
    /// 为 true 时表示该ID已在处理中，未创建新的执行
    pub deduplicated: bool,
}

/// 队列聚合统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

/// 队列健康视图
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub queue_reachable: bool,
    pub worker_ready: bool,
    pub active_count: u64,
    pub waiting_count: u64,
}

/// 发给工作器的作业租约
///
/// 同一作业ID同一时刻最多存在一个有效租约。
pub struct JobLease {
    pub job: Job,
    /// 本次租约对应的尝试序号（1起）
    pub attempt: u32,
    /// 协作式取消标志，工作器在步骤边界检查
    pub cancelled: Arc<AtomicBool>,
}

/// 作业队列协调器
///
/// 接收作业提交、维护优先级等待集、向工作器发放租约、
/// 跟踪执行阶段并在取消/卡死/终态时收敛登记表。并发上限
/// 由工作器池的大小限定：每个工作器同一时刻只执行一个作业。
pub struct JobQueueCoordinator {
    jobs: DashMap<String, JobEntry>,
    waiting: Mutex<BinaryHeap<WaitingJob>>,
    seq: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    workers_ready: AtomicBool,
    progress: Arc<dyn ProgressRepository>,
    config: QueueConfig,
}

impl JobQueueCoordinator {
    /// 创建新的协调器实例
    ///
    /// # 参数
    ///
    /// * `progress` - 进度存储
    /// * `config` - 队列配置
    pub fn new(progress: Arc<dyn ProgressRepository>, config: QueueConfig) -> Self {
        Self {
            jobs: DashMap::new(),
            waiting: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            workers_ready: AtomicBool::new(false),
            progress,
            config,
        }
    }

    /// 提交作业
    ///
    /// 按作业ID幂等：同一ID在处理中时重复提交不会产生第二次
    /// 执行。进度记录在返回前同步创建，调用方可立即轮询。
    ///
    /// # 返回值
    ///
    /// * `Ok(SubmitReceipt)` - 提交回执
    /// * `Err(QueueError)` - 参数不合法或进度存储不可用
    pub async fn submit(&self, job: Job) -> Result<SubmitReceipt, QueueError> {
        if job.id.trim().is_empty() {
            return Err(QueueError::Invalid("job id must not be empty".to_string()));
        }
        if job.input.description.trim().is_empty() {
            return Err(QueueError::Invalid(
                "description must not be empty".to_string(),
            ));
        }

        let job_id = job.id.clone();
        let priority = job.priority;

        let existing_status = match self.jobs.entry(job_id.clone()) {
            Entry::Occupied(entry) => Some(entry.get().status()),
            Entry::Vacant(slot) => {
                slot.insert(JobEntry::new(job.clone()));
                None
            }
        };

        if let Some(fallback) = existing_status {
            // 幂等去重：已知ID返回现有作业的状态
            let status = self
                .progress
                .get(&job_id)
                .await?
                .map(|r| r.status)
                .unwrap_or(fallback);
            counter!("jobs_deduplicated_total").increment(1);
            return Ok(SubmitReceipt {
                job_id,
                status,
                deduplicated: true,
            });
        }

        let record = ProgressRecord::waiting(&job);
        if let Err(e) = self.progress.put(&record).await {
            // 记录无法创建时撤销登记，提交快速失败
            self.jobs.remove(&job_id);
            return Err(e.into());
        }

        self.waiting.lock().push(WaitingJob {
            priority,
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            job_id: job_id.clone(),
        });

        counter!("jobs_submitted_total").increment(1);
        info!("Job {} enqueued with priority {}", job_id, priority);

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Waiting,
            deduplicated: false,
        })
    }

    /// 查询作业的进度记录
    pub async fn status(&self, job_id: &str) -> Result<Option<ProgressRecord>, QueueError> {
        Ok(self.progress.get(job_id).await?)
    }

    /// 取消作业
    ///
    /// 等待/延迟中的作业立即转为终态；活跃中的作业设置取消
    /// 标志，由工作器在下一个步骤边界停止。取消始终优先于
    /// 进行中的重试或卡死重排。
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 取消已生效或已登记
    /// * `Ok(false)` - 作业不存在或已处于终态
    pub async fn cancel(&self, job_id: &str) -> Result<bool, QueueError> {
        enum CancelAction {
            NotCancellable,
            Flagged,
            Finalize,
        }

        let action = match self.jobs.get_mut(job_id) {
            None => CancelAction::NotCancellable,
            Some(mut entry) => match entry.phase {
                JobPhase::Terminal => CancelAction::NotCancellable,
                JobPhase::Active => {
                    entry.cancelled.store(true, Ordering::SeqCst);
                    CancelAction::Flagged
                }
                JobPhase::Waiting | JobPhase::Delayed => {
                    entry.cancelled.store(true, Ordering::SeqCst);
                    entry.phase = JobPhase::Terminal;
                    entry.terminal_at = Some(Utc::now());
                    CancelAction::Finalize
                }
            },
        };

        match action {
            CancelAction::NotCancellable => Ok(false),
            CancelAction::Flagged => {
                info!("Job {} flagged for cancellation at next step boundary", job_id);
                Ok(true)
            }
            CancelAction::Finalize => {
                // 作业从未到达工作器，终态写入由协调器完成
                self.progress
                    .merge(job_id, ProgressUpdate::cancelled())
                    .await?;
                self.failed.fetch_add(1, Ordering::SeqCst);
                counter!("jobs_cancelled_total").increment(1);
                info!("Job {} cancelled while waiting", job_id);
                Ok(true)
            }
        }
    }

    /// 列出某用户的全部非终态作业
    pub async fn list_active(&self, user_id: Uuid) -> Result<Vec<ProgressRecord>, QueueError> {
        Ok(self
            .progress
            .list_by_user(
                user_id,
                &[JobStatus::Waiting, JobStatus::Active, JobStatus::Delayed],
            )
            .await?)
    }

    /// 只读的聚合统计视图，不阻塞作业执行
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            ..Default::default()
        };
        for entry in self.jobs.iter() {
            match entry.phase {
                JobPhase::Waiting => stats.waiting += 1,
                JobPhase::Active => stats.active += 1,
                JobPhase::Delayed => stats.delayed += 1,
                JobPhase::Terminal => {}
            }
        }
        stats
    }

    /// 健康检查视图
    pub async fn health(&self) -> QueueHealth {
        let stats = self.stats();
        QueueHealth {
            queue_reachable: self.progress.ping().await,
            worker_ready: self.workers_ready.load(Ordering::SeqCst),
            active_count: stats.active,
            waiting_count: stats.waiting,
        }
    }

    /// 工作器池启动完成后调用
    pub fn set_workers_ready(&self) {
        self.workers_ready.store(true, Ordering::SeqCst);
    }

    /// 尝试从等待集取出下一个作业并发放租约
    ///
    /// 优先级高者先出队，同优先级按到达顺序。已取消的
    /// 陈旧堆条目被跳过。
    pub fn try_acquire_next(&self) -> Option<JobLease> {
        let mut heap = self.waiting.lock();
        while let Some(candidate) = heap.pop() {
            let Some(mut entry) = self.jobs.get_mut(&candidate.job_id) else {
                continue;
            };
            if entry.phase != JobPhase::Waiting || entry.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            entry.phase = JobPhase::Active;
            entry.attempts += 1;
            entry.last_progress_at = Utc::now();
            return Some(JobLease {
                job: entry.job.clone(),
                attempt: entry.attempts,
                cancelled: entry.cancelled.clone(),
            });
        }
        None
    }

    /// 以尝试序号为栅栏合并进度更新
    ///
    /// 工作器的全部进度写入都经过此方法：仅当给定尝试仍持有
    /// 活跃租约时才写入存储并刷新卡死检测时间戳。卡死重排后
    /// 被替换的陈旧工作器的写入被整体丢弃，保证同一作业同一
    /// 时刻只有一个写者。
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(record))` - 合并后的记录
    /// * `Ok(None)` - 租约已失效或记录不存在，未写入
    pub(crate) async fn merge_for_attempt(
        &self,
        job_id: &str,
        attempt: u32,
        update: ProgressUpdate,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        let holds_lease = match self.jobs.get_mut(job_id) {
            Some(mut entry)
                if entry.attempts == attempt && entry.phase == JobPhase::Active =>
            {
                entry.last_progress_at = Utc::now();
                true
            }
            _ => false,
        };
        if !holds_lease {
            warn!(
                "Dropping progress write from stale attempt {} of job {}",
                attempt, job_id
            );
            counter!("progress_writes_fenced_total").increment(1);
            return Ok(None);
        }
        self.progress.merge(job_id, update).await
    }

    /// 将作业转为终态
    ///
    /// 仅当给定尝试序号仍持有租约时生效，避免卡死重排后
    /// 的陈旧工作器覆盖新租约的状态。
    pub(crate) fn mark_terminal(&self, job_id: &str, attempt: u32, success: bool) {
        let applied = match self.jobs.get_mut(job_id) {
            Some(mut entry)
                if entry.attempts == attempt && entry.phase == JobPhase::Active =>
            {
                entry.phase = JobPhase::Terminal;
                entry.terminal_at = Some(Utc::now());
                true
            }
            _ => false,
        };
        if applied {
            if success {
                self.completed.fetch_add(1, Ordering::SeqCst);
                counter!("jobs_completed_total").increment(1);
            } else {
                self.failed.fetch_add(1, Ordering::SeqCst);
                counter!("jobs_failed_total").increment(1);
            }
        }
    }

    /// 将作业转入延迟状态并安排退避后的重新入队
    ///
    /// 延迟期间到达的取消请求优先：重新入队前再次检查
    /// 取消标志与阶段。
    pub(crate) fn schedule_retry(self: &Arc<Self>, job_id: &str, attempt: u32, delay: Duration) {
        {
            let Some(mut entry) = self.jobs.get_mut(job_id) else {
                return;
            };
            if entry.attempts != attempt || entry.phase != JobPhase::Active {
                return;
            }
            entry.phase = JobPhase::Delayed;
        }
        counter!("jobs_retried_total").increment(1);

        let coordinator = Arc::clone(self);
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.requeue_delayed(&job_id);
        });
    }

    fn requeue_delayed(&self, job_id: &str) {
        let waiting = {
            let Some(mut entry) = self.jobs.get_mut(job_id) else {
                return;
            };
            // 取消优先于任何进行中的重试
            if entry.phase != JobPhase::Delayed || entry.cancelled.load(Ordering::SeqCst) {
                return;
            }
            entry.phase = JobPhase::Waiting;
            WaitingJob {
                priority: entry.job.priority,
                seq: self.seq.fetch_add(1, Ordering::SeqCst),
                job_id: job_id.to_string(),
            }
        };
        self.waiting.lock().push(waiting);
    }

    /// 重排卡死的作业（每个作业至多一次）
    ///
    /// # 返回值
    ///
    /// 返回被重排的作业数量
    pub fn requeue_stalled(&self) -> u64 {
        let stall =
            chrono::Duration::from_std(self.config.stall_timeout).unwrap_or(chrono::Duration::minutes(2));
        let now = Utc::now();

        let candidates: Vec<String> = self
            .jobs
            .iter()
            .filter(|e| {
                e.phase == JobPhase::Active
                    && !e.stall_requeued
                    && !e.cancelled.load(Ordering::SeqCst)
                    && now - e.last_progress_at > stall
            })
            .map(|e| e.key().clone())
            .collect();

        let mut requeued = 0;
        for job_id in candidates {
            let waiting = {
                let Some(mut entry) = self.jobs.get_mut(&job_id) else {
                    continue;
                };
                if entry.phase != JobPhase::Active || entry.cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                entry.stall_requeued = true;
                entry.phase = JobPhase::Waiting;
                entry.last_progress_at = Utc::now();
                WaitingJob {
                    priority: entry.job.priority,
                    seq: self.seq.fetch_add(1, Ordering::SeqCst),
                    job_id: job_id.clone(),
                }
            };
            warn!("Job {} made no progress, requeueing once", job_id);
            counter!("jobs_stall_requeued_total").increment(1);
            self.waiting.lock().push(waiting);
            requeued += 1;
        }
        requeued
    }

    /// 逐出超过保留时间的终态作业登记
    ///
    /// # 返回值
    ///
    /// 返回被逐出的登记数量
    pub fn evict_terminal(&self) -> u64 {
        let retention = chrono::Duration::from_std(self.config.terminal_retention)
            .unwrap_or(chrono::Duration::minutes(5));
        let now = Utc::now();
        let before = self.jobs.len();
        self.jobs.retain(|_, entry| match (entry.phase, entry.terminal_at) {
            (JobPhase::Terminal, Some(at)) => now - at < retention,
            _ => true,
        });
        (before - self.jobs.len()) as u64
    }

    /// 配置的最大尝试次数
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
