// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::domain::repositories::progress_repository::ProgressRepository;
use crate::notifications::hub::NotificationHub;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::queue::coordinator::JobQueueCoordinator;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::pipeline_worker::PipelineWorker;

/// 工作管理器
///
/// 启动固定数量的管道工作器。每个工作器同一时刻执行
/// 一个作业，工作器数量即队列的并发上限。
pub struct WorkerManager {
    coordinator: Arc<JobQueueCoordinator>,
    orchestrator: Arc<PipelineOrchestrator>,
    progress: Arc<dyn ProgressRepository>,
    hub: Arc<NotificationHub>,
    retry: RetryPolicy,
    job_timeout: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(
        coordinator: Arc<JobQueueCoordinator>,
        orchestrator: Arc<PipelineOrchestrator>,
        progress: Arc<dyn ProgressRepository>,
        hub: Arc<NotificationHub>,
        retry: RetryPolicy,
        job_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            orchestrator,
            progress,
            hub,
            retry,
            job_timeout,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 创建并启动指定数量的工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub async fn start_workers(&mut self, count: usize) {
        for worker_id in 0..count {
            let worker = PipelineWorker::new(
                self.coordinator.clone(),
                self.orchestrator.clone(),
                self.progress.clone(),
                self.hub.clone(),
                self.retry.clone(),
                self.job_timeout,
                worker_id,
            );

            let handle = tokio::spawn(async move {
                worker.run().await;
            });
            self.handles.push(handle);
        }
        self.coordinator.set_workers_ready();
        info!("Started {} pipeline workers", count);
    }

    /// 等待关闭信号并关闭工作进程
    ///
    /// 监听关闭信号并优雅地关闭所有工作进程
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        info!("Shutting down workers...");
        for handle in &self.handles {
            handle.abort();
        }

        info!("Workers shut down successfully");
    }
}
