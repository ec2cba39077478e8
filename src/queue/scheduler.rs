// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

use crate::queue::coordinator::JobQueueCoordinator;

/// 队列维护调度器
///
/// 周期性扫描协调器登记表：重排卡死的作业、逐出过期的
/// 终态登记。实际的作业分发由工作器通过 `try_acquire_next`
/// 主动拉取。
pub struct QueueScheduler {
    coordinator: Arc<JobQueueCoordinator>,
    tick: Duration,
}

impl QueueScheduler {
    /// 创建新的调度器实例
    ///
    /// # 参数
    ///
    /// * `coordinator` - 队列协调器
    /// * `tick` - 维护周期
    pub fn new(coordinator: Arc<JobQueueCoordinator>, tick: Duration) -> Self {
        Self { coordinator, tick }
    }

    /// 启动调度器后台任务
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(&self) -> JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        let tick = self.tick;

        tokio::spawn(async move {
            let mut interval = interval(tick);

            loop {
                interval.tick().await;

                let requeued = coordinator.requeue_stalled();
                if requeued > 0 {
                    info!("Requeued {} stalled jobs", requeued);
                }

                let evicted = coordinator.evict_terminal();
                if evicted > 0 {
                    info!("Evicted {} terminal job entries", evicted);
                }
            }
        })
    }
}
