// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::notifications::hub::NotificationHub;
use crate::queue::coordinator::JobQueueCoordinator;

/// 统计心跳工作器
///
/// 周期性地向全部已连接的订阅者广播队列聚合统计
pub struct HeartbeatWorker {
    coordinator: Arc<JobQueueCoordinator>,
    hub: Arc<NotificationHub>,
    interval: Duration,
}

impl HeartbeatWorker {
    pub fn new(
        coordinator: Arc<JobQueueCoordinator>,
        hub: Arc<NotificationHub>,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            hub,
            interval,
        }
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Stats heartbeat worker started");
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;
                if self.hub.connection_count() > 0 {
                    self.hub.broadcast_stats(self.coordinator.stats());
                }
            }
        })
    }
}
