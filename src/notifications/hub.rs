// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use metrics::counter;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::progress::ProgressRecord;
use crate::notifications::messages::{OutboundMessage, Severity};
use crate::queue::coordinator::QueueStats;

/// 已注册连接的发送端
struct ConnectionHandle {
    user_id: Uuid,
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

/// 通知扇出中心
///
/// 维护连接与频道的映射并向订阅者推送消息。每个连接
/// 注册时自动加入其用户频道，可按项目加入/退出项目频道。
/// 投递是尽力而为的：发送失败只影响对应连接，不会阻塞
/// 作业执行，掉线的客户端通过轮询进度恢复。
pub struct NotificationHub {
    connections: DashMap<Uuid, ConnectionHandle>,
    channels: DashMap<String, HashSet<Uuid>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            channels: DashMap::new(),
        }
    }

    fn user_channel(user_id: Uuid) -> String {
        format!("user:{}", user_id)
    }

    fn project_channel(project_id: Uuid) -> String {
        format!("project:{}", project_id)
    }

    /// 注册新连接
    ///
    /// # 参数
    ///
    /// * `user_id` - 已认证的用户ID
    ///
    /// # 返回值
    ///
    /// 返回连接ID与出站消息接收端
    pub fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<OutboundMessage>) {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections
            .insert(connection_id, ConnectionHandle { user_id, sender });
        self.channels
            .entry(Self::user_channel(user_id))
            .or_default()
            .insert(connection_id);

        counter!("notification_connections_total").increment(1);
        debug!("Connection {} registered for user {}", connection_id, user_id);
        (connection_id, receiver)
    }

    /// 注销连接并清理其全部频道订阅
    pub fn unregister(&self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
        self.channels.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
        debug!("Connection {} unregistered", connection_id);
    }

    /// 将连接加入项目频道
    pub fn join_project(&self, connection_id: Uuid, project_id: Uuid) {
        if !self.connections.contains_key(&connection_id) {
            return;
        }
        self.channels
            .entry(Self::project_channel(project_id))
            .or_default()
            .insert(connection_id);
    }

    /// 将连接移出项目频道
    pub fn leave_project(&self, connection_id: Uuid, project_id: Uuid) {
        let channel = Self::project_channel(project_id);
        if let Some(mut members) = self.channels.get_mut(&channel) {
            members.remove(&connection_id);
        }
    }

    /// 向作业的用户频道与项目频道推送进度快照
    ///
    /// 同时订阅两个频道的连接只收到一次。
    pub fn emit_progress(&self, record: &ProgressRecord) {
        let mut targets: HashSet<Uuid> = HashSet::new();
        for channel in [
            Self::user_channel(record.user_id),
            Self::project_channel(record.project_id),
        ] {
            if let Some(members) = self.channels.get(&channel) {
                targets.extend(members.iter());
            }
        }
        if targets.is_empty() {
            return;
        }

        let message = OutboundMessage::Progress {
            record: record.clone(),
        };
        self.send_to(&targets, &message);
        counter!("notifications_progress_total").increment(1);
    }

    /// 向某用户的全部连接发送提示消息
    pub fn notify_user(&self, user_id: Uuid, message: String, severity: Severity) {
        let Some(members) = self
            .channels
            .get(&Self::user_channel(user_id))
            .map(|m| m.clone())
        else {
            return;
        };
        self.send_to(&members, &OutboundMessage::Notice { message, severity });
    }

    /// 向全部连接广播队列统计心跳
    pub fn broadcast_stats(&self, stats: QueueStats) {
        let message = OutboundMessage::Stats { stats };
        for entry in self.connections.iter() {
            let _ = entry.sender.send(message.clone());
        }
    }

    /// 当前连接数
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn send_to(&self, targets: &HashSet<Uuid>, message: &OutboundMessage) {
        for connection_id in targets {
            if let Some(handle) = self.connections.get(connection_id) {
                // 尽力而为：接收端已关闭时忽略
                let _ = handle.sender.send(message.clone());
            }
        }
    }
}
