// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::progress::ProgressRecord;
use crate::queue::coordinator::QueueStats;

/// 通知严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// 推送给订阅者的出站消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// 作业进度快照，随每次进度写入推送
    Progress { record: ProgressRecord },
    /// 面向用户的提示消息
    Notice { message: String, severity: Severity },
    /// 周期性的队列聚合统计心跳
    Stats { stats: QueueStats },
}

/// 订阅者发来的入站消息
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InboundMessage {
    /// 订阅某个项目频道
    Join { project_id: Uuid },
    /// 退订某个项目频道
    Leave { project_id: Uuid },
}
