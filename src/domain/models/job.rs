// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 作业实体
///
/// 表示一次用户提交的AI分析请求。作业以调用方提供的
/// 唯一标识符（幂等键）标识，入队后不可变，同一时刻
/// 最多被一个工作器处理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 作业唯一标识符（调用方提供的幂等键）
    pub id: String,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 输入负载，管道各步骤的原始素材
    pub input: JobInput,
    /// 数值优先级，数值越大在等待集中越先出队
    pub priority: i32,
    /// 提交时间
    pub submitted_at: DateTime<Utc>,
}

/// 作业输入负载
///
/// 描述一个产品想法的原始素材，由提交API校验后原样传入管道。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    /// 想法描述
    pub description: String,
    /// 目标受众
    pub target_audience: String,
    /// 要解决的问题
    pub problem_statement: String,
    /// 用户偏好的功能列表（可选）
    #[serde(default)]
    pub preferred_features: Vec<String>,
    /// 用户偏好的技术列表（可选）
    #[serde(default)]
    pub preferred_tech: Vec<String>,
}

impl Job {
    /// 创建一个新的作业
    ///
    /// # 参数
    ///
    /// * `id` - 调用方提供的幂等键
    /// * `user_id` - 所属用户ID
    /// * `project_id` - 所属项目ID
    /// * `input` - 输入负载
    /// * `priority` - 数值优先级
    ///
    /// # 返回值
    ///
    /// 返回新创建的作业实例
    pub fn new(id: String, user_id: Uuid, project_id: Uuid, input: JobInput, priority: i32) -> Self {
        Self {
            id,
            user_id,
            project_id,
            input,
            priority,
            submitted_at: Utc::now(),
        }
    }
}
