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

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::job::{Job, JobInput};

/// 作业提交请求数据传输对象
///
/// 封装客户端发起的创意分析作业请求。`job_id` 是调用方
/// 提供的幂等键，同一ID在处理中时重复提交不会重复执行。
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequestDto {
    /// 作业ID（幂等键）
    #[validate(length(min = 1, max = 128, message = "jobId must be 1-128 characters"))]
    pub job_id: String,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 创意描述
    #[validate(length(min = 1, max = 10000, message = "description cannot be empty"))]
    pub description: String,
    /// 目标受众
    #[serde(default)]
    pub target_audience: String,
    /// 要解决的问题
    #[serde(default)]
    pub problem_statement: String,
    /// 期望的功能列表
    #[serde(default)]
    pub preferred_features: Vec<String>,
    /// 期望的技术栈
    #[serde(default)]
    pub preferred_tech: Vec<String>,
    /// 调度优先级，数值越大越先执行
    #[serde(default)]
    pub priority: i32,
}

impl SubmitJobRequestDto {
    /// 结合已认证的用户ID构建领域作业
    pub fn into_job(self, user_id: Uuid) -> Job {
        Job::new(
            self.job_id,
            user_id,
            self.project_id,
            JobInput {
                description: self.description,
                target_audience: self.target_audience,
                problem_statement: self.problem_statement,
                preferred_features: self.preferred_features,
                preferred_tech: self.preferred_tech,
            },
            self.priority,
        )
    }
}
