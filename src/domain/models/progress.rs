// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::job::Job;
use crate::pipeline::steps::TOTAL_STEPS;

/// 作业状态枚举
///
/// 表示作业在其生命周期中的不同状态。
/// 状态转换遵循以下流程：
/// Waiting → Active → Completed/Failed，重试时经过 Delayed 回到 Active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 等待中，作业已入队但尚未被工作器取走
    #[default]
    Waiting,
    /// 活跃中，作业正在被某个工作器执行
    Active,
    /// 已完成，全部步骤成功执行
    Completed,
    /// 已失败，终态（含用户取消）
    Failed,
    /// 延迟中，等待下一次重试
    Delayed,
    /// 已暂停
    Paused,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Delayed => write!(f, "delayed"),
            JobStatus::Paused => write!(f, "paused"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "active" => Ok(JobStatus::Active),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "delayed" => Ok(JobStatus::Delayed),
            "paused" => Ok(JobStatus::Paused),
            _ => Err(()),
        }
    }
}

impl JobStatus {
    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// 进度指标块
///
/// 记录作业执行过程中累计的度量信息。AI花费与令牌数
/// 跨重试累计，已完成步骤列表在每次尝试开始时重置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMetrics {
    /// 本次尝试中已完成步骤名称的有序列表
    pub steps_completed: Vec<String>,
    /// 总步骤数，固定为7
    pub total_steps: u32,
    /// 累计AI花费（美元）
    pub total_cost: f64,
    /// 累计消耗令牌数
    pub total_tokens: u64,
    /// 已消耗的处理时间（毫秒）
    pub processing_ms: u64,
}

impl Default for ProgressMetrics {
    fn default() -> Self {
        Self {
            steps_completed: Vec::new(),
            total_steps: TOTAL_STEPS,
            total_cost: 0.0,
            total_tokens: 0,
            processing_ms: 0,
        }
    }
}

/// 进度记录
///
/// 以作业ID为键的可变状态/指标快照，由提交API轮询读取、
/// 拥有该作业的工作器独占写入、通知层只读观察。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// 作业ID
    pub job_id: String,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 当前状态
    pub status: JobStatus,
    /// 完成百分比（0-100），单次尝试内单调不减
    pub percent: u8,
    /// 当前步骤的人类可读标签
    pub current_step: String,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间（终态时设置）
    pub finished_at: Option<DateTime<Utc>>,
    /// 错误信息（失败时设置）
    pub error: Option<String>,
    /// 进度指标块
    pub metrics: ProgressMetrics,
    /// 聚合结果负载（成功时设置）
    pub result: Option<serde_json::Value>,
    /// 最后写入时间
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// 为刚入队的作业创建初始进度记录
    ///
    /// 记录以 `waiting`/0% 状态同步创建，提交调用返回前即可被轮询。
    pub fn waiting(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id,
            project_id: job.project_id,
            status: JobStatus::Waiting,
            percent: 0,
            current_step: "Queued".to_string(),
            started_at: None,
            finished_at: None,
            error: None,
            metrics: ProgressMetrics::default(),
            result: None,
            updated_at: Utc::now(),
        }
    }
}

/// 进度记录的部分更新
///
/// 读-改-写合并语义：每个字段按最后写入为准，
/// 未出现在更新中的字段保持原值。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: Option<JobStatus>,
    pub percent: Option<u8>,
    pub current_step: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub metrics: Option<ProgressMetrics>,
    pub result: Option<serde_json::Value>,
    /// 为 true 时清除已有的错误信息（重试开始时使用）
    #[serde(default)]
    pub clear_error: bool,
}

impl ProgressUpdate {
    /// 将部分更新应用到现有记录上
    pub fn apply(self, record: &mut ProgressRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(percent) = self.percent {
            record.percent = percent;
        }
        if let Some(step) = self.current_step {
            record.current_step = step;
        }
        if let Some(started_at) = self.started_at {
            record.started_at = Some(started_at);
        }
        if let Some(finished_at) = self.finished_at {
            record.finished_at = Some(finished_at);
        }
        if self.clear_error {
            record.error = None;
        }
        if let Some(error) = self.error {
            record.error = Some(error);
        }
        if let Some(metrics) = self.metrics {
            record.metrics = metrics;
        }
        if let Some(result) = self.result {
            record.result = Some(result);
        }
        record.updated_at = Utc::now();
    }

    /// 构造用户取消的终态更新
    ///
    /// 取消的错误信息与AI失败可区分。
    pub fn cancelled() -> Self {
        Self {
            status: Some(JobStatus::Failed),
            percent: Some(0),
            current_step: Some("Cancelled".to_string()),
            finished_at: Some(Utc::now()),
            error: Some("Cancelled by user".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::job::JobInput;

    fn sample_job() -> Job {
        Job::new(
            "job-1".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            JobInput {
                description: "AI chatbot for support tickets".to_string(),
                target_audience: "mid-market SaaS companies".to_string(),
                problem_statement: "support teams are overwhelmed".to_string(),
                ..Default::default()
            },
            5,
        )
    }

    #[test]
    fn test_waiting_record_initial_state() {
        let job = sample_job();
        let record = ProgressRecord::waiting(&job);

        assert_eq!(record.job_id, "job-1");
        assert_eq!(record.status, JobStatus::Waiting);
        assert_eq!(record.percent, 0);
        assert_eq!(record.metrics.total_steps, TOTAL_STEPS);
        assert!(record.metrics.steps_completed.is_empty());
        assert!(record.error.is_none());
        assert!(record.result.is_none());
    }

    #[test]
    fn test_partial_update_preserves_absent_fields() {
        let job = sample_job();
        let mut record = ProgressRecord::waiting(&job);
        record.current_step = "Generating business analysis".to_string();

        ProgressUpdate {
            percent: Some(30),
            ..Default::default()
        }
        .apply(&mut record);

        assert_eq!(record.percent, 30);
        assert_eq!(record.current_step, "Generating business analysis");
        assert_eq!(record.status, JobStatus::Waiting);
    }

    #[test]
    fn test_clear_error_on_retry() {
        let job = sample_job();
        let mut record = ProgressRecord::waiting(&job);
        record.error = Some("Network error: connection reset".to_string());

        ProgressUpdate {
            status: Some(JobStatus::Active),
            clear_error: true,
            ..Default::default()
        }
        .apply(&mut record);

        assert!(record.error.is_none());
        assert_eq!(record.status, JobStatus::Active);
    }

    #[test]
    fn test_cancelled_update_is_distinguishable() {
        let job = sample_job();
        let mut record = ProgressRecord::waiting(&job);

        ProgressUpdate::cancelled().apply(&mut record);

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.percent, 0);
        assert_eq!(record.error.as_deref(), Some("Cancelled by user"));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Waiting,
            JobStatus::Active,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Delayed,
            JobStatus::Paused,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
    }
}
