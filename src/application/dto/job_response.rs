// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;

use crate::domain::models::progress::ProgressRecord;
use crate::queue::coordinator::SubmitReceipt;

/// 作业提交响应数据传输对象
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponseDto {
    pub job_id: String,
    pub status: String,
    pub deduplicated: bool,
}

impl From<SubmitReceipt> for SubmitJobResponseDto {
    fn from(receipt: SubmitReceipt) -> Self {
        Self {
            job_id: receipt.job_id,
            status: receipt.status.to_string(),
            deduplicated: receipt.deduplicated,
        }
    }
}

/// 作业列表响应数据传输对象
#[derive(Debug, Serialize)]
pub struct JobListResponseDto {
    pub jobs: Vec<ProgressRecord>,
    pub count: usize,
}

impl From<Vec<ProgressRecord>> for JobListResponseDto {
    fn from(jobs: Vec<ProgressRecord>) -> Self {
        let count = jobs.len();
        Self { jobs, count }
    }
}
