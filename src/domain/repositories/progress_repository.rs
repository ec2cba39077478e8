// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::progress::{JobStatus, ProgressRecord, ProgressUpdate};

/// 进度存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 存储不可达
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// 进度存储特质
///
/// TTL有界的进度记录共享存储。写入顺序保证：同一作业的
/// 写入由唯一的拥有者工作器按发出顺序应用（单写者不变式
/// 由作业队列协调器保证，存储本身不强制）。
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// 读取指定作业的进度记录
    async fn get(&self, job_id: &str) -> Result<Option<ProgressRecord>, StoreError>;

    /// 写入完整的进度记录（创建或覆盖）
    async fn put(&self, record: &ProgressRecord) -> Result<(), StoreError>;

    /// 读-改-写合并部分更新，按字段最后写入为准
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(ProgressRecord))` - 合并后的记录
    /// * `Ok(None)` - 记录不存在（已过期或从未创建）
    async fn merge(
        &self,
        job_id: &str,
        update: ProgressUpdate,
    ) -> Result<Option<ProgressRecord>, StoreError>;

    /// 按用户扫描并过滤进度记录
    ///
    /// 线性扫描实现，记录数量由TTL逐出保证有界。
    /// `statuses` 为空时返回该用户的全部记录。
    async fn list_by_user(
        &self,
        user_id: Uuid,
        statuses: &[JobStatus],
    ) -> Result<Vec<ProgressRecord>, StoreError>;

    /// 删除指定作业的进度记录
    async fn remove(&self, job_id: &str) -> Result<(), StoreError>;

    /// 逐出空闲超过TTL的记录
    ///
    /// # 返回值
    ///
    /// 返回被逐出的记录数量。具备原生TTL的后端返回0。
    async fn evict_idle(&self) -> Result<u64, StoreError>;

    /// 探测存储是否可达（用于健康检查）
    async fn ping(&self) -> bool;
}
