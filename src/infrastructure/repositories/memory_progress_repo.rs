// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::models::progress::{JobStatus, ProgressRecord, ProgressUpdate};
use crate::domain::repositories::progress_repository::{ProgressRepository, StoreError};

/// 带最后访问时间的存储条目
struct StoredRecord {
    record: ProgressRecord,
    last_write: Instant,
}

/// 内存进度存储实现
///
/// 单进程部署的默认后端。记录在最后一次写入之后空闲
/// 超过TTL时由过期工作器调用 `evict_idle` 逐出。
pub struct MemoryProgressRepo {
    records: DashMap<String, StoredRecord>,
    ttl: Duration,
}

impl MemoryProgressRepo {
    /// 创建新的内存进度存储实例
    ///
    /// # 参数
    ///
    /// * `ttl` - 记录的空闲过期时间
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            ttl,
        }
    }

    /// 当前保存的记录数量
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ProgressRepository for MemoryProgressRepo {
    async fn get(&self, job_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self.records.get(job_id).map(|e| e.record.clone()))
    }

    async fn put(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        self.records.insert(
            record.job_id.clone(),
            StoredRecord {
                record: record.clone(),
                last_write: Instant::now(),
            },
        );
        Ok(())
    }

    async fn merge(
        &self,
        job_id: &str,
        update: ProgressUpdate,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        match self.records.get_mut(job_id) {
            Some(mut entry) => {
                update.apply(&mut entry.record);
                entry.last_write = Instant::now();
                Ok(Some(entry.record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        statuses: &[JobStatus],
    ) -> Result<Vec<ProgressRecord>, StoreError> {
        let mut records: Vec<ProgressRecord> = self
            .records
            .iter()
            .filter(|e| {
                e.record.user_id == user_id
                    && (statuses.is_empty() || statuses.contains(&e.record.status))
            })
            .map(|e| e.record.clone())
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn remove(&self, job_id: &str) -> Result<(), StoreError> {
        self.records.remove(job_id);
        Ok(())
    }

    async fn evict_idle(&self) -> Result<u64, StoreError> {
        let ttl = self.ttl;
        let before = self.records.len();
        self.records
            .retain(|_, entry| entry.last_write.elapsed() < ttl);
        Ok((before - self.records.len()) as u64)
    }

    async fn ping(&self) -> bool {
        true
    }
}
