// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::progress::{JobStatus, ProgressRecord, ProgressUpdate};
use crate::domain::repositories::progress_repository::{ProgressRepository, StoreError};
use crate::infrastructure::cache::redis_client::RedisClient;

/// Redis进度存储实现
///
/// 多进程部署时的共享后端。记录以JSON存储，每次写入
/// 刷新TTL，空闲逐出交由Redis原生过期完成。
///
/// 读-改-写合并不加分布式锁：单写者不变式由作业队列
/// 协调器保证。
pub struct RedisProgressRepo {
    redis: RedisClient,
    key_prefix: String,
    ttl_seconds: usize,
}

impl RedisProgressRepo {
    /// 创建新的Redis进度存储实例
    ///
    /// # 参数
    ///
    /// * `redis` - Redis客户端
    /// * `ttl_seconds` - 记录的空闲过期时间（秒）
    pub fn new(redis: RedisClient, ttl_seconds: usize) -> Self {
        Self {
            redis,
            key_prefix: "ideaforge:progress:".to_string(),
            ttl_seconds,
        }
    }

    fn key(&self, job_id: &str) -> String {
        format!("{}{}", self.key_prefix, job_id)
    }

    fn encode(record: &ProgressRecord) -> Result<String, StoreError> {
        serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(raw: &str) -> Result<ProgressRecord, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ProgressRepository for RedisProgressRepo {
    async fn get(&self, job_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        let raw = self
            .redis
            .get(&self.key(job_id))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        raw.as_deref().map(Self::decode).transpose()
    }

    async fn put(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        let encoded = Self::encode(record)?;
        self.redis
            .set(&self.key(&record.job_id), &encoded, self.ttl_seconds)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn merge(
        &self,
        job_id: &str,
        update: ProgressUpdate,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        let Some(mut record) = self.get(job_id).await? else {
            return Ok(None);
        };
        update.apply(&mut record);
        self.put(&record).await?;
        Ok(Some(record))
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        statuses: &[JobStatus],
    ) -> Result<Vec<ProgressRecord>, StoreError> {
        let keys = self
            .redis
            .keys(&format!("{}*", self.key_prefix))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut records = Vec::new();
        for key in keys {
            let raw = self
                .redis
                .get(&key)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            // 扫描期间键可能已过期
            let Some(raw) = raw else { continue };
            let record = Self::decode(&raw)?;
            if record.user_id == user_id
                && (statuses.is_empty() || statuses.contains(&record.status))
            {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    async fn remove(&self, job_id: &str) -> Result<(), StoreError> {
        self.redis
            .del(&self.key(job_id))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn evict_idle(&self) -> Result<u64, StoreError> {
        // Redis原生TTL负责逐出
        Ok(0)
    }

    async fn ping(&self) -> bool {
        self.redis.ping().await
    }
}
