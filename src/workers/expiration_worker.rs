use crate::domain::repositories::progress_repository::ProgressRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 进度记录过期清理工作器
///
/// 定期逐出超过TTL未被写入的进度记录
pub struct ExpirationWorker {
    progress: Arc<dyn ProgressRepository>,
    interval: Duration,
}

impl ExpirationWorker {
    pub fn new(progress: Arc<dyn ProgressRepository>, interval: Duration) -> Self {
        Self { progress, interval }
    }

    /// 运行工作器
    pub async fn run(&self) {
        info!("Progress expiration worker started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            match self.progress.evict_idle().await {
                Ok(count) => {
                    if count > 0 {
                        info!("Evicted {} idle progress records", count);
                    }
                }
                Err(e) => {
                    error!("Failed to evict idle progress records: {}", e);
                }
            }
        }
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::job::{Job, JobInput};
    use crate::domain::models::progress::ProgressRecord;
    use crate::infrastructure::repositories::memory_progress_repo::MemoryProgressRepo;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_worker_evicts_idle_records() {
        let repo = Arc::new(MemoryProgressRepo::new(Duration::from_millis(10)));
        let job = Job::new(
            "job-1".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            JobInput::default(),
            0,
        );
        repo.put(&ProgressRecord::waiting(&job)).await.unwrap();

        let worker = ExpirationWorker::new(repo.clone(), Duration::from_millis(20));
        let handle = worker.start();

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.abort();

        assert!(repo.get("job-1").await.unwrap().is_none());
    }
}
