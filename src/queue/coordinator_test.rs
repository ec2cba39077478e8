use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::domain::models::job::{Job, JobInput};
use crate::domain::models::progress::{JobStatus, ProgressUpdate};
use crate::domain::repositories::progress_repository::ProgressRepository;
use crate::infrastructure::repositories::memory_progress_repo::MemoryProgressRepo;
use crate::queue::coordinator::{JobQueueCoordinator, QueueConfig, QueueError};

fn job_with(id: &str, priority: i32) -> Job {
    Job::new(
        id.to_string(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        JobInput {
            description: "AI chatbot for support tickets".to_string(),
            target_audience: "mid-market SaaS companies".to_string(),
            problem_statement: "support teams are overwhelmed".to_string(),
            ..Default::default()
        },
        priority,
    )
}

fn coordinator() -> Arc<JobQueueCoordinator> {
    Arc::new(JobQueueCoordinator::new(
        Arc::new(MemoryProgressRepo::new(Duration::from_secs(3600))),
        QueueConfig::default(),
    ))
}

#[tokio::test]
async fn test_submit_creates_waiting_record_synchronously() {
    let coordinator = coordinator();
    let receipt = coordinator.submit(job_with("job-1", 0)).await.unwrap();

    assert_eq!(receipt.job_id, "job-1");
    assert_eq!(receipt.status, JobStatus::Waiting);
    assert!(!receipt.deduplicated);

    // 回执返回后进度记录立即可轮询
    let record = coordinator.status("job-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Waiting);
    assert_eq!(record.percent, 0);
}

#[tokio::test]
async fn test_submit_is_idempotent_on_job_id() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();

    let receipt = coordinator.submit(job_with("job-1", 9)).await.unwrap();
    assert!(receipt.deduplicated);
    assert_eq!(receipt.status, JobStatus::Waiting);

    // 等待集中只有一份，取完即空
    assert!(coordinator.try_acquire_next().is_some());
    assert!(coordinator.try_acquire_next().is_none());
}

#[tokio::test]
async fn test_submit_rejects_blank_input() {
    let coordinator = coordinator();

    let mut job = job_with("", 0);
    job.id = "  ".to_string();
    assert!(matches!(
        coordinator.submit(job).await,
        Err(QueueError::Invalid(_))
    ));

    let mut job = job_with("job-1", 0);
    job.input.description = String::new();
    assert!(matches!(
        coordinator.submit(job).await,
        Err(QueueError::Invalid(_))
    ));
}

#[tokio::test]
async fn test_acquire_orders_by_priority_then_arrival() {
    let coordinator = coordinator();
    coordinator.submit(job_with("low", 1)).await.unwrap();
    coordinator.submit(job_with("first-high", 5)).await.unwrap();
    coordinator.submit(job_with("second-high", 5)).await.unwrap();

    let order: Vec<String> = (0..3)
        .map(|_| coordinator.try_acquire_next().unwrap().job.id)
        .collect();
    assert_eq!(order, vec!["first-high", "second-high", "low"]);
}

#[tokio::test]
async fn test_lease_attempts_increment() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();

    let lease = coordinator.try_acquire_next().unwrap();
    assert_eq!(lease.attempt, 1);

    coordinator.schedule_retry("job-1", 1, Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(30)).await;

    let lease = coordinator.try_acquire_next().unwrap();
    assert_eq!(lease.attempt, 2);
}

#[tokio::test]
async fn test_cancel_waiting_job_finalizes_immediately() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();

    assert!(coordinator.cancel("job-1").await.unwrap());

    let record = coordinator.status("job-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("Cancelled by user"));

    // 已取消的堆条目不会被发放
    assert!(coordinator.try_acquire_next().is_none());
}

#[tokio::test]
async fn test_cancel_active_job_sets_flag_only() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    let lease = coordinator.try_acquire_next().unwrap();

    assert!(coordinator.cancel("job-1").await.unwrap());
    assert!(lease.cancelled.load(std::sync::atomic::Ordering::SeqCst));

    // 活跃作业的终态写入留给持有租约的工作器
    let record = coordinator.status("job-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Waiting);
}

#[tokio::test]
async fn test_cancel_terminal_or_unknown_returns_false() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.try_acquire_next().unwrap();
    coordinator.mark_terminal("job-1", 1, true);

    assert!(!coordinator.cancel("job-1").await.unwrap());
    assert!(!coordinator.cancel("never-seen").await.unwrap());
}

#[tokio::test]
async fn test_cancel_wins_over_pending_retry() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.try_acquire_next().unwrap();

    coordinator.schedule_retry("job-1", 1, Duration::from_millis(20));
    assert!(coordinator.cancel("job-1").await.unwrap());

    tokio::time::sleep(Duration::from_millis(60)).await;
    // 延迟到期后作业不会回到等待集
    assert!(coordinator.try_acquire_next().is_none());
    let record = coordinator.status("job-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_stale_worker_cannot_overwrite_new_lease() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.try_acquire_next().unwrap();

    coordinator.schedule_retry("job-1", 1, Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(30)).await;
    let lease = coordinator.try_acquire_next().unwrap();
    assert_eq!(lease.attempt, 2);

    // 第一次尝试的陈旧终态调用被尝试序号守卫拒绝
    coordinator.mark_terminal("job-1", 1, false);
    assert_eq!(coordinator.stats().active, 1);
}

#[tokio::test]
async fn test_merge_rejected_after_lease_replaced() {
    let coordinator = Arc::new(JobQueueCoordinator::new(
        Arc::new(MemoryProgressRepo::new(Duration::from_secs(3600))),
        QueueConfig {
            stall_timeout: Duration::from_millis(0),
            ..Default::default()
        },
    ));
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.try_acquire_next().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(coordinator.requeue_stalled(), 1);
    let lease = coordinator.try_acquire_next().unwrap();
    assert_eq!(lease.attempt, 2);

    // 第一次尝试的写入被租约栅栏整体丢弃，记录保持不变
    let fenced = coordinator
        .merge_for_attempt(
            "job-1",
            1,
            ProgressUpdate {
                status: Some(JobStatus::Completed),
                percent: Some(100),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(fenced.is_none());
    let record = coordinator.status("job-1").await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Waiting);
    assert_eq!(record.percent, 0);

    // 持有当前租约的写入正常应用
    let applied = coordinator
        .merge_for_attempt(
            "job-1",
            2,
            ProgressUpdate {
                status: Some(JobStatus::Active),
                percent: Some(15),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(applied.unwrap().percent, 15);
}

#[tokio::test]
async fn test_stats_reflect_phases_and_totals() {
    let coordinator = coordinator();
    coordinator.submit(job_with("a", 0)).await.unwrap();
    coordinator.submit(job_with("b", 0)).await.unwrap();
    coordinator.submit(job_with("c", 0)).await.unwrap();

    coordinator.try_acquire_next().unwrap();
    let stats = coordinator.stats();
    assert_eq!(stats.active, 1);
    assert_eq!(stats.waiting, 2);

    coordinator.mark_terminal("a", 1, true);
    let stats = coordinator.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_stalled_job_requeued_at_most_once() {
    let coordinator = Arc::new(JobQueueCoordinator::new(
        Arc::new(MemoryProgressRepo::new(Duration::from_secs(3600))),
        QueueConfig {
            stall_timeout: Duration::from_millis(0),
            ..Default::default()
        },
    ));
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.try_acquire_next().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(coordinator.requeue_stalled(), 1);

    // 第二次卡死不再重排
    coordinator.try_acquire_next().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(coordinator.requeue_stalled(), 0);
}

#[tokio::test]
async fn test_list_active_excludes_terminal_jobs() {
    let repo = Arc::new(MemoryProgressRepo::new(Duration::from_secs(3600)));
    let coordinator = Arc::new(JobQueueCoordinator::new(
        repo.clone(),
        QueueConfig::default(),
    ));
    let user = Uuid::new_v4();

    let mut job = job_with("done", 0);
    job.user_id = user;
    coordinator.submit(job).await.unwrap();

    let mut job = job_with("running", 0);
    job.user_id = user;
    coordinator.submit(job).await.unwrap();

    // 模拟工作器写入的终态记录
    repo.merge(
        "done",
        crate::domain::models::progress::ProgressUpdate {
            status: Some(JobStatus::Completed),
            percent: Some(100),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let active = coordinator.list_active(user).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_id, "running");
}

#[tokio::test]
async fn test_evict_terminal_respects_retention() {
    let coordinator = Arc::new(JobQueueCoordinator::new(
        Arc::new(MemoryProgressRepo::new(Duration::from_secs(3600))),
        QueueConfig {
            terminal_retention: Duration::from_millis(0),
            ..Default::default()
        },
    ));
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.try_acquire_next().unwrap();
    coordinator.mark_terminal("job-1", 1, true);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(coordinator.evict_terminal(), 1);

    // 登记逐出后同ID可重新提交
    let receipt = coordinator.submit(job_with("job-1", 0)).await.unwrap();
    assert!(!receipt.deduplicated);
}

#[tokio::test]
async fn test_health_reports_counts() {
    let coordinator = coordinator();
    coordinator.submit(job_with("job-1", 0)).await.unwrap();
    coordinator.set_workers_ready();

    let health = coordinator.health().await;
    assert!(health.queue_reachable);
    assert!(health.worker_ready);
    assert_eq!(health.waiting_count, 1);
    assert_eq!(health.active_count, 0);
}
