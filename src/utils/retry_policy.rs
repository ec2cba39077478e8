// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 初始退避时间
    pub base_delay: Duration,
    /// 最大退避时间
    pub max_delay: Duration,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// 单次AI调用的重试策略（较短退避）
    pub fn completion() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }

    /// 作业级重试策略（较长退避，覆盖整次执行尝试）
    pub fn job() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            jitter_factor: 0.2,
        }
    }

    /// 计算第 `attempt` 次尝试失败后的退避时间
    ///
    /// 取服务端建议的等待时间与指数退避 base × 2^(attempt-1)
    /// 中的较大者，受最大退避限制，并叠加抖动。
    ///
    /// # 参数
    ///
    /// * `attempt` - 已经失败的尝试序号（从1开始）
    /// * `server_hint` - 服务端建议的重试等待时间（可选）
    pub fn delay_for(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.as_secs_f64() * 2f64.powi(exp as i32);
        let suggested = server_hint.map(|d| d.as_secs_f64()).unwrap_or(0.0);

        let capped = backoff.max(suggested).min(self.max_delay.as_secs_f64());

        let with_jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(with_jitter)
    }

    /// 判断是否还有剩余尝试次数
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
