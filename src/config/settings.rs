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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含服务器、AI、预算、队列、进度存储、通知与认证等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// AI补全配置
    pub ai: AiSettings,
    /// 预算守卫配置
    pub budget: BudgetSettings,
    /// 队列配置
    pub queue: QueueSettings,
    /// 进度存储配置
    pub progress: ProgressSettings,
    /// 通知配置
    pub notifications: NotificationSettings,
    /// 认证配置
    pub auth: AuthSettings,
    /// Redis配置（progress.backend = "redis" 时必填）
    pub redis: Option<RedisSettings>,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// AI补全配置设置
#[derive(Debug, Deserialize)]
pub struct AiSettings {
    /// API密钥
    pub api_key: String,
    /// API基础地址
    pub api_base_url: String,
    /// 使用的模型名称
    pub model: String,
    /// 每步骤的最大生成令牌数
    pub max_tokens: u32,
    /// 采样温度
    pub temperature: f32,
    /// 单次请求超时时间（秒）
    pub request_timeout_secs: u64,
}

/// 预算守卫配置设置
#[derive(Debug, Deserialize)]
pub struct BudgetSettings {
    /// 每分钟最大请求数
    pub max_requests_per_minute: u32,
    /// 每分钟最大令牌数
    pub max_tokens_per_minute: u64,
    /// 每日花费上限（美元）
    pub daily_cost_ceiling: f64,
    /// 接近上限的告警阈值（0.0-1.0）
    pub warn_fraction: f64,
}

/// 队列配置设置
#[derive(Debug, Deserialize)]
pub struct QueueSettings {
    /// 工作器数量（即并发上限）
    pub worker_count: usize,
    /// 每个作业的最大执行尝试次数
    pub max_attempts: u32,
    /// 无进度视为卡死的时间（秒）
    pub stall_timeout_secs: u64,
    /// 单次尝试的硬超时（秒）
    pub job_timeout_secs: u64,
    /// 终态作业登记的保留时间（秒）
    pub terminal_retention_secs: u64,
    /// 维护调度周期（秒）
    pub maintenance_interval_secs: u64,
}

/// 进度存储配置设置
#[derive(Debug, Deserialize)]
pub struct ProgressSettings {
    /// 存储后端 (memory, redis)
    pub backend: String,
    /// 记录的空闲过期时间（秒）
    pub ttl_secs: u64,
    /// 过期清理周期（秒）
    pub eviction_interval_secs: u64,
}

/// 通知配置设置
#[derive(Debug, Deserialize)]
pub struct NotificationSettings {
    /// 统计心跳广播周期（秒）
    pub heartbeat_secs: u64,
}

/// 认证配置设置
#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// 逗号分隔的 `token=user_uuid` 映射
    pub tokens: String,
}

/// Redis配置设置
#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default AI settings
            .set_default("ai.api_key", "")?
            .set_default("ai.api_base_url", "https://api.openai.com/v1")?
            .set_default("ai.model", "gpt-4o-mini")?
            .set_default("ai.max_tokens", 2048)?
            .set_default("ai.temperature", 0.7)?
            .set_default("ai.request_timeout_secs", 60)?
            // Default Budget settings
            .set_default("budget.max_requests_per_minute", 20)?
            .set_default("budget.max_tokens_per_minute", 40000)?
            .set_default("budget.daily_cost_ceiling", 5.0)?
            .set_default("budget.warn_fraction", 0.8)?
            // Default Queue settings
            .set_default("queue.worker_count", 4)?
            .set_default("queue.max_attempts", 3)?
            .set_default("queue.stall_timeout_secs", 300)?
            .set_default("queue.job_timeout_secs", 600)?
            .set_default("queue.terminal_retention_secs", 300)?
            .set_default("queue.maintenance_interval_secs", 30)?
            // Default Progress settings
            .set_default("progress.backend", "memory")?
            .set_default("progress.ttl_secs", 86400)?
            .set_default("progress.eviction_interval_secs", 3600)?
            // Default Notification settings
            .set_default("notifications.heartbeat_secs", 10)?
            // Default Auth settings
            .set_default("auth.tokens", "")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("IDEAFORGE").separator("__"));

        builder.build()?.try_deserialize()
    }
}
