// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, Utc};
use metrics::counter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::warn;

/// 预算守卫配置
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// 每分钟最大请求数
    pub max_requests_per_minute: u32,
    /// 每分钟最大令牌数
    pub max_tokens_per_minute: u64,
    /// 日花费上限（美元）
    pub daily_cost_ceiling: f64,
    /// 告警阈值占上限的比例（0.0-1.0）
    pub warn_fraction: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 20,
            max_tokens_per_minute: 40_000,
            daily_cost_ceiling: 5.0,
            warn_fraction: 0.8,
        }
    }
}

/// 滑动窗口中的一次调用记录
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    at: DateTime<Utc>,
    tokens: u64,
}

/// 守卫内部可变状态，整体处于一把锁之下
///
/// 门禁检查与事后记账都在锁内完成，避免二者之间的竞争。
#[derive(Debug)]
struct BudgetState {
    /// 最近一分钟的调用时间戳与令牌数
    window: VecDeque<WindowEntry>,
    /// 窗口内令牌总数
    window_tokens: u64,
    /// 当前记账所属的本地日历日
    day: NaiveDate,
    /// 自本地午夜以来的累计花费
    daily_spend: f64,
    /// 本日是否已发出接近上限的告警
    warned: bool,
}

/// 预算守卫
///
/// 维护进程内的每分钟请求/令牌滑动窗口与日历日花费
/// 累计器，在外部AI调用发出前进行门禁。检查是事前
/// 估算性的，记账是事后按实际用量进行的。
///
/// 作为构造注入的服务使用，测试可实例化互相隔离的实例。
pub struct BudgetGuard {
    config: BudgetConfig,
    state: Mutex<BudgetState>,
}

impl BudgetGuard {
    /// 创建新的预算守卫实例
    pub fn new(config: BudgetConfig) -> Self {
        let state = BudgetState {
            window: VecDeque::new(),
            window_tokens: 0,
            day: Local::now().date_naive(),
            daily_spend: 0.0,
            warned: false,
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// 判断一次估算用量的调用是否可以发出
    ///
    /// 仅当窗口内的调用数与令牌数都不会超过配置上限时放行。
    pub fn can_proceed(&self, estimated_tokens: u64) -> bool {
        self.can_proceed_at(Utc::now(), estimated_tokens)
    }

    fn can_proceed_at(&self, now: DateTime<Utc>, estimated_tokens: u64) -> bool {
        let mut state = self.state.lock();
        Self::prune_window(&mut state, now);

        (state.window.len() as u32) < self.config.max_requests_per_minute
            && state.window_tokens + estimated_tokens <= self.config.max_tokens_per_minute
    }

    /// 按实际令牌用量记账
    pub fn record_usage(&self, tokens: u64) {
        self.record_usage_at(Utc::now(), tokens);
    }

    fn record_usage_at(&self, now: DateTime<Utc>, tokens: u64) {
        let mut state = self.state.lock();
        Self::prune_window(&mut state, now);
        state.window.push_back(WindowEntry { at: now, tokens });
        state.window_tokens += tokens;
    }

    /// 建议的等待时间：最早的窗口条目滑出窗口所需的时间
    pub fn wait_hint(&self) -> Duration {
        self.wait_hint_at(Utc::now())
    }

    fn wait_hint_at(&self, now: DateTime<Utc>) -> Duration {
        let mut state = self.state.lock();
        Self::prune_window(&mut state, now);

        match state.window.front() {
            Some(entry) => {
                let free_at = entry.at + ChronoDuration::seconds(60);
                (free_at - now).to_std().unwrap_or(Duration::ZERO)
            }
            None => Duration::ZERO,
        }
    }

    /// 判断一次估算花费的调用是否在日预算之内
    pub fn can_afford_cost(&self, estimated_cost: f64) -> bool {
        self.can_afford_cost_on(Local::now().date_naive(), estimated_cost)
    }

    fn can_afford_cost_on(&self, today: NaiveDate, estimated_cost: f64) -> bool {
        let mut state = self.state.lock();
        Self::roll_day(&mut state, today);
        state.daily_spend + estimated_cost <= self.config.daily_cost_ceiling
    }

    /// 按实际花费记账
    ///
    /// 累计花费首次越过告警阈值时发出一次告警。
    pub fn record_cost(&self, cost: f64) {
        self.record_cost_on(Local::now().date_naive(), cost);
    }

    fn record_cost_on(&self, today: NaiveDate, cost: f64) {
        let mut state = self.state.lock();
        Self::roll_day(&mut state, today);
        state.daily_spend += cost;

        let warn_threshold = self.config.daily_cost_ceiling * self.config.warn_fraction;
        if !state.warned && state.daily_spend >= warn_threshold {
            state.warned = true;
            warn!(
                "Daily AI spend ${:.2} has crossed {:.0}% of the ${:.2} ceiling",
                state.daily_spend,
                self.config.warn_fraction * 100.0,
                self.config.daily_cost_ceiling
            );
            counter!("budget_warn_threshold_crossed_total").increment(1);
        }
    }

    /// 当前日历日的累计花费
    pub fn daily_spend(&self) -> f64 {
        let mut state = self.state.lock();
        Self::roll_day(&mut state, Local::now().date_naive());
        state.daily_spend
    }

    /// 移除滑出一分钟窗口的条目
    fn prune_window(state: &mut BudgetState, now: DateTime<Utc>) {
        let cutoff = now - ChronoDuration::seconds(60);
        while let Some(front) = state.window.front() {
            if front.at >= cutoff {
                break;
            }
            let expired = state.window.pop_front().unwrap();
            state.window_tokens = state.window_tokens.saturating_sub(expired.tokens);
        }
    }

    /// 日期变更时重置日累计器
    fn roll_day(state: &mut BudgetState, today: NaiveDate) {
        if state.day != today {
            state.day = today;
            state.daily_spend = 0.0;
            state.warned = false;
        }
    }
}
