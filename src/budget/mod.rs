// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 预算模块
///
/// 对外部AI服务实施每分钟与每日用量上限
pub mod guard;

pub use guard::{BudgetConfig, BudgetGuard};
