// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施模块
///
/// 提供外部服务集成：AI客户端、Redis、进度存储后端与认证
pub mod ai;
pub mod auth;
pub mod cache;
pub mod metrics;
pub mod repositories;
