// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 管道模块
///
/// 固定7步的AI编排：步骤定义、编排服务与聚合结果
pub mod orchestrator;
pub mod result;
pub mod steps;
