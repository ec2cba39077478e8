// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 作业提交、优先级等待集、租约发放与维护调度
pub mod coordinator;
pub mod scheduler;
