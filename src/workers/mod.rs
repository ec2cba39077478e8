// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 管道工作器池及后台维护工作器
pub mod expiration_worker;
pub mod heartbeat_worker;
pub mod manager;
pub mod pipeline_worker;
