// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 通知模块
///
/// 连接/频道管理与进度、提示、统计心跳的扇出
pub mod hub;
pub mod messages;
