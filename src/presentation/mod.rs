// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 表现层模块
///
/// HTTP/WebSocket处理器、中间件、路由与统一错误处理
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
