// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// AI客户端模块
///
/// 外部AI补全服务的HTTP实现、价格表与弹性包装
pub mod openai_client;
pub mod pricing;
pub mod resilient_client;
