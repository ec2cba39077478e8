// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 认证模块
///
/// 令牌校验的配置后端实现
pub mod static_token_verifier;
