// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 定义与外部协作方的接口：AI补全服务与身份校验
pub mod completion;
pub mod token_verifier;
