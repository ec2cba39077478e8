// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 进度存储的内存与Redis后端
pub mod memory_progress_repo;
pub mod redis_progress_repo;
