// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 请求/响应数据传输对象
pub mod application;

/// 预算模块
///
/// AI用量窗口与每日花费上限的进程内守卫
pub mod budget;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如AI接口、缓存、进度存储等
pub mod infrastructure;

/// 通知模块
///
/// 面向订阅者的实时进度与统计扇出
pub mod notifications;

/// 管道模块
///
/// 固定步骤的AI编排与结果聚合
pub mod pipeline;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由、处理器和中间件
pub mod presentation;

/// 队列模块
///
/// 实现作业队列和调度功能
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现后台作业处理和工作器管理
pub mod workers;
