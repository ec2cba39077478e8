// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

/// 已认证调用方的上下文
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    /// 调用方用户ID
    pub user_id: Uuid,
}

/// 令牌校验特质
///
/// 身份提供方的接入缝。HTTP请求与实时连接在进入
/// 作业队列协调器之前都通过该特质完成认证。
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// 校验承载令牌，成功时返回认证上下文
    async fn verify(&self, token: &str) -> Option<AuthContext>;
}
