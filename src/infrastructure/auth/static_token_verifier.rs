// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::domain::services::token_verifier::{AuthContext, TokenVerifier};

/// 静态令牌校验器
///
/// 从配置加载 `token=user_uuid` 映射的校验实现，
/// 作为外部身份提供方的进程内替身。
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Uuid>,
}

impl StaticTokenVerifier {
    /// 从配置字符串解析令牌映射
    ///
    /// # 参数
    ///
    /// * `spec` - 逗号分隔的 `token=user_uuid` 列表
    ///
    /// 无法解析的条目被跳过并记录告警。
    pub fn from_spec(spec: &str) -> Self {
        let mut tokens = HashMap::new();
        for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match entry.split_once('=') {
                Some((token, user)) => match user.trim().parse::<Uuid>() {
                    Ok(user_id) => {
                        tokens.insert(token.trim().to_string(), user_id);
                    }
                    Err(_) => warn!("Skipping auth token entry with invalid user id"),
                },
                None => warn!("Skipping malformed auth token entry"),
            }
        }
        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<AuthContext> {
        self.tokens
            .get(token)
            .map(|user_id| AuthContext { user_id: *user_id })
    }
}
