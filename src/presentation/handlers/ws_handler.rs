// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, Query, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::services::token_verifier::TokenVerifier;
use crate::notifications::hub::NotificationHub;
use crate::notifications::messages::InboundMessage;

/// 实时连接的查询参数
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// 承载令牌（WebSocket握手无法携带Authorization头）
    pub token: String,
}

/// 实时通知连接升级
///
/// 令牌校验在升级前完成，未认证的请求不会建立连接。
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(verifier): Extension<Arc<dyn TokenVerifier>>,
    Extension(hub): Extension<Arc<NotificationHub>>,
) -> Response {
    let Some(auth) = verifier.verify(&query.token).await else {
        warn!("Rejected websocket upgrade with unknown token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, hub, auth.user_id))
}

async fn handle_socket(socket: WebSocket, hub: Arc<NotificationHub>, user_id: Uuid) {
    let (connection_id, mut outbound) = hub.register(user_id);
    info!("Realtime connection {} opened for user {}", connection_id, user_id);

    let (mut sender, mut receiver) = socket.split();

    // 出站扇出：中心推送的消息序列化后发给客户端
    let forward = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // 入站循环：处理项目频道的订阅管理
    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(InboundMessage::Join { project_id }) => {
                    hub.join_project(connection_id, project_id);
                }
                Ok(InboundMessage::Leave { project_id }) => {
                    hub.leave_project(connection_id, project_id);
                }
                Err(e) => debug!("Ignoring unparseable client message: {}", e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.unregister(connection_id);
    forward.abort();
    info!("Realtime connection {} closed", connection_id);
}
