//! HTTP API 路由

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use weixin_mp::{AccountRegistry, MessageQuery, VerifyQuery};

/// 创建完整 API 路由
pub fn create_router(accounts: Arc<AccountRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/wechat/{id}", get(verify_server).post(receive_message))
        .with_state(accounts)
}

/// 健康检查
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// 微信服务器验证
///
/// 参数或请求体无法解析时同样返回 200 和空字符串。
async fn verify_server(
    State(accounts): State<Arc<AccountRegistry>>,
    Path(id): Path<String>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> String {
    tracing::info!("Verification request for account {}", id);
    match query {
        Ok(Query(query)) => accounts.do_get(&id, &query),
        Err(e) => {
            tracing::warn!("Invalid verification query for account {}: {}", id, e);
            String::new()
        }
    }
}

/// 接收微信服务器推送的消息
async fn receive_message(
    State(accounts): State<Arc<AccountRegistry>>,
    Path(id): Path<String>,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: Bytes,
) -> String {
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => {
            tracing::warn!("Invalid message query for account {}: {}", id, e);
            return String::new();
        }
    };
    let body = match std::str::from_utf8(&body) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Message body for account {} is not UTF-8: {}", id, e);
            return String::new();
        }
    };

    tracing::info!("Message for account {}: {}", id, body);
    let reply = accounts.do_post(&id, &query, body).await;
    tracing::info!("Reply for account {}: {}", id, reply);
    reply
}
