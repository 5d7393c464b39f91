//! access_token 管理
//!
//! 每个公众号只持有一个缓存的 access_token。缓存失效时在刷新锁内重新检查，
//! 保证同一时刻最多只有一次网络刷新，其余调用者等待后直接使用新令牌。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use weixin_core::{Result, WeixinError};

use crate::transport::{ApiRequest, ApiTransport};

/// 提前判定过期的余量（秒）
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// 访问令牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// 有效期（秒）
    pub expires_in: i64,
    /// 获取时间（Unix 秒）
    #[serde(default)]
    pub create_time: i64,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, expires_in: i64, create_time: i64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
            create_time,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.create_time + self.expires_in < now + EXPIRY_MARGIN_SECS
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// access_token 管理器
pub struct AccessTokenManager {
    appid: String,
    secret: String,
    transport: Arc<dyn ApiTransport>,
    cache: RwLock<Option<AccessToken>>,
    refresh_lock: Mutex<()>,
}

impl AccessTokenManager {
    pub fn new(
        appid: impl Into<String>,
        secret: impl Into<String>,
        transport: Arc<dyn ApiTransport>,
    ) -> Self {
        Self {
            appid: appid.into(),
            secret: secret.into(),
            transport,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn appid(&self) -> &str {
        &self.appid
    }

    /// 当前有效的 access_token，必要时刷新
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.valid_cached().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.valid_cached().await {
            return Ok(token);
        }

        let token = self.grant().await?;
        let value = token.access_token.clone();
        *self.cache.write().await = Some(token);
        Ok(value)
    }

    async fn valid_cached(&self) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|token| !token.is_expired())
            .map(|token| token.access_token.clone())
    }

    /// 向微信服务器申请新令牌，不读写缓存
    pub async fn grant(&self) -> Result<AccessToken> {
        let request = ApiRequest::get("token")
            .query("grant_type", "client_credential")
            .query("appid", &self.appid)
            .query("secret", &self.secret);

        let value = self.transport.execute(request).await?.into_json()?;
        let access_token = value
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WeixinError::Http("获取 access_token 的响应缺少 access_token".to_string()))?;
        let expires_in = value
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| WeixinError::Http("获取 access_token 的响应缺少 expires_in".to_string()))?;

        tracing::info!("Access token refreshed for {}, expires in {}s", self.appid, expires_in);
        Ok(AccessToken::new(
            access_token,
            expires_in,
            chrono::Utc::now().timestamp(),
        ))
    }

    /// 清除缓存，下次调用 [`token`](Self::token) 时重新获取
    pub async fn invalidate(&self) {
        tracing::debug!("Access token invalidated for {}", self.appid);
        *self.cache.write().await = None;
    }

    /// 当前缓存的令牌（可能已过期）
    pub async fn cached(&self) -> Option<AccessToken> {
        self.cache.read().await.clone()
    }

    /// 直接写入缓存，用于从外部恢复令牌
    pub async fn store(&self, token: AccessToken) {
        *self.cache.write().await = Some(token);
    }
}

impl std::fmt::Debug for AccessTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenManager")
            .field("appid", &self.appid)
            .finish_non_exhaustive()
    }
}
