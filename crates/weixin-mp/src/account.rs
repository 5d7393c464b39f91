//! 公众号
//!
//! 每个公众号持有自己的令牌、API 客户端、加解密器和处理器链。
//! 服务器验证和消息处理都不会向调用方返回错误，失败时回复空字符串。

use serde::Deserialize;
use std::sync::Arc;
use weixin_api::{ApiClient, ApiTransport};
use weixin_core::payload::{self, Payload};
use weixin_core::{
    AccountConfig, AccountKind, MessageCryptor, Result, WeixinError, classify, signature,
};

use crate::factory::HandlerFactoryRegistry;
use crate::handler::{DispatchRecord, EchoHandler, HandlerChain, SharedHandler, shared};

pub const OAUTH_AUTHORIZE_URL: &str = "https://open.weixin.qq.com/connect/oauth2/authorize";

/// 服务器验证请求参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub echostr: Option<String>,
}

/// 消息推送请求参数，安全模式下带有 `msg_signature`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub openid: Option<String>,
    pub encrypt_type: Option<String>,
    pub msg_signature: Option<String>,
}

/// 网页授权作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthScope {
    /// 静默授权，只能获取 openid
    Base,
    /// 弹出授权页面，可获取用户信息
    UserInfo,
}

impl OAuthScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthScope::Base => "snsapi_base",
            OAuthScope::UserInfo => "snsapi_userinfo",
        }
    }
}

pub struct Account {
    id: String,
    appid: String,
    token: String,
    enabled: bool,
    kind: AccountKind,
    client: Arc<ApiClient>,
    cryptor: Option<MessageCryptor>,
    chain: HandlerChain,
}

impl Account {
    /// 创建公众号；EncodingAESKey 格式错误时失败
    pub fn new(
        id: impl Into<String>,
        config: &AccountConfig,
        transport: Arc<dyn ApiTransport>,
        handlers: Vec<SharedHandler>,
        fallback: SharedHandler,
    ) -> Result<Self> {
        let cryptor = match config.encoding_aes_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(MessageCryptor::new(
                config.appid.clone(),
                config.token.clone(),
                key,
            )?),
            _ => None,
        };

        Ok(Self {
            id: id.into(),
            appid: config.appid.clone(),
            token: config.token.clone(),
            enabled: config.enabled,
            kind: config.kind,
            client: Arc::new(ApiClient::new(
                config.appid.clone(),
                config.secret.clone(),
                transport,
            )),
            cryptor,
            chain: HandlerChain::new(handlers, fallback),
        })
    }

    /// 按配置中的处理器名称创建公众号
    pub async fn from_config(
        id: impl Into<String>,
        config: &AccountConfig,
        transport: Arc<dyn ApiTransport>,
        factories: &HandlerFactoryRegistry,
        fallback: SharedHandler,
    ) -> Result<Self> {
        let id = id.into();
        let handlers = factories.create_all(&id, &config.handlers).await;
        Self::new(id, config, transport, handlers, fallback)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn appid(&self) -> &str {
        &self.appid
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_encrypted(&self) -> bool {
        self.cryptor.is_some()
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn handler_count(&self) -> usize {
        self.chain.len()
    }

    /// 服务器验证：签名正确时原样返回 echostr，否则返回空字符串
    pub fn check_valid(&self, query: &VerifyQuery) -> String {
        tracing::debug!("Verification request for account {}: {:?}", self.id, query);

        let (Some(signature), Some(timestamp), Some(nonce), Some(echostr)) = (
            query.signature.as_deref(),
            query.timestamp.as_deref(),
            query.nonce.as_deref(),
            query.echostr.as_deref(),
        ) else {
            tracing::warn!("Verification request for account {} is missing parameters", self.id);
            return String::new();
        };

        if signature::verify(&self.token, timestamp, nonce, signature) {
            tracing::debug!("Account {} verified", self.id);
            echostr.to_string()
        } else {
            tracing::error!(
                "Verification failed for account {}: signature={}, timestamp={}, nonce={}",
                self.id,
                signature,
                timestamp,
                nonce
            );
            String::new()
        }
    }

    /// 处理 GET 请求
    pub fn do_get(&self, query: &VerifyQuery) -> String {
        if !self.enabled {
            tracing::warn!("Account {} is disabled", self.id);
            return String::new();
        }
        self.check_valid(query)
    }

    fn decrypt_payload(&self, query: &MessageQuery, encrypt: &str) -> Result<Payload> {
        let cryptor = self.cryptor.as_ref().ok_or_else(|| {
            WeixinError::Crypto(format!("公众号 {} 未配置 EncodingAESKey", self.id))
        })?;

        let plain = cryptor.decrypt_message(
            query.msg_signature.as_deref().unwrap_or_default(),
            query.timestamp.as_deref().unwrap_or_default(),
            query.nonce.as_deref().unwrap_or_default(),
            encrypt,
        )?;
        tracing::debug!("Decrypted message for account {}: {}", self.id, plain);
        payload::decode(&plain)
    }

    /// 解析消息并交给处理器链，错误原样返回
    pub async fn response_message(&self, query: &MessageQuery, body: &str) -> Result<String> {
        let mut payload = payload::decode(body)?;
        let encrypted = match payload.get("Encrypt").map(str::to_string) {
            Some(encrypt) => {
                payload = self.decrypt_payload(query, &encrypt)?;
                true
            }
            None => {
                if self.cryptor.is_some() {
                    tracing::warn!(
                        "Account {} has an EncodingAESKey but received a plaintext message",
                        self.id
                    );
                }
                false
            }
        };

        let record = DispatchRecord {
            account_id: self.id.clone(),
            appid: self.appid.clone(),
            kind: self.kind,
            message: classify(payload)?,
            client: self.client.clone(),
        };
        let reply = self.chain.dispatch(&record).await?;

        match &self.cryptor {
            Some(cryptor) if encrypted && !reply.is_empty() => {
                Ok(cryptor.encrypt_message(&reply, None, None)?.to_xml())
            }
            _ => Ok(reply),
        }
    }

    /// 处理 POST 请求，任何错误都降级为空回复
    pub async fn do_post(&self, query: &MessageQuery, body: &str) -> String {
        if !self.enabled {
            tracing::warn!("Account {} is disabled", self.id);
            return String::new();
        }

        match self.response_message(query, body).await {
            Ok(reply) => {
                tracing::debug!("Reply for account {}: {}", self.id, reply);
                reply
            }
            Err(e) => {
                tracing::error!("Failed to handle message for account {}: {}", self.id, e);
                String::new()
            }
        }
    }

    /// 网页授权地址
    pub fn oauth_url(&self, redirect_uri: &str, scope: OAuthScope, state: Option<&str>) -> String {
        format!(
            "{}?appid={}&redirect_uri={}&response_type=code&scope={}&state={}#wechat_redirect",
            OAUTH_AUTHORIZE_URL,
            self.appid,
            urlencoding::encode(redirect_uri),
            scope.as_str(),
            urlencoding::encode(state.unwrap_or_default())
        )
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("appid", &self.appid)
            .field("enabled", &self.enabled)
            .field("kind", &self.kind)
            .field("handlers", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// 新的默认回显处理器
pub fn default_fallback() -> SharedHandler {
    shared(EchoHandler::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weixin_core::EncryptedEnvelope;
    use weixin_testing::config::encrypted_account;
    use weixin_testing::fixtures::{self, AES_KEY, APPID, NONCE, TIMESTAMP, TOKEN};
    use weixin_testing::transport::MockTransport;

    fn plain_account() -> Account {
        let config = AccountConfig::new(APPID, "secret", TOKEN);
        Account::new(
            "ycx",
            &config,
            Arc::new(MockTransport::new()),
            Vec::new(),
            default_fallback(),
        )
        .unwrap()
    }

    fn verify_query(signature: &str) -> VerifyQuery {
        VerifyQuery {
            signature: Some(signature.to_string()),
            timestamp: Some(TIMESTAMP.to_string()),
            nonce: Some(NONCE.to_string()),
            echostr: Some("echo-12345".to_string()),
        }
    }

    #[test]
    fn test_check_valid() {
        let account = plain_account();
        let signature = fixtures::signature(TOKEN, TIMESTAMP, NONCE);
        assert_eq!(account.do_get(&verify_query(&signature)), "echo-12345");
        assert_eq!(account.do_get(&verify_query("bad")), "");
        assert_eq!(account.do_get(&VerifyQuery::default()), "");
    }

    #[test]
    fn test_disabled_account() {
        let mut config = AccountConfig::new(APPID, "secret", TOKEN);
        config.enabled = false;
        let account = Account::new(
            "off",
            &config,
            Arc::new(MockTransport::new()),
            Vec::new(),
            default_fallback(),
        )
        .unwrap();
        let signature = fixtures::signature(TOKEN, TIMESTAMP, NONCE);
        assert_eq!(account.do_get(&verify_query(&signature)), "");
    }

    #[test]
    fn test_invalid_aes_key_is_fatal() {
        let config = AccountConfig::new(APPID, "secret", TOKEN).with_encoding_aes_key("too-short");
        let err = Account::new(
            "ycx",
            &config,
            Arc::new(MockTransport::new()),
            Vec::new(),
            default_fallback(),
        )
        .unwrap_err();
        assert!(matches!(err, WeixinError::UnsupportedCredentialFormat(_)));
    }

    #[tokio::test]
    async fn test_plain_post_uses_echo() {
        let account = plain_account();
        let reply = account
            .do_post(
                &MessageQuery::default(),
                &fixtures::text_message("A", "gh_account", "hello"),
            )
            .await;
        assert!(reply.contains("<ToUserName><![CDATA[A]]></ToUserName>"));
        assert!(reply.contains("hello"));
    }

    #[tokio::test]
    async fn test_malformed_post_degrades_to_empty() {
        let account = plain_account();
        assert_eq!(
            account.do_post(&MessageQuery::default(), "<xml><a></b></xml>").await,
            ""
        );
        let err = account
            .response_message(&MessageQuery::default(), "<xml><a></b></xml>")
            .await
            .unwrap_err();
        assert!(matches!(err, WeixinError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_encrypted_round_trip() {
        let account = Account::new(
            "ycx",
            &encrypted_account(),
            Arc::new(MockTransport::new()),
            Vec::new(),
            default_fallback(),
        )
        .unwrap();
        assert!(account.is_encrypted());

        let cryptor = MessageCryptor::new(APPID, TOKEN, AES_KEY).unwrap();
        let inbound = cryptor
            .encrypt_message(
                &fixtures::text_message("A", "gh_account", "secret hello"),
                Some(TIMESTAMP),
                Some(NONCE),
            )
            .unwrap();
        let query = MessageQuery {
            timestamp: Some(inbound.timestamp.clone()),
            nonce: Some(inbound.nonce.clone()),
            msg_signature: Some(inbound.msg_signature.clone()),
            encrypt_type: Some("aes".to_string()),
            ..MessageQuery::default()
        };
        let body = format!(
            "<xml><ToUserName><![CDATA[gh_account]]></ToUserName><Encrypt><![CDATA[{}]]></Encrypt></xml>",
            inbound.encrypt
        );

        let reply = account.response_message(&query, &body).await.unwrap();
        let envelope = EncryptedEnvelope::from_xml(&reply).unwrap();
        let plain = cryptor
            .decrypt_message(
                &envelope.msg_signature,
                &envelope.timestamp,
                &envelope.nonce,
                &envelope.encrypt,
            )
            .unwrap();
        assert!(plain.contains("<ToUserName><![CDATA[A]]></ToUserName>"));
        assert!(plain.contains("secret hello"));

        let tampered = MessageQuery {
            msg_signature: Some("0".repeat(40)),
            ..query
        };
        let err = account.response_message(&tampered, &body).await.unwrap_err();
        assert!(matches!(err, WeixinError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_plaintext_post_to_encrypted_account() {
        let account = Account::new(
            "ycx",
            &encrypted_account(),
            Arc::new(MockTransport::new()),
            Vec::new(),
            default_fallback(),
        )
        .unwrap();
        let reply = account
            .do_post(
                &MessageQuery::default(),
                &fixtures::text_message("A", "gh_account", "plain hello"),
            )
            .await;
        assert!(reply.contains("<ToUserName><![CDATA[A]]></ToUserName>"));
        assert!(reply.contains("plain hello"));
        assert!(!reply.contains("<Encrypt>"));
    }

    #[tokio::test]
    async fn test_events_get_no_echo_reply() {
        let account = plain_account();
        for (event, key) in [("subscribe", ""), ("CLICK", "V1001_TODAY_MUSIC")] {
            let body = fixtures::event_message("A", "gh_account", event, key);
            assert_eq!(
                account.do_post(&MessageQuery::default(), &body).await,
                ""
            );
            assert!(account
                .response_message(&MessageQuery::default(), &body)
                .await
                .is_ok());
        }
    }

    #[tokio::test]
    async fn test_encrypted_without_key() {
        let account = plain_account();
        let body = "<xml><Encrypt><![CDATA[abc]]></Encrypt></xml>";
        let err = account
            .response_message(&MessageQuery::default(), body)
            .await
            .unwrap_err();
        assert!(matches!(err, WeixinError::Crypto(_)));
    }

    #[tokio::test]
    async fn test_from_config_builds_handlers() {
        let factories = HandlerFactoryRegistry::new();
        crate::registry::register_default_handlers(&factories).await;

        let config = AccountConfig::new(APPID, "secret", TOKEN)
            .with_handlers(vec!["echo".to_string(), "echo".to_string(), "nope".to_string()]);
        let account = Account::from_config(
            "ycx",
            &config,
            Arc::new(MockTransport::new()),
            &factories,
            default_fallback(),
        )
        .await
        .unwrap();
        assert_eq!(account.handler_count(), 1);
        assert_eq!(account.client().appid(), APPID);
    }

    #[test]
    fn test_oauth_url() {
        let account = plain_account();
        let url = account.oauth_url("http://example.com/cb?a=1", OAuthScope::UserInfo, Some("xyz"));
        assert_eq!(
            url,
            format!(
                "{}?appid={}&redirect_uri=http%3A%2F%2Fexample.com%2Fcb%3Fa%3D1\
                 &response_type=code&scope=snsapi_userinfo&state=xyz#wechat_redirect",
                OAUTH_AUTHORIZE_URL, APPID
            )
        );
    }
}
