//! 配置管理

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 微信 API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 公众号配置，键为公众号标识
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,
}

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
        }
    }
}

/// 微信 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 基础地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub const DEFAULT_API_BASE_URL: &str = "https://api.weixin.qq.com/cgi-bin";

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 公众号类别
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// 订阅号
    #[default]
    Subscription,
    /// 服务号
    Service,
    /// 企业号
    Enterprise,
}

/// 单个公众号配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// 公众号开发者ID
    pub appid: String,
    /// 公众号开发者密码
    pub secret: String,
    /// 服务器配置令牌
    pub token: String,
    /// 消息加解密密钥，未配置时仅支持明文模式
    #[serde(
        default,
        rename = "encodingAESKey",
        alias = "encoding_aes_key",
        alias = "encodingaeskey"
    )]
    pub encoding_aes_key: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub kind: AccountKind,
    /// 消息处理器名称，按顺序调用
    #[serde(default)]
    pub handlers: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl AccountConfig {
    pub fn new(
        appid: impl Into<String>,
        secret: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            appid: appid.into(),
            secret: secret.into(),
            token: token.into(),
            encoding_aes_key: None,
            enabled: true,
            kind: AccountKind::default(),
            handlers: Vec::new(),
        }
    }

    pub fn with_handlers(mut self, handlers: Vec<String>) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_encoding_aes_key(mut self, key: impl Into<String>) -> Self {
        self.encoding_aes_key = Some(key.into());
        self
    }
}
