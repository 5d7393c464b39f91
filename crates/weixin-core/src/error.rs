//! 统一错误处理

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeixinError {
    #[error("消息格式错误: {0}")]
    MalformedPayload(String),

    #[error("消息缺少字段: {0}")]
    MissingField(String),

    #[error("消息签名校验失败")]
    InvalidSignature,

    #[error("不支持的密钥格式: {0}")]
    UnsupportedCredentialFormat(String),

    #[error("消息 AppId 不匹配")]
    AppIdMismatch,

    #[error("加解密错误: {0}")]
    Crypto(String),

    #[error("微信 API 错误: {code} - {message}")]
    Api { code: i64, message: String },

    #[error("HTTP 请求错误: {0}")]
    Http(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("公众号不存在: {0}")]
    AccountNotFound(String),

    #[error("公众号未启用: {0}")]
    AccountDisabled(String),

    #[error("菜单数据错误: {0}")]
    InvalidMenu(String),

    #[error("消息处理器错误: {0}")]
    Handler(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WeixinError {
    /// 微信 API 返回的错误码
    pub fn api_code(&self) -> Option<i64> {
        match self {
            WeixinError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for WeixinError {
    fn from(err: config::ConfigError) -> Self {
        WeixinError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WeixinError>;
