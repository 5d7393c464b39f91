//! Weixin Core - 公众号接入的核心类型
//!
//! 提供错误处理、配置、签名校验、消息解析、回复渲染和安全模式加解密。

pub mod config;
pub mod config_loader;
pub mod crypto;
pub mod error;
pub mod message;
pub mod payload;
pub mod render;
pub mod signature;

pub use self::config::*;
pub use self::config_loader::load_config;
pub use self::crypto::{EncryptedEnvelope, MessageCryptor};
pub use self::error::*;
pub use self::message::*;
pub use self::payload::Payload;
pub use self::render::{Article, Music, Renderer};
