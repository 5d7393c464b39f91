//! 消息处理器

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use weixin_api::ApiClient;
use weixin_core::{AccountKind, InboundMessage, Result, render};

/// 一次消息分发的上下文
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    /// 公众号标识（配置中的键）
    pub account_id: String,
    pub appid: String,
    pub kind: AccountKind,
    pub message: InboundMessage,
    /// 公众号的 API 客户端，处理器可用来调用其他接口
    pub client: Arc<ApiClient>,
}

impl DispatchRecord {
    /// 以公众号身份给消息发送方回复文本；未知消息返回空字符串
    pub fn reply_text(&self, content: &str) -> String {
        match self.message.header() {
            Some(header) => render::text(&header.from_user_name, &header.to_user_name, content, None),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for DispatchRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.appid, self.message.kind())
    }
}

/// 消息处理器 Trait
///
/// 返回空字符串表示不处理，交给下一个处理器。
#[async_trait]
pub trait MessageHandler: Send {
    fn name(&self) -> &str;

    async fn reply(&mut self, record: &DispatchRecord) -> Result<String>;
}

pub type SharedHandler = Arc<Mutex<dyn MessageHandler>>;

pub fn shared<H: MessageHandler + 'static>(handler: H) -> SharedHandler {
    Arc::new(Mutex::new(handler))
}

/// 回显文本消息的默认处理器
#[derive(Debug, Default)]
pub struct EchoHandler;

impl EchoHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    async fn reply(&mut self, record: &DispatchRecord) -> Result<String> {
        match &record.message {
            InboundMessage::Text(text) => Ok(record.reply_text(&format!(
                "收到来自{}的消息。\n内容为'{}'",
                text.header.from_user_name, text.content
            ))),
            _ => Ok(String::new()),
        }
    }
}

/// 按顺序调用的处理器链
pub struct HandlerChain {
    handlers: Vec<SharedHandler>,
    fallback: SharedHandler,
}

impl HandlerChain {
    pub fn new(handlers: Vec<SharedHandler>, fallback: SharedHandler) -> Self {
        Self { handlers, fallback }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 第一个非空回复即为结果；没有处理器或都不处理时使用默认处理器
    pub async fn dispatch(&self, record: &DispatchRecord) -> Result<String> {
        if self.handlers.is_empty() {
            tracing::warn!(
                "Account {} has no message handler, using the default handler",
                record.account_id
            );
            return self.fallback.lock().await.reply(record).await;
        }

        for handler in &self.handlers {
            let mut handler = handler.lock().await;
            let reply = handler.reply(record).await?;
            if !reply.is_empty() {
                tracing::debug!("Message {} answered by handler {}", record, handler.name());
                return Ok(reply);
            }
        }

        tracing::debug!("No handler replied to {}, using the default handler", record);
        self.fallback.lock().await.reply(record).await
    }
}
