//! 处理器工厂
//!
//! 通过名称创建消息处理器，配置中的 `handlers` 列表按名称引用这里注册的工厂。

use std::collections::HashMap;
use tokio::sync::RwLock;
use weixin_core::{Result, WeixinError};

use crate::handler::SharedHandler;

pub type HandlerCreator = Box<dyn Fn() -> Result<SharedHandler> + Send + Sync>;

pub struct HandlerFactoryRegistry {
    creators: RwLock<HashMap<String, HandlerCreator>>,
}

impl HandlerFactoryRegistry {
    pub fn new() -> Self {
        Self {
            creators: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register<F>(&self, name: impl Into<String>, creator: F)
    where
        F: Fn() -> Result<SharedHandler> + Send + Sync + 'static,
    {
        let mut creators = self.creators.write().await;
        creators.insert(name.into(), Box::new(creator));
    }

    pub async fn create(&self, name: &str) -> Result<SharedHandler> {
        let creators = self.creators.read().await;
        let creator = creators.get(name).ok_or_else(|| {
            WeixinError::Config(format!(
                "Unknown message handler: {}. Use register_default_handlers() first.",
                name
            ))
        })?;
        creator()
    }

    pub async fn list_names(&self) -> Vec<String> {
        let creators = self.creators.read().await;
        let mut names: Vec<String> = creators.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn contains(&self, name: &str) -> bool {
        let creators = self.creators.read().await;
        creators.contains_key(name)
    }

    /// 按配置顺序创建处理器，跳过重复和无法创建的名称
    pub async fn create_all(&self, account_id: &str, names: &[String]) -> Vec<SharedHandler> {
        let mut seen: Vec<&str> = Vec::new();
        let mut handlers = Vec::new();

        for name in names.iter().map(|n| n.trim()) {
            if seen.contains(&name) {
                tracing::warn!("Account {} lists handler '{}' more than once", account_id, name);
                continue;
            }
            seen.push(name);

            match self.create(name).await {
                Ok(handler) => handlers.push(handler),
                Err(e) => tracing::error!(
                    "Account {} failed to create handler '{}': {}",
                    account_id,
                    name,
                    e
                ),
            }
        }

        handlers
    }
}

impl Default for HandlerFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
