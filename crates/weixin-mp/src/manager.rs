use std::collections::HashMap;
use std::sync::Arc;
use weixin_api::ApiTransport;
use weixin_core::{AccountConfig, Config, Result, WeixinError};

use crate::account::{Account, MessageQuery, VerifyQuery, default_fallback};
use crate::factory::HandlerFactoryRegistry;
use crate::handler::SharedHandler;

/// 公众号注册表，构建完成后只读
pub struct AccountRegistry {
    accounts: HashMap<String, Arc<Account>>,
    fallback: SharedHandler,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            fallback: default_fallback(),
        }
    }

    /// 所有公众号共享的默认处理器
    pub fn fallback(&self) -> SharedHandler {
        self.fallback.clone()
    }

    pub async fn from_config(
        config: &Config,
        transport: Arc<dyn ApiTransport>,
        factories: &HandlerFactoryRegistry,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for (id, account) in &config.accounts {
            registry
                .add_account(id, account, transport.clone(), factories)
                .await?;
        }
        tracing::info!("Loaded {} account(s)", registry.accounts.len());
        Ok(registry)
    }

    pub async fn add_account(
        &mut self,
        id: &str,
        config: &AccountConfig,
        transport: Arc<dyn ApiTransport>,
        factories: &HandlerFactoryRegistry,
    ) -> Result<Arc<Account>> {
        let account = Arc::new(
            Account::from_config(id, config, transport, factories, self.fallback.clone()).await?,
        );
        tracing::info!(
            "Account {} ({}) registered with {} handler(s)",
            id,
            config.appid,
            account.handler_count()
        );
        self.accounts.insert(id.to_string(), account.clone());
        Ok(account)
    }

    pub fn insert(&mut self, account: Account) -> Arc<Account> {
        let account = Arc::new(account);
        self.accounts
            .insert(account.id().to_string(), account.clone());
        account
    }

    pub fn get(&self, id: &str) -> Result<Arc<Account>> {
        self.accounts
            .get(id)
            .cloned()
            .ok_or_else(|| WeixinError::AccountNotFound(id.to_string()))
    }

    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.accounts.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn do_get(&self, id: &str, query: &VerifyQuery) -> String {
        match self.get(id) {
            Ok(account) => account.do_get(query),
            Err(e) => {
                tracing::warn!("{}", e);
                String::new()
            }
        }
    }

    pub async fn do_post(&self, id: &str, query: &MessageQuery, body: &str) -> String {
        match self.get(id) {
            Ok(account) => account.do_post(query, body).await,
            Err(e) => {
                tracing::warn!("{}", e);
                String::new()
            }
        }
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}
