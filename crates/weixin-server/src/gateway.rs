//! 网关服务

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use weixin_api::{ApiTransport, ReqwestTransport};
use weixin_core::{Config, Result, WeixinError};
use weixin_mp::{AccountRegistry, HandlerFactoryRegistry, register_default_handlers};

use crate::api::create_router;

pub struct Gateway {
    config: Config,
    accounts: Arc<AccountRegistry>,
}

impl Gateway {
    /// 使用默认处理器和 reqwest 传输层创建网关
    pub async fn new(config: Config) -> Result<Self> {
        let factories = HandlerFactoryRegistry::new();
        register_default_handlers(&factories).await;
        let transport: Arc<dyn ApiTransport> = Arc::new(ReqwestTransport::from_config(&config.api)?);
        Self::with_parts(config, transport, &factories).await
    }

    pub async fn with_parts(
        config: Config,
        transport: Arc<dyn ApiTransport>,
        factories: &HandlerFactoryRegistry,
    ) -> Result<Self> {
        let accounts = AccountRegistry::from_config(&config, transport, factories).await?;
        Ok(Self {
            config,
            accounts: Arc::new(accounts),
        })
    }

    pub fn accounts(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    pub fn router(&self) -> Router {
        create_router(self.accounts.clone())
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// 启动服务
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| WeixinError::Config(format!("监听地址无效: {}", e)))?;

        tracing::info!("Weixin gateway starting on {}", addr);
        tracing::info!("Accounts: {}", self.accounts.list_ids().join(", "));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| WeixinError::Config(format!("绑定地址失败: {}", e)))?;

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
