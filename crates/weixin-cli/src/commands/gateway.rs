//! Serve 命令

use anyhow::Result;
use weixin_core::Config;
use weixin_server::Gateway;

pub async fn run(config: Config) -> Result<()> {
    tracing::info!("Starting Weixin gateway...");
    tracing::info!("Configuration: {:?}", config.server);

    let disabled: Vec<&str> = config
        .accounts
        .iter()
        .filter(|(_, account)| !account.enabled)
        .map(|(id, _)| id.as_str())
        .collect();
    if !disabled.is_empty() {
        tracing::warn!("Disabled accounts: {}", disabled.join(", "));
    }

    let gateway = Gateway::new(config).await?;
    gateway.start().await?;

    Ok(())
}
