//! 配置加载器
//!
//! 从配置文件（TOML/YAML/JSON）加载，并允许 `WEIXIN__` 前缀的环境变量覆盖，
//! 例如 `WEIXIN__SERVER__PORT=9000`。

use std::path::Path;

use crate::config::Config;
use crate::error::{Result, WeixinError};

pub const ENV_PREFIX: &str = "WEIXIN";

/// 加载配置文件
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(WeixinError::Config(format!(
            "配置文件不存在: {}",
            path.display()
        )));
    }

    let config: Config = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    for (id, account) in &config.accounts {
        if account.appid.trim().is_empty() {
            return Err(WeixinError::Config(format!("公众号 {} 未配置 appid", id)));
        }
    }

    tracing::debug!(
        "Loaded config from {}: {} account(s)",
        path.display(),
        config.accounts.len()
    );
    Ok(config)
}
