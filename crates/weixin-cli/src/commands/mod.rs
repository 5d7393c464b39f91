pub mod api;
pub mod gateway;

use anyhow::{Context, Result};
use std::path::Path;
use weixin_core::Config;

pub fn load(path: &Path) -> Result<Config> {
    weixin_core::load_config(path).with_context(|| format!("无法加载配置 {}", path.display()))
}
