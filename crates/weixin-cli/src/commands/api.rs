//! 直接调用公众号接口的命令

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use weixin_api::{ApiClient, ApiTransport, Menu, ReqwestTransport};
use weixin_core::{Config, signature::compute_signature};

use crate::MenuCommand;

pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
    compute_signature(&[token, timestamp, nonce])
}

pub fn client(config: &Config, account: &str) -> Result<ApiClient> {
    let transport: Arc<dyn ApiTransport> = Arc::new(ReqwestTransport::from_config(&config.api)?);
    client_with(config, account, transport)
}

pub fn client_with(
    config: &Config,
    account: &str,
    transport: Arc<dyn ApiTransport>,
) -> Result<ApiClient> {
    let Some(settings) = config.accounts.get(account) else {
        bail!("未找到公众号: {}", account);
    };
    Ok(ApiClient::new(&settings.appid, &settings.secret, transport))
}

pub fn read_menu(path: &Path) -> Result<Menu> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取菜单文件 {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    Ok(Menu::from_value(&value)?)
}

pub async fn menu(client: &ApiClient, command: MenuCommand) -> Result<()> {
    match command {
        MenuCommand::Get => match client.get_menu().await? {
            Some(menu) => println!("{}", serde_json::to_string_pretty(&menu.to_value()?)?),
            None => println!("No menu configured"),
        },
        MenuCommand::Create { file } => {
            let menu = read_menu(&file)?;
            client.create_menu(&menu).await?;
            println!("Menu created: {}", menu.names().join(", "));
        }
        MenuCommand::Delete => {
            client.delete_menu().await?;
            println!("Menu deleted");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use weixin_testing::config::mock_config;
    use weixin_testing::fixtures::{NONCE, TIMESTAMP, TOKEN, signature};
    use weixin_testing::transport::MockTransport;

    #[test]
    fn test_sign_matches_verification() {
        assert_eq!(sign(TOKEN, TIMESTAMP, NONCE), signature(TOKEN, TIMESTAMP, NONCE));
        assert_eq!(sign(NONCE, TOKEN, TIMESTAMP), sign(TOKEN, TIMESTAMP, NONCE));
    }

    #[test]
    fn test_unknown_account() {
        let result = client_with(&mock_config(), "nobody", Arc::new(MockTransport::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_menu_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            "{}",
            json!({"menu": {"button": [{"name": "news", "type": "click", "key": "V1001"}]}})
        )
        .unwrap();

        let menu = read_menu(file.path()).unwrap();
        assert_eq!(menu.names(), vec!["news"]);
    }

    #[tokio::test]
    async fn test_menu_create_and_delete() {
        let transport = MockTransport::new();
        transport
            .push_json("menu/create", json!({"errcode": 0, "errmsg": "ok"}))
            .push_json("menu/delete", json!({"errcode": 0, "errmsg": "ok"}));

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            "{}",
            json!({"button": [{"name": "site", "type": "view", "url": "https://example.com"}]})
        )
        .unwrap();

        let client = client_with(&mock_config(), "ycx", Arc::new(transport.clone())).unwrap();
        menu(
            &client,
            MenuCommand::Create {
                file: file.path().to_path_buf(),
            },
        )
        .await
        .unwrap();
        menu(&client, MenuCommand::Delete).await.unwrap();

        assert_eq!(transport.call_count("menu/create"), 1);
        assert_eq!(transport.call_count("menu/delete"), 1);
        assert_eq!(transport.call_count("token"), 1);
    }
}
