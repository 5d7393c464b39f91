//! Weixin CLI - 公众号网关命令行工具

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "weixin")]
#[command(about = "Weixin MP gateway - WeChat Official Account integration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Config file (TOML/YAML/JSON)
        #[arg(short, long, default_value = "weixin.toml")]
        config: PathBuf,
        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Compute a server verification signature
    Sign {
        #[arg(long)]
        token: String,
        #[arg(long)]
        timestamp: String,
        #[arg(long)]
        nonce: String,
    },
    /// Fetch an access token for an account
    Token {
        #[arg(short, long, default_value = "weixin.toml")]
        config: PathBuf,
        /// Account id as configured
        #[arg(short, long)]
        account: String,
    },
    /// Manage the custom menu
    Menu {
        #[arg(short, long, default_value = "weixin.toml")]
        config: PathBuf,
        #[arg(short, long)]
        account: String,
        #[command(subcommand)]
        command: MenuCommand,
    },
    /// List the callback server IPs
    Ips {
        #[arg(short, long, default_value = "weixin.toml")]
        config: PathBuf,
        #[arg(short, long)]
        account: String,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum MenuCommand {
    /// Print the current menu
    Get,
    /// Create the menu from a JSON file
    Create {
        /// Menu JSON, with or without the `menu` wrapper
        file: PathBuf,
    },
    /// Delete the menu
    Delete,
}

/// 日志级别优先使用 RUST_LOG，其次是配置中的 log_level
fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("weixin={0},{0}", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let mut config = commands::load(&config)?;
            init_logging(&config.server.log_level);
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::gateway::run(config).await?;
        }
        Commands::Sign { token, timestamp, nonce } => {
            println!("{}", commands::api::sign(&token, &timestamp, &nonce));
        }
        Commands::Token { config, account } => {
            let config = commands::load(&config)?;
            init_logging(&config.server.log_level);
            let client = commands::api::client(&config, &account)?;
            println!("{}", client.token().await?);
        }
        Commands::Menu { config, account, command } => {
            let config = commands::load(&config)?;
            init_logging(&config.server.log_level);
            let client = commands::api::client(&config, &account)?;
            commands::api::menu(&client, command).await?;
        }
        Commands::Ips { config, account } => {
            let config = commands::load(&config)?;
            init_logging(&config.server.log_level);
            let client = commands::api::client(&config, &account)?;
            for ip in client.callback_ips().await? {
                println!("{}", ip);
            }
        }
        Commands::Version => {
            println!("Weixin MP gateway {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
