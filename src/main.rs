use anyhow::{Context, Result, bail};
use std::sync::Arc;

mod config;
mod error;
mod mail;
mod server;
mod tools;
mod triage;
mod utils;

use config::oauth_config::OAuthConfig;
use config::storage::CredentialStore;
use mail::gmail::{GmailMailSource, oauth};
use triage::{TriageService, VipRegistry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. 初始化日志（stderr）
    init_logger()?;

    // 2. 加载配置
    let cfg = config::load().context("加载配置失败")?;
    tracing::debug!("凭据文件: {}", cfg.paths.credentials_file.display());
    tracing::debug!("Token 文件: {}", cfg.paths.token_file.display());

    let store = CredentialStore::new(&cfg.paths.token_file);

    // 3. 按子命令分发
    let command = std::env::args().nth(1);
    match command.as_deref() {
        Some("authorize") => run_authorize(&cfg, &store).await,
        None | Some("serve") => run_server(cfg, store).await,
        Some(other) => bail!("未知命令: {}（可用: serve, authorize）", other),
    }
}

/// 一次性交互授权，写入 Token 文件后退出
async fn run_authorize(cfg: &config::Config, store: &CredentialStore) -> Result<()> {
    let oauth_config = OAuthConfig::load(&cfg.paths.credentials_file)
        .with_context(|| {
            format!(
                "无法读取 OAuth 客户端凭据: {}",
                cfg.paths.credentials_file.display()
            )
        })?;

    oauth::authorize(&oauth_config, store).await?;
    Ok(())
}

/// 启动 stdio 工具服务
async fn run_server(cfg: config::Config, store: CredentialStore) -> Result<()> {
    let source = GmailMailSource::new(cfg.paths.credentials_file.clone(), store);
    let vip = Arc::new(VipRegistry::new());
    let service = TriageService::new(source, vip);

    server::Server::new(cfg.server.name, tools::Tools::new(service))
        .run()
        .await
}

fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailtriage=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
