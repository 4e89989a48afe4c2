//! pushlog CLI
//!
//! 查看和维护通知日志，管理设备 token，运行完整的通知模拟流程

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use pushlog::cli::{
    handle_append, handle_clear, handle_log, handle_simulate, handle_token, AppendArgs, ClearArgs,
    LogArgs, SimulateArgs, TokenArgs,
};
use pushlog::{FileStore, NotificationLog, PushLogConfig};

#[derive(Parser)]
#[command(name = "pushlog")]
#[command(about = "pushlog - 推送通知与本地通知的消息日志")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/pushlog/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 存储文件路径（覆盖配置文件中的 storage_path）
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 显示保存的通知
    Log(LogArgs),
    /// 手动追加一条通知
    Append(AppendArgs),
    /// 清空通知日志
    Clear(ClearArgs),
    /// 设备 token 管理
    Token(TokenArgs),
    /// 用进程内消息服务模拟完整的通知流程
    Simulate(SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pushlog=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PushLogConfig::load_from(path)?,
        None => PushLogConfig::load()?,
    };
    let storage_path = cli.store.clone().unwrap_or_else(|| config.storage_path());
    debug!(path = %storage_path.display(), "Using storage file");
    let store = Arc::new(FileStore::new(storage_path));

    match cli.command {
        Commands::Log(args) => {
            let log = NotificationLog::new(store);
            handle_log(&log, args).await?;
        }
        Commands::Append(args) => {
            let log = Arc::new(NotificationLog::new(store).with_mode(config.append_mode));
            handle_append(log, args).await?;
        }
        Commands::Clear(args) => {
            let log = NotificationLog::new(store);
            handle_clear(&log, args).await?;
        }
        Commands::Token(args) => {
            handle_token(store, &config, args).await?;
        }
        Commands::Simulate(args) => {
            handle_simulate(store, &config, args).await?;
        }
    }

    Ok(())
}
