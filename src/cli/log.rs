//! log / append / clear 命令 - 查看和维护持久化的通知日志

use anyhow::{ensure, Result};
use clap::Args;
use dialoguer::Confirm;
use std::sync::Arc;
use tracing::warn;

use super::output::format_records;
use crate::notification::{
    LocalNotification, NotificationIngestor, NotificationLog, NotificationSource, RemoteMessage,
};
use crate::storage::KeyValueStore;

/// log 命令参数
#[derive(Args, Debug)]
pub struct LogArgs {
    /// 只显示最近 N 条（至少 1）
    #[arg(long, short, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// append 命令参数
#[derive(Args, Debug)]
pub struct AppendArgs {
    /// 来源: foreground, background, opened, local
    #[arg(long, short, default_value = "foreground")]
    pub source: NotificationSource,

    /// 标题
    #[arg(long, short)]
    pub title: Option<String>,

    /// 正文
    #[arg(long, short)]
    pub body: Option<String>,
}

/// clear 命令参数
#[derive(Args, Debug)]
pub struct ClearArgs {
    /// 跳过确认
    #[arg(long, short)]
    pub yes: bool,
}

/// 处理 log 命令
pub async fn handle_log<S: KeyValueStore>(log: &NotificationLog<S>, args: LogArgs) -> Result<()> {
    let (records, first_index) = match args.limit {
        Some(n) => {
            ensure!(n > 0, "--limit must be at least 1");
            let n = usize::try_from(n).unwrap_or(usize::MAX);
            let all = log.read().await?;
            let start = all.len().saturating_sub(n);
            (all[start..].to_vec(), start + 1)
        }
        None => (log.read().await?, 1),
    };

    println!("{}", format_records(&records, first_index, args.json));
    Ok(())
}

/// 处理 append 命令：按来源走对应的触发入口
pub async fn handle_append<S: KeyValueStore>(
    log: Arc<NotificationLog<S>>,
    args: AppendArgs,
) -> Result<()> {
    let ingestor = NotificationIngestor::new(log.clone());

    match args.source {
        NotificationSource::LocalDelivery => {
            let notification = LocalNotification {
                title: args.title,
                message: args.body,
                ..Default::default()
            };
            ingestor.on_local_notification(&notification).await?;
        }
        source => {
            let message = RemoteMessage::from_content(args.title, args.body);
            match source {
                NotificationSource::BackgroundPush => {
                    ingestor.on_background_message(&message).await?
                }
                NotificationSource::OpenedFromPush => {
                    ingestor.on_notification_opened_app(&message).await?
                }
                _ => ingestor.on_foreground_message(&message).await?,
            }
        }
    }

    let total = log.read().await?.len();
    println!("Appended {} notification ({} stored)", args.source, total);
    Ok(())
}

/// 处理 clear 命令
pub async fn handle_clear<S: KeyValueStore>(log: &NotificationLog<S>, args: ClearArgs) -> Result<()> {
    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Delete every stored notification?")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if let Err(e) = log.clear().await {
        // 存储文件本身无法解析时，只能整体重置
        warn!(error = %e, "Removing the log failed, resetting the whole store");
        log.store().clear().await?;
    }
    println!("Notification log cleared.");
    Ok(())
}
