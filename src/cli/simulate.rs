//! simulate 命令 - 用回环消息服务和内存调度器跑一遍完整的通知流程
//!
//! 前台消息的摄入任务彼此并发，`unsynchronized` 模式下可以直接看到丢失的记录。

use anyhow::{ensure, Result};
use chrono::Duration as ChronoDuration;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::output::{format_output, format_records};
use crate::app::NotificationApp;
use crate::config::PushLogConfig;
use crate::notification::{AppendMode, LocalNotification, NotificationLog, RemoteMessage};
use crate::storage::KeyValueStore;
use crate::transport::{
    AppState, InMemoryScheduler, LocalNotificationScheduler, LoopbackMessaging, MessagingTransport,
};

/// 定时本地通知的最大延迟（一天）
pub const MAX_DELAY_SECS: u64 = 86_400;

/// simulate 命令参数
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// 前台消息数量
    #[arg(long, short, default_value = "5")]
    pub count: usize,

    /// 追加模式: unsynchronized, serialized（默认取配置文件）
    #[arg(long, short)]
    pub mode: Option<AppendMode>,

    /// 定时本地通知的延迟秒数（0 表示不发送，最大 86400）
    #[arg(long, short, default_value = "0", value_parser = clap::value_parser!(u64).range(0..=MAX_DELAY_SECS))]
    pub delay: u64,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// simulate 结果
#[derive(Debug, Serialize)]
pub struct SimulateOutput {
    pub mode: AppendMode,
    pub delivered: usize,
    pub logged: usize,
    pub lost: usize,
    pub token: Option<String>,
}

/// 处理 simulate 命令
pub async fn handle_simulate<S: KeyValueStore>(
    store: Arc<S>,
    config: &PushLogConfig,
    args: SimulateArgs,
) -> Result<()> {
    ensure!(
        args.delay <= MAX_DELAY_SECS,
        "--delay must be at most {} seconds",
        MAX_DELAY_SECS
    );

    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.append_mode = mode;
    }

    let baseline = NotificationLog::new(store.clone()).read().await?.len();

    let transport = Arc::new(
        LoopbackMessaging::new(config.platform)
            .with_background_deadline(config.background_deadline()),
    );
    let scheduler = Arc::new(InMemoryScheduler::new());
    let app = NotificationApp::start(transport.clone(), scheduler.clone(), store, &config).await?;

    let mut delivered = 0;

    // 前台
    for i in 1..=args.count {
        transport
            .deliver(RemoteMessage::notification(
                format!("Foreground #{}", i),
                "Delivered while the app is active",
            ))
            .await?;
        delivered += 1;
    }

    // 上行消息回环
    transport.send_message(RemoteMessage::sample_upstream()).await?;
    delivered += 1;

    // 后台：通知消息 + data-only 消息
    transport.set_app_state(AppState::Background);
    for message in [
        RemoteMessage::notification("Background", "Delivered while the app is in background"),
        RemoteMessage::default().with_data("uid", "979586DFGHDFGH"),
    ] {
        match transport.deliver(message).await {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "Background delivery failed"),
        }
        delivered += 1;
    }

    // 点击通知回到前台
    transport.open_notification(RemoteMessage::notification(
        "Opened",
        "The user tapped this notification",
    ));
    delivered += 1;

    transport.refresh_token();

    // 本地通知
    scheduler.add_notification_request(LocalNotification::sample_immediate())?;
    delivered += 1;
    if args.delay > 0 {
        // 上面已限制在一天以内，不会溢出
        let delay = ChronoDuration::seconds(args.delay as i64);
        scheduler.add_notification_request(LocalNotification::sample_scheduled(delay))?;
        delivered += 1;
        info!(seconds = args.delay, "Waiting for the scheduled notification");
        tokio::time::sleep(Duration::from_secs(args.delay) + Duration::from_millis(200)).await;
    }

    app.flush().await;
    let app_mode = app.log().mode();
    let records = app.log().read().await?;
    let token = app.tokens().tokens().current().await?;
    app.shutdown().await;

    let logged = records.len().saturating_sub(baseline);
    let output = SimulateOutput {
        mode: app_mode,
        delivered,
        logged,
        lost: delivered.saturating_sub(logged),
        token,
    };

    if args.json {
        println!("{}", format_output(&output));
    } else {
        let fresh = &records[baseline.min(records.len())..];
        println!("{}", format_records(fresh, baseline + 1, false));
        println!();
        println!(
            "mode: {:?}  delivered: {}  logged: {}  lost: {}",
            output.mode, output.delivered, output.logged, output.lost
        );
    }
    Ok(())
}
