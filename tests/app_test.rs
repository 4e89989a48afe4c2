//! 应用装配集成测试 - 各触发来源经由监听器写入日志，关闭后不再写入

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use pushlog::notification::{AppendMode, LocalNotification, NotificationSource, RemoteMessage};
use pushlog::storage::{KeyValueStore, MemoryStore, FCM_TOKEN_KEY};
use pushlog::transport::{
    AppState, AuthorizationStatus, InMemoryScheduler, LocalNotificationScheduler,
    LoopbackMessaging, MessagingTransport,
};
use pushlog::{NotificationApp, Platform, PushLogConfig};

type TestApp = NotificationApp<LoopbackMessaging, InMemoryScheduler, MemoryStore>;

fn serialized_config() -> PushLogConfig {
    PushLogConfig {
        append_mode: AppendMode::Serialized,
        ..Default::default()
    }
}

async fn start_app(
    transport: LoopbackMessaging,
    store: Arc<MemoryStore>,
    config: &PushLogConfig,
) -> (TestApp, Arc<LoopbackMessaging>, Arc<InMemoryScheduler>) {
    let transport = Arc::new(transport);
    let scheduler = Arc::new(InMemoryScheduler::new());
    let app = NotificationApp::start(transport.clone(), scheduler.clone(), store, config)
        .await
        .unwrap();
    (app, transport, scheduler)
}

#[tokio::test]
async fn test_start_registers_token_and_default_channel() {
    let store = Arc::new(MemoryStore::new());
    let (app, transport, scheduler) = start_app(
        LoopbackMessaging::new(Platform::Android),
        store.clone(),
        &serialized_config(),
    )
    .await;

    let saved = store.get_item(FCM_TOKEN_KEY).await.unwrap();
    assert!(saved.is_some());
    assert_eq!(saved, transport.current_token());
    assert_eq!(scheduler.get_channels().unwrap(), vec!["test-channel".to_string()]);
    assert!(scheduler.is_configured());
    assert!(app.subscription_count() >= 6);

    app.shutdown().await;
}

#[tokio::test]
async fn test_ios_start_registers_device_first() {
    let config = PushLogConfig {
        platform: Platform::Ios,
        ..serialized_config()
    };
    let (app, transport, scheduler) = start_app(
        LoopbackMessaging::new(Platform::Ios),
        Arc::new(MemoryStore::new()),
        &config,
    )
    .await;

    assert!(transport.is_device_registered_for_remote_messages());
    assert!(app.tokens().tokens().current().await.unwrap().is_some());
    // iOS 上调度器初始化时就请求权限
    assert!(scheduler.check_permissions().unwrap().alert);

    app.shutdown().await;
}

#[tokio::test]
async fn test_denied_permission_still_starts() {
    let (app, _transport, _) = start_app(
        LoopbackMessaging::new(Platform::Android).with_grant(AuthorizationStatus::Denied),
        Arc::new(MemoryStore::new()),
        &serialized_config(),
    )
    .await;

    assert!(app.tokens().tokens().current().await.unwrap().is_none());
    app.shutdown().await;
}

#[tokio::test]
async fn test_token_failure_does_not_abort_start() {
    let transport = LoopbackMessaging::new(Platform::Android);
    transport.fail_token_requests("SERVICE_NOT_AVAILABLE");

    let (app, _, _) = start_app(transport, Arc::new(MemoryStore::new()), &serialized_config()).await;

    assert!(app.tokens().tokens().current().await.unwrap().is_none());
    app.shutdown().await;
}

#[tokio::test]
async fn test_every_source_reaches_the_log() {
    let (app, transport, scheduler) = start_app(
        LoopbackMessaging::new(Platform::Android),
        Arc::new(MemoryStore::new()),
        &serialized_config(),
    )
    .await;

    // 前台
    transport
        .deliver(RemoteMessage::notification("fg", "body"))
        .await
        .unwrap();
    app.flush().await;

    // 后台（处理器完成后 deliver 才返回）
    transport.set_app_state(AppState::Background);
    transport
        .deliver(RemoteMessage::notification("bg", "body"))
        .await
        .unwrap();

    // 点击打开
    transport.open_notification(RemoteMessage::notification("open", "body"));
    app.flush().await;

    // 本地通知
    scheduler
        .add_notification_request(LocalNotification::new("local", "body"))
        .unwrap();
    app.flush().await;

    let records = app.log().read().await.unwrap();
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.source.unwrap(), r.title.clone().unwrap()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (NotificationSource::ForegroundPush, "fg".to_string()),
            (NotificationSource::BackgroundPush, "bg".to_string()),
            (NotificationSource::OpenedFromPush, "open".to_string()),
            (NotificationSource::LocalDelivery, "local".to_string()),
        ]
    );

    app.shutdown().await;
}

#[tokio::test]
async fn test_scheduled_local_notification_is_logged() {
    let (app, _, scheduler) = start_app(
        LoopbackMessaging::new(Platform::Android),
        Arc::new(MemoryStore::new()),
        &serialized_config(),
    )
    .await;

    scheduler
        .add_notification_request(
            LocalNotification::new("Alarm", "ring")
                .with_channel("test-channel")
                .fire_at(Utc::now() + ChronoDuration::milliseconds(50)),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    app.flush().await;

    let records = app.log().read().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, Some(NotificationSource::LocalDelivery));
    assert_eq!(records[0].body.as_deref(), Some("ring"));

    app.shutdown().await;
}

#[tokio::test]
async fn test_token_refresh_overwrites_stored_token() {
    let store = Arc::new(MemoryStore::new());
    let (app, transport, _) = start_app(
        LoopbackMessaging::new(Platform::Android),
        store.clone(),
        &serialized_config(),
    )
    .await;
    let first = store.get_item(FCM_TOKEN_KEY).await.unwrap().unwrap();

    let rotated = transport.refresh_token();
    app.flush().await;

    assert_ne!(first, rotated);
    assert_eq!(store.get_item(FCM_TOKEN_KEY).await.unwrap(), Some(rotated));
    app.shutdown().await;
}

#[tokio::test]
async fn test_sent_message_echoes_into_log() {
    let (app, transport, _) = start_app(
        LoopbackMessaging::new(Platform::Android),
        Arc::new(MemoryStore::new()),
        &serialized_config(),
    )
    .await;

    transport
        .send_message(RemoteMessage::sample_upstream())
        .await
        .unwrap();
    app.flush().await;

    let records = app.log().read().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title.as_deref(), Some("Un nuevo mensaje enviado"));
    app.shutdown().await;
}

#[tokio::test]
async fn test_background_deadline_loses_the_append() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(200)));
    let (app, transport, _) = start_app(
        LoopbackMessaging::new(Platform::Android).with_background_deadline(Duration::from_millis(20)),
        store,
        &serialized_config(),
    )
    .await;

    transport.set_app_state(AppState::Background);
    let result = transport
        .deliver(RemoteMessage::notification("late", "write"))
        .await;

    assert!(result.is_err());
    assert!(app.log().read().await.unwrap().is_empty());
    app.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_removes_listeners() {
    let store = Arc::new(MemoryStore::new());
    let (app, transport, scheduler) = start_app(
        LoopbackMessaging::new(Platform::Android),
        store.clone(),
        &serialized_config(),
    )
    .await;
    let log = app.log().clone();

    app.shutdown().await;

    transport
        .deliver(RemoteMessage::notification("after", "shutdown"))
        .await
        .unwrap();
    transport.set_app_state(AppState::Background);
    transport
        .deliver(RemoteMessage::notification("after", "shutdown"))
        .await
        .unwrap();
    scheduler
        .add_notification_request(LocalNotification::new("after", "shutdown"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(log.read().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initial_notification_is_not_logged() {
    let transport = LoopbackMessaging::new(Platform::Android);
    transport.set_app_state(AppState::Quit);
    transport.open_notification(RemoteMessage::notification("launch", "from quit"));

    let (app, transport, _) =
        start_app(transport, Arc::new(MemoryStore::new()), &serialized_config()).await;

    assert!(transport.get_initial_notification().await.unwrap().is_some());
    app.flush().await;
    assert!(app.log().read().await.unwrap().is_empty());
    app.shutdown().await;
}

#[tokio::test]
async fn test_delivery_reports_leave_log_and_token_alone() {
    let store = Arc::new(MemoryStore::new());
    let (app, transport, _) = start_app(
        LoopbackMessaging::new(Platform::Android),
        store.clone(),
        &serialized_config(),
    )
    .await;
    let token = store.get_item(FCM_TOKEN_KEY).await.unwrap();
    let listeners = transport.delete_messages();
    assert!(listeners >= 1);

    // send-error：发送失败，不回环投递
    transport.fail_next_send("quota exceeded");
    transport
        .send_message(RemoteMessage::sample_upstream())
        .await
        .unwrap();
    app.flush().await;
    assert!(app.log().read().await.unwrap().is_empty());

    // message-sent 之后只有回环投递的那一条，报告本身不写日志
    transport
        .send_message(RemoteMessage::notification("echo", "once"))
        .await
        .unwrap();
    app.flush().await;
    assert_eq!(app.log().read().await.unwrap().len(), 1);

    assert_eq!(store.get_item(FCM_TOKEN_KEY).await.unwrap(), token);

    app.shutdown().await;
    assert_eq!(transport.delete_messages(), 0);
}
