//! 通知载荷 - 远程消息和本地通知的数据形状，以及到 NotificationRecord 的归一化

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::record::{NotificationRecord, NotificationSource};

/// 远程消息里可显示的部分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// 消息服务投递的远程消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// 发送方（topic 或 sender id）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
    /// data-only 消息为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<RemoteNotification>,
    /// 发送时间（毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<i64>,
}

impl RemoteMessage {
    /// 带通知内容的消息
    pub fn notification(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            notification: Some(RemoteNotification {
                title: Some(title.into()),
                body: Some(body.into()),
            }),
            ..Default::default()
        }
    }

    /// title 和 body 都为空时得到 data-only 消息
    pub fn from_content(title: Option<String>, body: Option<String>) -> Self {
        if title.is_none() && body.is_none() {
            return Self::default();
        }
        Self {
            notification: Some(RemoteNotification { title, body }),
            ..Default::default()
        }
    }

    /// data-only 消息
    pub fn data_only(data: HashMap<String, String>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// 演示用的上行消息：data 带当前毫秒时间戳和固定 uid
    pub fn sample_upstream() -> Self {
        Self::notification(
            "Un nuevo mensaje enviado",
            "Se envio con la función sendMessage",
        )
        .with_data("loggedIn", Utc::now().timestamp_millis().to_string())
        .with_data("uid", "979586DFGHDFGH")
    }

    /// 归一化为日志记录，只保留 title/body
    pub fn to_record(&self, source: NotificationSource) -> NotificationRecord {
        let notification = self.notification.clone().unwrap_or_default();
        NotificationRecord {
            source: Some(source),
            title: notification.title,
            body: notification.body,
        }
    }
}

/// 重复触发时要匹配的日期分量（iOS `repeatsComponent`）
///
/// 匹配到的最大分量决定周期：只匹配秒时每分钟一次，匹配到时、分、秒时每天一次。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatsComponent {
    #[serde(default)]
    pub year: bool,
    #[serde(default)]
    pub month: bool,
    #[serde(default)]
    pub day: bool,
    #[serde(default)]
    pub day_of_week: bool,
    #[serde(default)]
    pub hour: bool,
    #[serde(default)]
    pub minute: bool,
    #[serde(default)]
    pub second: bool,
}

impl RepeatsComponent {
    /// `repeats` 没有给出分量时的默认值
    pub fn daily() -> Self {
        Self {
            hour: true,
            minute: true,
            second: true,
            ..Default::default()
        }
    }

    pub fn every_minute() -> Self {
        Self {
            second: true,
            ..Default::default()
        }
    }

    /// 上一次触发之后的下一次触发时间，匹配到年份或没有分量时不再重复
    pub fn next_after(&self, fired: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.year {
            None
        } else if self.month {
            fired.checked_add_months(Months::new(12))
        } else if self.day {
            fired.checked_add_months(Months::new(1))
        } else if self.day_of_week {
            fired.checked_add_signed(Duration::weeks(1))
        } else if self.hour {
            fired.checked_add_signed(Duration::days(1))
        } else if self.minute {
            fired.checked_add_signed(Duration::hours(1))
        } else if self.second {
            fired.checked_add_signed(Duration::minutes(1))
        } else {
            None
        }
    }
}

/// 本地通知请求
///
/// Android 和 iOS 的字段合在一起；iOS 请求里的 `body` 读作 `message`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    /// 为 None 时由调度器分配
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// 正文（归一化为 body）
    #[serde(default, alias = "body")]
    pub message: Option<String>,
    #[serde(default)]
    pub big_text: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub user_info: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub badge: Option<u32>,
    /// 不播放声音
    #[serde(default)]
    pub is_silent: bool,
    #[serde(default)]
    pub is_critical: bool,
    /// 为 None 时立即触发
    #[serde(default)]
    pub fire_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repeats: bool,
    #[serde(default)]
    pub repeats_component: Option<RepeatsComponent>,
    #[serde(default)]
    pub allow_while_idle: bool,
}

impl LocalNotification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// 按 `component` 周期重复
    pub fn repeating(mut self, component: RepeatsComponent) -> Self {
        self.repeats = true;
        self.repeats_component = Some(component);
        self
    }

    /// 重复规则；`repeats` 为 false 时为 None
    pub fn repeat_rule(&self) -> Option<RepeatsComponent> {
        self.repeats
            .then(|| self.repeats_component.unwrap_or_else(RepeatsComponent::daily))
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn fire_at(mut self, date: DateTime<Utc>) -> Self {
        self.fire_date = Some(date);
        self
    }

    /// 演示用的立即通知
    pub fn sample_immediate() -> Self {
        Self {
            id: Some("21".to_string()),
            channel_id: Some("test-channel".to_string()),
            title: Some("Titulo de la notification".to_string()),
            message: Some("Este es el mensaje de la notificación".to_string()),
            big_text: Some(
                "Este es un text grande que se va a desplegar por el usuario.".to_string(),
            ),
            color: Some("blue".to_string()),
            priority: Some("high".to_string()),
            ..Default::default()
        }
    }

    /// 演示用的定时通知（`delay` 之后触发）
    pub fn sample_scheduled(delay: Duration) -> Self {
        Self {
            channel_id: Some("test-channel".to_string()),
            title: Some("Alarm".to_string()),
            message: Some(format!(
                "Tu alarma sonará en {} segundos",
                delay.num_seconds()
            )),
            fire_date: Some(Utc::now() + delay),
            allow_while_idle: true,
            ..Default::default()
        }
    }

    /// 演示用的 iOS 重复通知：每分钟一次
    pub fn sample_repeat() -> Self {
        Self {
            id: Some("test-repeat".to_string()),
            title: Some("Repeacts".to_string()),
            message: Some("Se repitira cada minuto".to_string()),
            fire_date: Some(Utc::now() + Duration::seconds(1)),
            ..Default::default()
        }
        .repeating(RepeatsComponent::every_minute())
    }

    pub fn to_record(&self) -> NotificationRecord {
        NotificationRecord {
            source: Some(NotificationSource::LocalDelivery),
            title: self.title.clone(),
            body: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_to_record() {
        let message = RemoteMessage::notification("Hi", "There").with_message_id("m-1");
        let record = message.to_record(NotificationSource::ForegroundPush);
        assert_eq!(record.source, Some(NotificationSource::ForegroundPush));
        assert_eq!(record.title.as_deref(), Some("Hi"));
        assert_eq!(record.body.as_deref(), Some("There"));
    }

    #[test]
    fn test_data_only_message_is_silent_record() {
        let mut data = HashMap::new();
        data.insert("uid".to_string(), "42".to_string());
        let record = RemoteMessage::data_only(data).to_record(NotificationSource::BackgroundPush);
        assert!(record.is_silent());
    }

    #[test]
    fn test_remote_message_parses_sdk_shape() {
        let json = r#"{
            "messageId": "0:1",
            "from": "/topics/news",
            "data": {"uid": "1"},
            "notification": {"title": "T", "body": "B", "android": {"channelId": "c"}},
            "sentTime": 1700000000000
        }"#;
        let message: RemoteMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.message_id.as_deref(), Some("0:1"));
        assert_eq!(message.from.as_deref(), Some("/topics/news"));
        assert_eq!(message.sent_time, Some(1700000000000));
        assert_eq!(
            message.notification.unwrap().title.as_deref(),
            Some("T")
        );
    }

    #[test]
    fn test_local_notification_maps_message_to_body() {
        let record = LocalNotification::sample_immediate().to_record();
        assert_eq!(record.source, Some(NotificationSource::LocalDelivery));
        assert_eq!(record.title.as_deref(), Some("Titulo de la notification"));
        assert_eq!(
            record.body.as_deref(),
            Some("Este es el mensaje de la notificación")
        );
    }

    #[test]
    fn test_sample_upstream_carries_login_timestamp() {
        let message = RemoteMessage::sample_upstream();
        let logged_in: i64 = message.data["loggedIn"].parse().unwrap();
        assert!(logged_in > 0);
        assert_eq!(message.data["uid"], "979586DFGHDFGH");
    }

    #[test]
    fn test_sample_scheduled_is_in_the_future() {
        let notification = LocalNotification::sample_scheduled(Duration::seconds(20));
        assert!(notification.fire_date.unwrap() > Utc::now());
        assert!(notification.allow_while_idle);
    }

    #[test]
    fn test_ios_request_shape_parses() {
        let json = r#"{
            "id": "test-notification",
            "title": "Un nuevo curso",
            "subtitle": "Nuevo",
            "body": "Este es una  notification de test",
            "category": "Cursos",
            "threadId": "thread-id",
            "userInfo": {"name": "react", "date": "12::12:12"},
            "badge": 1,
            "isSilent": false,
            "isCritical": true,
            "repeats": true,
            "repeatsComponent": {"minute": false, "second": true}
        }"#;
        let request: LocalNotification = serde_json::from_str(json).unwrap();

        assert_eq!(request.id.as_deref(), Some("test-notification"));
        assert_eq!(request.subtitle.as_deref(), Some("Nuevo"));
        assert_eq!(request.category.as_deref(), Some("Cursos"));
        assert_eq!(request.thread_id.as_deref(), Some("thread-id"));
        assert_eq!(request.user_info["name"], "react");
        assert_eq!(request.badge, Some(1));
        assert!(request.is_critical && !request.is_silent);
        assert_eq!(request.repeat_rule(), Some(RepeatsComponent::every_minute()));
        assert_eq!(
            request.to_record().body.as_deref(),
            Some("Este es una  notification de test")
        );
    }

    #[test]
    fn test_repeat_rule_defaults_to_daily() {
        let once = LocalNotification::new("a", "b");
        assert_eq!(once.repeat_rule(), None);

        let mut daily = LocalNotification::new("a", "b");
        daily.repeats = true;
        assert_eq!(daily.repeat_rule(), Some(RepeatsComponent::daily()));
    }

    #[test]
    fn test_repeat_period_follows_largest_component() {
        let fired = Utc::now();
        assert_eq!(
            RepeatsComponent::every_minute().next_after(fired),
            Some(fired + Duration::minutes(1))
        );
        assert_eq!(
            RepeatsComponent::daily().next_after(fired),
            Some(fired + Duration::days(1))
        );
        let weekly = RepeatsComponent {
            day_of_week: true,
            ..RepeatsComponent::daily()
        };
        assert_eq!(weekly.next_after(fired), Some(fired + Duration::weeks(1)));
        let yearly = RepeatsComponent {
            year: true,
            ..Default::default()
        };
        assert_eq!(yearly.next_after(fired), None);
        assert_eq!(RepeatsComponent::default().next_after(fired), None);
    }
}
