//! 日志渲染 - 把记录转换为终端可读的文本

use super::record::{NotificationRecord, NotificationSource};

/// Display labels
pub mod msg {
    pub const SILENT_PUSH: &str = "(silent push)";
    pub const NO_TITLE: &str = "(no title)";
    pub const EMPTY_LOG: &str = "No messages stored yet.";
    pub const UNTAGGED: &str = "legacy";
}

/// 日志格式化器
#[derive(Debug, Default, Clone)]
pub struct LogFormatter {
    /// 正文最大显示长度（字符），0 表示不截断
    max_body_chars: usize,
}

impl LogFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_body_chars(mut self, max: usize) -> Self {
        self.max_body_chars = max;
        self
    }

    pub fn source_label(source: Option<NotificationSource>) -> &'static str {
        source.map(|s| s.as_str()).unwrap_or(msg::UNTAGGED)
    }

    /// 单条记录：`#1 [foreground] Title` 下一行缩进正文
    pub fn format_record(&self, index: usize, record: &NotificationRecord) -> String {
        let label = Self::source_label(record.source);
        if record.is_silent() {
            return format!("#{} [{}] {}", index, label, msg::SILENT_PUSH);
        }

        let title = record.title.as_deref().unwrap_or(msg::NO_TITLE);
        match record.body.as_deref() {
            Some(body) => format!(
                "#{} [{}] {}\n    {}",
                index,
                label,
                title,
                self.truncate(body)
            ),
            None => format!("#{} [{}] {}", index, label, title),
        }
    }

    /// 整个日志，序号从 `first_index` 开始
    pub fn format_log(&self, records: &[NotificationRecord], first_index: usize) -> String {
        if records.is_empty() {
            return msg::EMPTY_LOG.to_string();
        }

        records
            .iter()
            .enumerate()
            .map(|(i, record)| self.format_record(first_index + i, record))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn truncate(&self, body: &str) -> String {
        let body = body.trim();
        if self.max_body_chars == 0 || body.chars().count() <= self.max_body_chars {
            return body.to_string();
        }
        let kept: String = body
            .chars()
            .take(self.max_body_chars.saturating_sub(3))
            .collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record_with_body() {
        let record = NotificationRecord::new(NotificationSource::ForegroundPush)
            .with_title("Hi")
            .with_body("There");
        assert_eq!(
            LogFormatter::new().format_record(1, &record),
            "#1 [foreground] Hi\n    There"
        );
    }

    #[test]
    fn test_format_silent_and_legacy() {
        let silent = NotificationRecord::new(NotificationSource::BackgroundPush);
        assert_eq!(
            LogFormatter::new().format_record(2, &silent),
            "#2 [background] (silent push)"
        );

        let legacy = NotificationRecord::untagged(None, Some("only body".into()));
        assert_eq!(
            LogFormatter::new().format_record(3, &legacy),
            "#3 [legacy] (no title)\n    only body"
        );
    }

    #[test]
    fn test_truncate_counts_chars() {
        let record = NotificationRecord::new(NotificationSource::LocalDelivery)
            .with_title("Alarm")
            .with_body("Tu alarma sonará en 20 segundos");
        let text = LogFormatter::new()
            .with_max_body_chars(10)
            .format_record(1, &record);
        assert!(text.ends_with("Tu alar..."));
    }

    #[test]
    fn test_format_empty_log() {
        assert_eq!(LogFormatter::new().format_log(&[], 1), msg::EMPTY_LOG);
    }

    #[test]
    fn test_format_log_numbers_from_offset() {
        let records = vec![
            NotificationRecord::new(NotificationSource::ForegroundPush).with_title("a"),
            NotificationRecord::new(NotificationSource::OpenedFromPush).with_title("b"),
        ];
        let text = LogFormatter::new().format_log(&records, 5);
        assert_eq!(text, "#5 [foreground] a\n#6 [opened] b");
    }
}
