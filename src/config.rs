//! 配置 - `~/.config/pushlog/config.json`
//!
//! 所有字段都有默认值，文件不存在或缺字段时使用默认配置。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::notification::AppendMode;
use crate::transport::{ChannelConfig, PermissionOptions};

/// 目标平台
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Android,
    Ios,
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushLogConfig {
    /// 存储文件，默认 `~/.config/pushlog/storage.json`
    pub storage_path: Option<PathBuf>,
    pub append_mode: AppendMode,
    /// 后台消息处理时限（秒）
    pub background_deadline_secs: u64,
    pub platform: Platform,
    pub permissions: PermissionOptions,
    /// 启动时创建的渠道
    pub default_channel: ChannelConfig,
}

impl Default for PushLogConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            append_mode: AppendMode::default(),
            background_deadline_secs: 30,
            platform: Platform::default(),
            permissions: PermissionOptions::default(),
            default_channel: ChannelConfig::default(),
        }
    }
}

impl PushLogConfig {
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config/pushlog")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// 从默认位置加载
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// 从指定文件加载，文件不存在时返回默认配置
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("storage.json"))
    }

    pub fn background_deadline(&self) -> Duration {
        Duration::from_secs(self.background_deadline_secs)
    }
}
