//! 播放器配置

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::debounce::DEBOUNCE_WINDOW_MS;
use crate::fade::FADE_DURATION_MS;
use crate::sync::DEFAULT_EVENT_CAPACITY;

/// 配置错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// 播放器配置，缺省字段取默认值
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// 渐入/渐出时长
    pub fade_duration_ms: u64,
    /// 去抖冷却窗口
    pub debounce_window_ms: u64,
    /// 渐变调度周期
    pub tick_interval_ms: u64,
    /// 命令队列容量
    pub command_capacity: usize,
    /// 每个订阅者的事件队列容量
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: FADE_DURATION_MS,
            debounce_window_ms: DEBOUNCE_WINDOW_MS,
            tick_interval_ms: 16,
            command_capacity: 32,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    /// 调度周期，至少 1ms
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.fade_duration(), Duration::from_millis(800));
        assert_eq!(config.debounce_window(), Duration::from_millis(350));
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_partial_json() {
        let config = PlayerConfig::from_json_str(r#"{"fade_duration_ms": 1200, "tick_interval_ms": 0}"#)
            .unwrap();
        assert_eq!(config.fade_duration_ms, 1200);
        assert_eq!(config.debounce_window_ms, 350);
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PlayerConfig::from_json_str(r#"{"fade_ms": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
