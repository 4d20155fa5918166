//! 睡眠定时器
//!
//! 以整秒倒计时，只在播放进行时递减，暂停期间保持剩余秒数不变。归零时触发一次截止并自动解除。
//! 倒计时由宿主每秒调用 [`SleepTimer::tick`] 驱动，宿主不再调用时倒计时即停滞。

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// 倒计时状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SleepTimerStatus {
    pub armed: bool,
    pub remaining_seconds: u64,
}

/// 睡眠定时器
#[derive(Debug, Clone, Default)]
pub struct SleepTimer {
    remaining_seconds: u64,
    armed: bool,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重新设定时长；0 等同于取消
    pub fn arm(&mut self, duration_seconds: u64) {
        self.remaining_seconds = duration_seconds;
        self.armed = duration_seconds > 0;
    }

    pub fn cancel(&mut self) {
        self.remaining_seconds = 0;
        self.armed = false;
    }

    /// 每秒调用一次，返回本次是否到达截止
    pub fn tick(&mut self, playback_active: bool) -> bool {
        if !self.armed || !playback_active {
            return false;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn status(&self) -> SleepTimerStatus {
        SleepTimerStatus {
            armed: self.armed,
            remaining_seconds: self.remaining_seconds,
        }
    }
}

/// 用户可选的睡眠时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDuration {
    Off,
    Minutes(u32),
    Custom { hours: u32, minutes: u32 },
}

impl SleepDuration {
    /// 对话框中的预设项
    pub const PRESETS: [SleepDuration; 4] = [
        SleepDuration::Off,
        SleepDuration::Minutes(15),
        SleepDuration::Minutes(30),
        SleepDuration::Minutes(60),
    ];

    /// 自定义时长，超过 59 的分钟数进位到小时
    pub fn custom(hours: u32, minutes: u32) -> Self {
        if hours == 0 && minutes == 0 {
            return SleepDuration::Off;
        }
        SleepDuration::Custom {
            hours: hours.saturating_add(minutes / 60),
            minutes: minutes % 60,
        }
    }

    pub fn as_seconds(&self) -> u64 {
        match *self {
            SleepDuration::Off => 0,
            SleepDuration::Minutes(m) => u64::from(m) * 60,
            SleepDuration::Custom { hours, minutes } => {
                u64::from(hours) * 3600 + u64::from(minutes) * 60
            }
        }
    }
}

impl fmt::Display for SleepDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SleepDuration::Off => f.write_str("off"),
            SleepDuration::Minutes(m) => write!(f, "{}m", m),
            SleepDuration::Custom { hours, minutes } => {
                let total = u64::from(hours) * 60 + u64::from(minutes);
                write!(f, "{}h{}m", total / 60, total % 60)
            }
        }
    }
}

/// 时长解析错误
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Invalid sleep duration: {0:?} (expected off, <minutes>, <h>h, <m>m or <h>h<m>m)")]
pub struct ParseSleepDurationError(String);

impl FromStr for SleepDuration {
    type Err = ParseSleepDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let invalid = || ParseSleepDurationError(s.to_owned());

        if text == "off" {
            return Ok(SleepDuration::Off);
        }
        if let Ok(minutes) = text.parse::<u32>() {
            return Ok(if minutes == 0 {
                SleepDuration::Off
            } else {
                SleepDuration::Minutes(minutes)
            });
        }

        let (hours, rest) = match text.split_once('h') {
            Some((h, rest)) => (h.parse::<u32>().map_err(|_| invalid())?, rest),
            None => (0, text.as_str()),
        };
        let minutes = if rest.is_empty() {
            0
        } else {
            rest.strip_suffix('m')
                .and_then(|m| m.parse::<u32>().ok())
                .ok_or_else(invalid)?
        };

        Ok(SleepDuration::custom(hours, minutes))
    }
}
