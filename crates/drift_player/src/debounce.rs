//! 命令去抖
//!
//! 所有用户发起的命令共用一个闸门：距上一次放行不足冷却窗口的命令直接丢弃。

use std::time::Duration;

/// 默认冷却窗口
pub const DEBOUNCE_WINDOW_MS: u64 = 350;

/// 去抖闸门
///
/// 只记录上一次放行的时间戳，不区分命令类型。调用方需保证单写者。
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            last_accepted_ms: None,
        }
    }

    /// 判断 `now_ms` 时刻的命令能否放行，放行时记录时间戳
    pub fn allow(&mut self, now_ms: u64) -> bool {
        let accepted = match self.last_accepted_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.window_ms,
        };

        if accepted {
            self.last_accepted_ms = Some(now_ms);
        }
        accepted
    }

    /// 清除冷却状态（界面回到前台时调用）
    pub fn reset(&mut self) {
        self.last_accepted_ms = None;
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEBOUNCE_WINDOW_MS))
    }
}
