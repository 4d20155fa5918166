//! 音量渐变
//!
//! [`Fader`] 是带标签的渐变状态：`Idle` 或 `InProgress`。启动新渐变会先同步取消旧渐变，
//! 完成事件只会由仍在进行中的渐变产生，取消后的渐变不会再产生任何步进。

use std::f32::consts::PI;

/// 默认渐变时长
pub const FADE_DURATION_MS: u64 = 800;

/// 先加速后减速的缓动曲线：0.5 × (1 - cos(π × t))
pub fn accelerate_decelerate(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    0.5 * (1.0 - (PI * t).cos())
}

/// 一次有界渐变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeTransition {
    pub from: f32,
    pub to: f32,
    pub duration_ms: u64,
    pub elapsed_ms: u64,
}

impl FadeTransition {
    pub fn new(from: f32, to: f32, duration_ms: u64) -> Self {
        Self {
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            duration_ms,
            elapsed_ms: 0,
        }
    }

    /// 归一化进度 (0.0 - 1.0)
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        (self.elapsed_ms as f32 / self.duration_ms as f32).min(1.0)
    }

    /// 当前插值
    pub fn value(&self) -> f32 {
        if self.is_finished() {
            return self.to;
        }
        self.from + (self.to - self.from) * accelerate_decelerate(self.progress())
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    fn advance(&mut self, dt_ms: u64) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms).min(self.duration_ms);
    }
}

/// 渐变方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// 渐变编号，每次 `start` 递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FadeId(u64);

/// 一次推进的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    Tick {
        id: FadeId,
        direction: FadeDirection,
        value: f32,
    },
    Complete {
        id: FadeId,
        direction: FadeDirection,
        value: f32,
    },
}

impl FadeStep {
    pub fn value(&self) -> f32 {
        match self {
            FadeStep::Tick { value, .. } | FadeStep::Complete { value, .. } => *value,
        }
    }

    pub fn direction(&self) -> FadeDirection {
        match self {
            FadeStep::Tick { direction, .. } | FadeStep::Complete { direction, .. } => *direction,
        }
    }
}

#[derive(Debug, Default)]
enum FadeState {
    #[default]
    Idle,
    InProgress {
        id: FadeId,
        direction: FadeDirection,
        transition: FadeTransition,
    },
}

/// 渐变驱动器，同一时刻最多一个渐变存活
#[derive(Debug, Default)]
pub struct Fader {
    state: FadeState,
    next_id: u64,
}

impl Fader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动渐变，先取消正在进行的渐变
    pub fn start(&mut self, direction: FadeDirection, from: f32, to: f32, duration_ms: u64) -> FadeId {
        self.cancel();
        self.next_id += 1;
        let id = FadeId(self.next_id);
        self.state = FadeState::InProgress {
            id,
            direction,
            transition: FadeTransition::new(from, to, duration_ms),
        };
        id
    }

    /// 取消当前渐变，返回被取消的编号；空闲时为 no-op
    pub fn cancel(&mut self) -> Option<FadeId> {
        match std::mem::take(&mut self.state) {
            FadeState::InProgress { id, .. } => Some(id),
            FadeState::Idle => None,
        }
    }

    /// 推进 `dt_ms` 毫秒；空闲时返回 `None`
    pub fn tick(&mut self, dt_ms: u64) -> Option<FadeStep> {
        let (id, direction, value, finished) = match &mut self.state {
            FadeState::Idle => return None,
            FadeState::InProgress {
                id,
                direction,
                transition,
            } => {
                transition.advance(dt_ms);
                (*id, *direction, transition.value(), transition.is_finished())
            }
        };

        if finished {
            self.state = FadeState::Idle;
            Some(FadeStep::Complete {
                id,
                direction,
                value,
            })
        } else {
            Some(FadeStep::Tick {
                id,
                direction,
                value,
            })
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, FadeState::InProgress { .. })
    }

    pub fn active_id(&self) -> Option<FadeId> {
        match &self.state {
            FadeState::InProgress { id, .. } => Some(*id),
            FadeState::Idle => None,
        }
    }

    pub fn direction(&self) -> Option<FadeDirection> {
        match &self.state {
            FadeState::InProgress { direction, .. } => Some(*direction),
            FadeState::Idle => None,
        }
    }

    pub fn transition(&self) -> Option<&FadeTransition> {
        match &self.state {
            FadeState::InProgress { transition, .. } => Some(transition),
            FadeState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_endpoints_and_monotonic() {
        assert_eq!(accelerate_decelerate(0.0), 0.0);
        assert!((accelerate_decelerate(1.0) - 1.0).abs() < 1e-6);
        assert!((accelerate_decelerate(0.5) - 0.5).abs() < 1e-6);

        let mut prev = 0.0;
        for i in 1..=100 {
            let v = accelerate_decelerate(i as f32 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
        // 起步慢于线性
        assert!(accelerate_decelerate(0.1) < 0.1);
    }

    #[test]
    fn test_fade_in_completes_once() {
        let mut fader = Fader::new();
        let id = fader.start(FadeDirection::In, 0.0, 1.0, FADE_DURATION_MS);

        let mut ticks = 0;
        let mut completions = 0;
        for _ in 0..20 {
            match fader.tick(100) {
                Some(FadeStep::Tick { id: tick_id, value, .. }) => {
                    assert_eq!(tick_id, id);
                    assert!((0.0..1.0).contains(&value));
                    ticks += 1;
                }
                Some(FadeStep::Complete { id: done_id, value, .. }) => {
                    assert_eq!(done_id, id);
                    assert_eq!(value, 1.0);
                    completions += 1;
                }
                None => {}
            }
        }

        assert_eq!(ticks, 7);
        assert_eq!(completions, 1);
        assert!(!fader.is_active());
    }

    #[test]
    fn test_fade_out_values_descend() {
        let mut fader = Fader::new();
        fader.start(FadeDirection::Out, 0.6, 0.0, 400);

        let first = fader.tick(100).unwrap().value();
        let second = fader.tick(100).unwrap().value();
        assert!(first < 0.6 && second < first);

        let last = fader.tick(500).unwrap();
        assert!(matches!(last, FadeStep::Complete { direction: FadeDirection::Out, .. }));
        assert_eq!(last.value(), 0.0);
    }

    #[test]
    fn test_start_supersedes_previous() {
        let mut fader = Fader::new();
        let old = fader.start(FadeDirection::In, 0.0, 1.0, 800);
        fader.tick(400);
        let current = fader.transition().unwrap().value();

        let new = fader.start(FadeDirection::Out, current, 0.0, 800);
        assert_ne!(old, new);
        assert_eq!(fader.active_id(), Some(new));

        let mut completed = Vec::new();
        while let Some(step) = fader.tick(100) {
            if let FadeStep::Complete { id, .. } = step {
                completed.push(id);
            }
        }
        assert_eq!(completed, vec![new]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut fader = Fader::new();
        assert_eq!(fader.cancel(), None);

        let id = fader.start(FadeDirection::In, 0.0, 1.0, 800);
        assert_eq!(fader.cancel(), Some(id));
        assert_eq!(fader.cancel(), None);
        assert_eq!(fader.tick(1_000), None);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let mut fader = Fader::new();
        fader.start(FadeDirection::In, 0.2, 1.0, 0);
        assert!(matches!(fader.tick(0), Some(FadeStep::Complete { value, .. }) if value == 1.0));
        assert_eq!(fader.tick(0), None);
    }

    #[test]
    fn test_transition_clamps_inputs() {
        let t = FadeTransition::new(-0.5, 2.0, 100);
        assert_eq!(t.from, 0.0);
        assert_eq!(t.to, 1.0);
        assert_eq!(t.value(), 0.0);
    }
}
