//! 播放命令和事件定义

use drift_catalog::SoundKey;
use serde::Serialize;

use crate::sleep_timer::{SleepDuration, SleepTimerStatus};

/// 播放器命令（命令源 -> 控制器）
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// 播放指定声音；`None` 表示当前声音
    Play(Option<SoundKey>),
    /// 渐出并暂停
    Pause,
    /// 播放/暂停切换
    Toggle,
    /// 停止并释放引擎
    Stop,
    /// 切换声音，未播放时只预加载
    SetSound(SoundKey),
    /// 重新发布当前快照
    RequestState,
    /// 设置睡眠定时器
    SetSleepTimer(SleepDuration),
    /// 睡眠定时器秒级节拍（由前台界面驱动）
    SleepTimerTick,
    /// 界面回到前台：重置去抖并重新发布状态
    Foreground,
    /// 关闭控制线程
    Shutdown,
}

impl PlayerCommand {
    /// 是否为用户发起的命令（需经过去抖闸门）
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            PlayerCommand::Play(_)
                | PlayerCommand::Pause
                | PlayerCommand::Toggle
                | PlayerCommand::Stop
                | PlayerCommand::SetSound(_)
                | PlayerCommand::SetSleepTimer(_)
        )
    }
}

/// 播放器事件（控制器 -> 观察者）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// 播放快照变更
    StateChanged(Snapshot),
    /// 睡眠定时器倒计时
    SleepTimer(SleepTimerStatus),
    /// 错误（加载失败等）
    Error(String),
}

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Stopped,
    Paused,
    FadingIn,
    Playing,
    FadingOut,
}

impl Status {
    /// 是否处于播放侧（渐入中也算）
    pub fn is_playing(&self) -> bool {
        matches!(self, Status::Playing | Status::FadingIn)
    }

    pub fn is_fading(&self) -> bool {
        matches!(self, Status::FadingIn | Status::FadingOut)
    }

    pub fn transport(&self) -> TransportState {
        match self {
            Status::Stopped => TransportState::Stopped,
            Status::Paused | Status::FadingOut => TransportState::Paused,
            Status::FadingIn | Status::Playing => TransportState::Playing,
        }
    }
}

/// 锁屏/媒体会话使用的三态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
}

/// 控制器内部状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaybackState {
    pub active_sound: Option<SoundKey>,
    pub status: Status,
    pub fade_in_progress: bool,
}

impl PlaybackState {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            playing: self.status.is_playing(),
            active_sound: self.active_sound.clone(),
        }
    }
}

/// 发布给观察者的最小状态
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Snapshot {
    pub playing: bool,
    pub active_sound: Option<SoundKey>,
}

/// 命令处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 状态已变更
    Applied,
    /// 命令被忽略
    Ignored(Ignored),
}

/// 忽略原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// 冷却窗口内的重复命令
    Debounced,
    /// 请求的状态已是当前状态
    Redundant,
    /// 没有可用的声音键
    NoSound,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}
