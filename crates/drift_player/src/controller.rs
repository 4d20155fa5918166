//! 播放控制器
//!
//! 唯一持有播放状态、渐变和睡眠定时器的状态机。所有命令在同一执行上下文中串行处理，
//! 引擎只由控制器调用。
//!
//! 状态迁移：
//! - `Stopped/Paused/FadingOut --play--> FadingIn --渐变完成--> Playing`
//! - `Playing/FadingIn --pause--> FadingOut --渐变完成--> Paused`
//! - `任意 --stop--> Stopped`

use std::sync::Arc;

use drift_catalog::{SoundCatalog, SoundKey};
use log::{debug, info, warn};

use crate::adapter::AudioEngine;
use crate::command::{Ignored, PlaybackState, PlayerEvent, Snapshot, Status, Transition};
use crate::config::PlayerConfig;
use crate::fade::{FadeDirection, FadeStep, Fader};
use crate::sleep_timer::SleepTimer;
use crate::sync::SyncChannel;
use crate::PlayerError;

pub struct PlaybackController<E: AudioEngine> {
    engine: E,
    catalog: Arc<SoundCatalog>,
    sync: SyncChannel,
    fader: Fader,
    sleep_timer: SleepTimer,
    fade_duration_ms: u64,
    status: Status,
    /// 当前声音，同时也是引擎中已加载的资源
    active_sound: Option<SoundKey>,
    volume: f32,
    last_published: Snapshot,
}

impl<E: AudioEngine> PlaybackController<E> {
    pub fn new(engine: E, catalog: Arc<SoundCatalog>, sync: SyncChannel, config: &PlayerConfig) -> Self {
        Self {
            engine,
            catalog,
            sync,
            fader: Fader::new(),
            sleep_timer: SleepTimer::new(),
            fade_duration_ms: config.fade_duration_ms,
            status: Status::Stopped,
            active_sound: None,
            volume: 0.0,
            last_published: Snapshot::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            active_sound: self.active_sound.clone(),
            status: self.status,
            fade_in_progress: self.fader.is_active(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            playing: self.status.is_playing(),
            active_sound: self.active_sound.clone(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn active_sound(&self) -> Option<&SoundKey> {
        self.active_sound.as_ref()
    }

    /// 最近一次写入引擎的音量
    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn sleep_timer(&self) -> &SleepTimer {
        &self.sleep_timer
    }

    pub fn fader(&self) -> &Fader {
        &self.fader
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn sync(&self) -> &SyncChannel {
        &self.sync
    }

    /// 播放 `key`；`None` 时播放当前声音
    pub fn play(&mut self, key: Option<SoundKey>) -> Result<Transition, PlayerError> {
        let Some(target) = key.or_else(|| self.active_sound.clone()) else {
            debug!("controller: play ignored, no sound selected");
            return Ok(Transition::Ignored(Ignored::NoSound));
        };

        if self.active_sound.as_ref() == Some(&target) && self.status.is_playing() {
            return Ok(Transition::Ignored(Ignored::Redundant));
        }

        self.prepare(&target)?;
        self.start_fade(FadeDirection::In);
        Ok(Transition::Applied)
    }

    /// 渐出后暂停引擎（不释放）
    pub fn pause(&mut self) -> Transition {
        if !self.status.is_playing() {
            return Transition::Ignored(Ignored::Redundant);
        }

        self.start_fade(FadeDirection::Out);
        Transition::Applied
    }

    pub fn toggle(&mut self) -> Result<Transition, PlayerError> {
        if self.status.is_playing() {
            Ok(self.pause())
        } else {
            self.play(None)
        }
    }

    /// 取消渐变，释放引擎并清除当前声音；会话结束，睡眠定时器一并取消
    pub fn stop(&mut self) -> Transition {
        if self.status == Status::Stopped
            && self.active_sound.is_none()
            && !self.sleep_timer.is_armed()
        {
            return Transition::Ignored(Ignored::Redundant);
        }

        self.release_engine();
        self.status = Status::Stopped;
        info!("controller: stopped");
        self.publish_state();

        if self.sleep_timer.is_armed() {
            self.sleep_timer.cancel();
            self.publish_sleep_timer();
        }
        Transition::Applied
    }

    /// 切换声音：播放中等同于 `play(key)`，否则只静默预加载
    pub fn set_sound(&mut self, key: SoundKey) -> Result<Transition, PlayerError> {
        if self.active_sound.as_ref() == Some(&key) {
            return Ok(Transition::Ignored(Ignored::Redundant));
        }

        if self.status.is_playing() {
            return self.play(Some(key));
        }

        self.prepare(&key)?;
        // 旧声音的渐出已随引擎释放一起取消
        if self.status == Status::FadingOut {
            self.status = Status::Paused;
        }
        self.publish_state();
        Ok(Transition::Applied)
    }

    /// 向所有观察者重新发布当前状态
    pub fn request_state(&mut self) {
        let snapshot = self.snapshot();
        self.last_published = snapshot.clone();
        self.sync.publish(PlayerEvent::StateChanged(snapshot));
        self.publish_sleep_timer();
    }

    /// 设定睡眠定时器；0 秒即取消
    pub fn arm_sleep_timer(&mut self, seconds: u64) -> Transition {
        self.sleep_timer.arm(seconds);
        if seconds > 0 {
            info!("controller: sleep timer armed for {}s", seconds);
        } else {
            info!("controller: sleep timer off");
        }
        self.publish_sleep_timer();
        Transition::Applied
    }

    /// 睡眠定时器秒级节拍，到期时发出一次暂停；返回是否到期
    pub fn sleep_tick(&mut self) -> bool {
        if !self.sleep_timer.is_armed() {
            return false;
        }

        let before = self.sleep_timer.remaining_seconds();
        let expired = self.sleep_timer.tick(self.status.is_playing());
        if self.sleep_timer.remaining_seconds() != before {
            self.publish_sleep_timer();
        }

        if expired {
            info!("controller: sleep timer expired");
            self.pause();
        }
        expired
    }

    /// 推进渐变 `dt_ms` 毫秒并把音量写入引擎
    pub fn advance(&mut self, dt_ms: u64) {
        let Some(step) = self.fader.tick(dt_ms) else {
            return;
        };

        let value = step.value();
        if step.direction() == FadeDirection::In && !self.engine.is_active() {
            // 渐入的第一个采样之前必须先启动引擎
            self.engine.play();
        }
        self.engine.set_volume(value);
        self.volume = value;

        if let FadeStep::Complete { direction, .. } = step {
            match direction {
                FadeDirection::In => {
                    self.status = Status::Playing;
                    debug!("controller: fade-in complete");
                }
                FadeDirection::Out => {
                    self.engine.pause();
                    self.status = Status::Paused;
                    debug!("controller: fade-out complete, engine paused");
                }
            }
            self.publish_state();
        }
    }

    /// 会话结束：停止播放并取消睡眠定时器
    pub fn shutdown(&mut self) {
        self.stop();
    }

    /// 把错误推送给观察者
    pub fn report_error(&self, error: &PlayerError) {
        self.sync.publish(PlayerEvent::Error(error.to_string()));
    }

    /// 确保 `key` 已加载到引擎；不同的键会先释放旧资源
    fn prepare(&mut self, key: &SoundKey) -> Result<(), PlayerError> {
        if self.active_sound.as_ref() == Some(key) {
            return Ok(());
        }

        let Some(item) = self.catalog.get_by_key(key.as_str()) else {
            warn!("controller: unknown sound {}", key);
            return Err(PlayerError::UnknownSound(key.clone()));
        };
        let asset = item.asset.clone();

        self.release_engine();
        match self.engine.load(&asset) {
            Ok(()) => {
                self.engine.set_volume(0.0);
                self.volume = 0.0;
                self.active_sound = Some(key.clone());
                info!("controller: loaded {} from {}", key, asset.display());
                Ok(())
            }
            Err(source) => {
                warn!("controller: failed to load {}: {}", key, source);
                self.status = Status::Stopped;
                self.publish_state();
                Err(PlayerError::EngineLoad {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    /// 先取消渐变再释放引擎，渐变回调不会落在已释放的引擎上
    fn release_engine(&mut self) {
        self.fader.cancel();
        if let Some(key) = self.active_sound.take() {
            self.engine.release();
            debug!("controller: released {}", key);
        }
        self.volume = 0.0;
    }

    fn start_fade(&mut self, direction: FadeDirection) {
        let (target, status) = match direction {
            FadeDirection::In => (1.0, Status::FadingIn),
            FadeDirection::Out => (0.0, Status::FadingOut),
        };
        self.fader
            .start(direction, self.volume, target, self.fade_duration_ms);
        self.status = status;
        debug!(
            "controller: {:?} {:.2} -> {:.2} over {}ms",
            status, self.volume, target, self.fade_duration_ms
        );
        self.publish_state();
    }

    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        if snapshot == self.last_published {
            return;
        }
        debug!(
            "controller: publish playing={} sound={:?}",
            snapshot.playing,
            snapshot.active_sound.as_ref().map(SoundKey::as_str)
        );
        self.last_published = snapshot.clone();
        self.sync.publish(PlayerEvent::StateChanged(snapshot));
    }

    fn publish_sleep_timer(&self) {
        self.sync
            .publish(PlayerEvent::SleepTimer(self.sleep_timer.status()));
    }
}
