//! 命令会话
//!
//! 把 [`PlayerCommand`] 分发给控制器：用户命令先经过去抖闸门，渐变按时钟差值推进。

use std::sync::Arc;

use log::debug;

use crate::adapter::AudioEngine;
use crate::clock::Clock;
use crate::command::{Ignored, PlayerCommand, Transition};
use crate::config::PlayerConfig;
use crate::controller::PlaybackController;
use crate::debounce::Debouncer;
use crate::PlayerError;

pub struct Session<E: AudioEngine> {
    controller: PlaybackController<E>,
    debouncer: Debouncer,
    clock: Arc<dyn Clock>,
    last_advance_ms: u64,
}

impl<E: AudioEngine> Session<E> {
    pub fn new(controller: PlaybackController<E>, config: &PlayerConfig, clock: Arc<dyn Clock>) -> Self {
        let last_advance_ms = clock.now_ms();
        Self {
            controller,
            debouncer: Debouncer::new(config.debounce_window()),
            clock,
            last_advance_ms,
        }
    }

    pub fn controller(&self) -> &PlaybackController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<E> {
        &mut self.controller
    }

    pub fn is_fading(&self) -> bool {
        self.controller.fader().is_active()
    }

    /// 处理一条命令
    ///
    /// 先把渐变推进到当前时刻，命令总是作用在最新的音量上。
    pub fn handle(&mut self, cmd: PlayerCommand) -> Result<Transition, PlayerError> {
        self.advance();

        if cmd.is_user_initiated() && !self.debouncer.allow(self.clock.now_ms()) {
            debug!("session: {:?} debounced", cmd);
            return Ok(Transition::Ignored(Ignored::Debounced));
        }

        let ctrl = &mut self.controller;
        match cmd {
            PlayerCommand::Play(key) => ctrl.play(key),
            PlayerCommand::Pause => Ok(ctrl.pause()),
            PlayerCommand::Toggle => ctrl.toggle(),
            PlayerCommand::Stop => Ok(ctrl.stop()),
            PlayerCommand::SetSound(key) => ctrl.set_sound(key),
            PlayerCommand::RequestState => {
                ctrl.request_state();
                Ok(Transition::Applied)
            }
            PlayerCommand::SetSleepTimer(duration) => Ok(ctrl.arm_sleep_timer(duration.as_seconds())),
            PlayerCommand::SleepTimerTick => {
                ctrl.sleep_tick();
                Ok(Transition::Applied)
            }
            PlayerCommand::Foreground => {
                self.debouncer.reset();
                ctrl.request_state();
                Ok(Transition::Applied)
            }
            PlayerCommand::Shutdown => {
                ctrl.shutdown();
                Ok(Transition::Applied)
            }
        }
    }

    /// 按距上次推进的时钟差值推进渐变
    pub fn advance(&mut self) {
        let now = self.clock.now_ms();
        let dt = now.saturating_sub(self.last_advance_ms);
        self.last_advance_ms = now;
        if dt > 0 {
            self.controller.advance(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::scripted::{EngineCall, ScriptedEngine};
    use crate::clock::ManualClock;
    use crate::command::Status;
    use crate::sleep_timer::SleepDuration;
    use crate::sync::SyncChannel;
    use drift_catalog::{SoundCatalog, SoundKey};

    fn session() -> (Session<ScriptedEngine>, ScriptedEngine, ManualClock) {
        let engine = ScriptedEngine::new();
        let clock = ManualClock::new(1_000);
        let config = PlayerConfig::default();
        let controller = PlaybackController::new(
            engine.clone(),
            Arc::new(SoundCatalog::builtin()),
            SyncChannel::default(),
            &config,
        );
        let session = Session::new(controller, &config, Arc::new(clock.clone()));
        (session, engine, clock)
    }

    fn ocean() -> PlayerCommand {
        PlayerCommand::Play(Some(SoundKey::from("ocean")))
    }

    #[test]
    fn test_rapid_toggles_are_debounced() {
        let (mut session, _engine, clock) = session();
        session.handle(ocean()).unwrap();
        clock.advance(400);

        assert_eq!(session.handle(PlayerCommand::Toggle).unwrap(), Transition::Applied);
        clock.advance(100);
        assert_eq!(
            session.handle(PlayerCommand::Toggle).unwrap(),
            Transition::Ignored(Ignored::Debounced)
        );
        assert_eq!(session.controller().status(), Status::FadingOut);
    }

    #[test]
    fn test_spaced_toggles_both_accepted() {
        let (mut session, _engine, clock) = session();
        session.handle(ocean()).unwrap();
        clock.advance(1_000);
        assert_eq!(session.controller().status(), Status::FadingIn);

        assert!(session.handle(PlayerCommand::Toggle).unwrap().is_applied());
        assert_eq!(session.controller().status(), Status::FadingOut);
        clock.advance(400);
        assert!(session.handle(PlayerCommand::Toggle).unwrap().is_applied());
        assert_eq!(session.controller().status(), Status::FadingIn);
    }

    #[test]
    fn test_window_is_shared_across_commands() {
        let (mut session, _engine, clock) = session();
        session.handle(ocean()).unwrap();
        clock.advance(200);
        assert_eq!(
            session.handle(PlayerCommand::Stop).unwrap(),
            Transition::Ignored(Ignored::Debounced)
        );
        assert_eq!(
            session
                .handle(PlayerCommand::SetSleepTimer(SleepDuration::Minutes(15)))
                .unwrap(),
            Transition::Ignored(Ignored::Debounced)
        );
        assert!(!session.controller().sleep_timer().is_armed());
    }

    #[test]
    fn test_system_commands_bypass_gate() {
        let (mut session, _engine, clock) = session();
        session.handle(ocean()).unwrap();
        clock.advance(10);
        assert_eq!(
            session.handle(PlayerCommand::SleepTimerTick).unwrap(),
            Transition::Applied
        );
        assert_eq!(
            session.handle(PlayerCommand::RequestState).unwrap(),
            Transition::Applied
        );
    }

    #[test]
    fn test_foreground_resets_gate() {
        let (mut session, _engine, clock) = session();
        session.handle(ocean()).unwrap();
        clock.advance(50);
        session.handle(PlayerCommand::Foreground).unwrap();
        assert_eq!(session.handle(PlayerCommand::Pause).unwrap(), Transition::Applied);
    }

    #[test]
    fn test_advance_follows_clock() {
        let (mut session, engine, clock) = session();
        session.handle(ocean()).unwrap();
        session.advance();
        assert_eq!(engine.count(|c| *c == EngineCall::Play), 0);

        clock.advance(400);
        session.advance();
        let mid = engine.last_volume().unwrap();
        assert!(mid > 0.0 && mid < 1.0);

        clock.advance(400);
        session.advance();
        assert_eq!(session.controller().status(), Status::Playing);
        assert_eq!(engine.last_volume(), Some(1.0));
        assert!(!session.is_fading());
    }

    #[test]
    fn test_shutdown_stops_playback() {
        let (mut session, engine, clock) = session();
        session.handle(ocean()).unwrap();
        clock.advance(50);
        session.handle(PlayerCommand::Shutdown).unwrap();
        assert_eq!(session.controller().status(), Status::Stopped);
        assert!(engine.loaded().is_none());
    }
}
