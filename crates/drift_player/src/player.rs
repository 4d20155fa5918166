//! 播放线程
//!
//! 控制器、引擎和去抖闸门都活在同一个线程上，外部只通过命令通道和同步通道交互。

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use drift_catalog::{SoundCatalog, SoundKey};
use log::{debug, info, warn};

use crate::adapter::{AudioEngine, EngineError};
use crate::clock::{Clock, MonotonicClock};
use crate::command::{PlayerCommand, Snapshot};
use crate::config::PlayerConfig;
use crate::controller::PlaybackController;
use crate::session::Session;
use crate::sleep_timer::{SleepDuration, SleepTimerStatus};
use crate::sync::{Subscription, SubscriptionId, SyncChannel};
use crate::PlayerError;

const THREAD_NAME: &str = "drift-player";

/// 播放线程句柄，drop 时关闭线程
pub struct PlayerHandle {
    cmd_tx: Sender<PlayerCommand>,
    sync: SyncChannel,
    thread: Option<JoinHandle<()>>,
}

/// 启动播放线程
///
/// `factory` 在播放线程上构造引擎，构造失败时返回 [`PlayerError::EngineInit`]。
pub fn spawn_player<E, F>(
    factory: F,
    catalog: Arc<SoundCatalog>,
    config: PlayerConfig,
) -> Result<PlayerHandle, PlayerError>
where
    E: AudioEngine + 'static,
    F: FnOnce() -> Result<E, EngineError> + Send + 'static,
{
    spawn_player_with_clock(factory, catalog, config, Arc::new(MonotonicClock::new()))
}

pub fn spawn_player_with_clock<E, F>(
    factory: F,
    catalog: Arc<SoundCatalog>,
    config: PlayerConfig,
    clock: Arc<dyn Clock>,
) -> Result<PlayerHandle, PlayerError>
where
    E: AudioEngine + 'static,
    F: FnOnce() -> Result<E, EngineError> + Send + 'static,
{
    let (cmd_tx, cmd_rx) = bounded(config.command_capacity.max(1));
    let (init_tx, init_rx) = bounded::<Result<(), EngineError>>(1);
    let sync = SyncChannel::new(config.event_capacity);
    let thread_sync = sync.clone();

    let thread = thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || {
            let engine = match factory() {
                Ok(engine) => {
                    let _ = init_tx.send(Ok(()));
                    engine
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            let controller = PlaybackController::new(engine, catalog, thread_sync, &config);
            let session = Session::new(controller, &config, clock);
            run_session(session, cmd_rx, &config);
        })
        .map_err(|e| PlayerError::Spawn(e.to_string()))?;

    match init_rx.recv() {
        Ok(Ok(())) => {
            info!("player: thread started");
            Ok(PlayerHandle {
                cmd_tx,
                sync,
                thread: Some(thread),
            })
        }
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(PlayerError::EngineInit(e))
        }
        Err(_) => {
            let _ = thread.join();
            Err(PlayerError::Disconnected)
        }
    }
}

fn run_session<E: AudioEngine>(mut session: Session<E>, cmd_rx: Receiver<PlayerCommand>, config: &PlayerConfig) {
    let tick = config.tick_interval();

    loop {
        // 没有渐变时阻塞等待命令
        let received = if session.is_fading() {
            cmd_rx.recv_timeout(tick)
        } else {
            cmd_rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match received {
            Ok(PlayerCommand::Shutdown) => {
                let _ = session.handle(PlayerCommand::Shutdown);
                break;
            }
            Ok(cmd) => {
                if let Err(e) = session.handle(cmd) {
                    warn!("player: {}", e);
                    session.controller().report_error(&e);
                }
            }
            Err(RecvTimeoutError::Timeout) => session.advance(),
            Err(RecvTimeoutError::Disconnected) => {
                debug!("player: command channel closed");
                session.controller_mut().shutdown();
                break;
            }
        }
    }
    info!("player: thread exited");
}

impl PlayerHandle {
    pub fn send(&self, cmd: PlayerCommand) -> Result<(), PlayerError> {
        self.cmd_tx.send(cmd).map_err(|_| PlayerError::Disconnected)
    }

    pub fn play(&self, key: Option<SoundKey>) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Play(key))
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Pause)
    }

    pub fn toggle(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Toggle)
    }

    pub fn stop(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Stop)
    }

    pub fn set_sound(&self, key: SoundKey) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SetSound(key))
    }

    pub fn set_sleep_timer(&self, duration: SleepDuration) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SetSleepTimer(duration))
    }

    /// 睡眠定时器秒级节拍，由前台界面每秒发送
    pub fn sleep_tick(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::SleepTimerTick)
    }

    pub fn request_state(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::RequestState)
    }

    pub fn foreground(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Foreground)
    }

    pub fn subscribe(&self) -> Subscription {
        self.sync.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.sync.unsubscribe(id)
    }

    /// 最近一次发布的快照
    pub fn snapshot(&self) -> Snapshot {
        self.sync.request_snapshot()
    }

    pub fn sleep_timer_status(&self) -> SleepTimerStatus {
        self.sync.sleep_timer_status()
    }

    pub fn sync(&self) -> &SyncChannel {
        &self.sync
    }

    /// 停止播放并等待线程退出
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.cmd_tx.send(PlayerCommand::Shutdown);
        if thread.join().is_err() {
            warn!("player: thread panicked");
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SilentEngine;
    use crate::clock::ManualClock;
    use crate::command::PlayerEvent;
    use crate::decoder::DecoderError;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn spawn(clock: &ManualClock) -> PlayerHandle {
        spawn_player_with_clock(
            || Ok(SilentEngine::new()),
            Arc::new(SoundCatalog::builtin()),
            PlayerConfig::default(),
            Arc::new(clock.clone()),
        )
        .unwrap()
    }

    fn next_state(sub: &Subscription) -> Snapshot {
        loop {
            match sub.recv_timeout(WAIT) {
                Some(PlayerEvent::StateChanged(s)) => return s,
                Some(_) => continue,
                None => panic!("no state event"),
            }
        }
    }

    #[test]
    fn test_player_thread_round_trip() {
        let clock = ManualClock::new(0);
        let mut handle = spawn(&clock);
        let sub = handle.subscribe();

        handle.play(Some(SoundKey::from("rain"))).unwrap();
        assert_eq!(
            next_state(&sub),
            Snapshot {
                playing: true,
                active_sound: Some(SoundKey::from("rain")),
            }
        );

        clock.advance(1_000);
        handle.pause().unwrap();
        assert_eq!(
            next_state(&sub),
            Snapshot {
                playing: false,
                active_sound: Some(SoundKey::from("rain")),
            }
        );

        clock.advance(1_000);
        handle.shutdown();
        assert_eq!(next_state(&sub), Snapshot::default());
        assert_eq!(handle.snapshot(), Snapshot::default());
        assert!(handle.send(PlayerCommand::RequestState).is_err());
    }

    #[test]
    fn test_errors_reach_observers() {
        let clock = ManualClock::new(0);
        let handle = spawn(&clock);
        let sub = handle.subscribe();

        handle.set_sound(SoundKey::from("thunder")).unwrap();
        match sub.recv_timeout(WAIT) {
            Some(PlayerEvent::Error(msg)) => assert!(msg.contains("thunder")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sleep_timer_status_pull() {
        let clock = ManualClock::new(0);
        let handle = spawn(&clock);
        let sub = handle.subscribe();
        assert_eq!(handle.sleep_timer_status(), SleepTimerStatus::default());

        handle.set_sleep_timer(SleepDuration::custom(0, 90)).unwrap();
        loop {
            match sub.recv_timeout(WAIT) {
                Some(PlayerEvent::SleepTimer(_)) => break,
                Some(_) => continue,
                None => panic!("no sleep timer event"),
            }
        }
        assert_eq!(
            handle.sleep_timer_status(),
            SleepTimerStatus {
                armed: true,
                remaining_seconds: 5400,
            }
        );
    }

    #[test]
    fn test_late_subscriber_requests_state() {
        let clock = ManualClock::new(0);
        let handle = spawn(&clock);
        let early = handle.subscribe();
        handle.set_sound(SoundKey::from("brown")).unwrap();
        next_state(&early);

        let late = handle.subscribe();
        handle.request_state().unwrap();
        let state = next_state(&late);
        assert!(!state.playing);
        assert_eq!(state.active_sound, Some(SoundKey::from("brown")));
        assert_eq!(handle.snapshot(), state);
    }

    #[test]
    fn test_engine_init_failure() {
        let result = spawn_player(
            || Err::<SilentEngine, _>(EngineError::Decode(DecoderError::NoTrack)),
            Arc::new(SoundCatalog::builtin()),
            PlayerConfig::default(),
        );
        assert!(matches!(result, Err(PlayerError::EngineInit(_))));
    }
}
