//! drift_player - 环境音播放控制核心
//!
//! 单音轨状态机：渐入渐出、命令去抖、睡眠定时器，以及向观察者的状态同步。

mod adapter;
mod clock;
mod command;
mod config;
mod controller;
mod debounce;
mod decoder;
mod fade;
mod output;
mod player;
mod session;
mod sleep_timer;
mod sync;

pub use adapter::*;
pub use clock::*;
pub use command::*;
pub use config::*;
pub use controller::*;
pub use debounce::*;
pub use decoder::*;
pub use fade::*;
pub use output::*;
pub use player::*;
pub use session::*;
pub use sleep_timer::*;
pub use sync::*;

pub use drift_catalog::{SoundCatalog, SoundItem, SoundKey};

/// 播放器错误
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("Unknown sound: {0}")]
    UnknownSound(SoundKey),

    #[error("Failed to load sound {key}: {source}")]
    EngineLoad {
        key: SoundKey,
        #[source]
        source: EngineError,
    },

    #[error("Audio engine init failed: {0}")]
    EngineInit(#[source] EngineError),

    #[error("Failed to spawn player thread: {0}")]
    Spawn(String),

    #[error("Player thread is not running")]
    Disconnected,
}
