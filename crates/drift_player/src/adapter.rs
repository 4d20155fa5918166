//! 音频引擎接口
//!
//! 控制器只依赖 [`AudioEngine`]。[`CpalEngine`] 解码整段资源并经 cpal 循环输出，
//! [`SilentEngine`] 不产生声音，供无音频设备的宿主使用。

use std::path::{Path, PathBuf};

use cpal::traits::HostTrait;
use cpal::Device;
use log::{debug, info};

use crate::decoder::{decode_file, DecoderError};
use crate::output::{AudioOutput, OutputError};

/// 引擎错误
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecoderError),
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
    #[error("Asset contains no audio: {0}")]
    EmptyAsset(PathBuf),
}

/// 单资源音频引擎
pub trait AudioEngine {
    /// 加载资源（替换已加载的资源），加载后处于暂停状态
    fn load(&mut self, source: &Path) -> Result<(), EngineError>;
    fn play(&mut self);
    fn pause(&mut self);
    /// 设置音量 (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);
    /// 是否正在输出
    fn is_active(&self) -> bool;
    /// 释放已加载的资源
    fn release(&mut self);
}

/// cpal 输出引擎
pub struct CpalEngine {
    device: Device,
    output: Option<AudioOutput>,
}

impl CpalEngine {
    /// 使用默认输出设备
    pub fn new() -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(OutputError::NoDevice)?;
        Ok(Self::with_device(device))
    }

    pub fn with_device(device: Device) -> Self {
        Self {
            device,
            output: None,
        }
    }
}

impl AudioEngine for CpalEngine {
    fn load(&mut self, source: &Path) -> Result<(), EngineError> {
        self.output = None;

        let audio = decode_file(source)?;
        if audio.samples.is_empty() {
            return Err(EngineError::EmptyAsset(source.to_path_buf()));
        }
        info!(
            "engine: loaded {} ({} Hz, {} ch, {:.1}s)",
            source.display(),
            audio.sample_rate,
            audio.channels,
            audio.duration().as_secs_f64()
        );

        let output = AudioOutput::with_device(&self.device, audio)?;
        output.set_volume(0.0);
        self.output = Some(output);
        Ok(())
    }

    fn play(&mut self) {
        if let Some(output) = &self.output {
            output.set_playing(true);
        }
    }

    fn pause(&mut self) {
        if let Some(output) = &self.output {
            output.set_playing(false);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(output) = &self.output {
            output.set_volume(volume);
        }
    }

    fn is_active(&self) -> bool {
        self.output.as_ref().is_some_and(AudioOutput::is_playing)
    }

    fn release(&mut self) {
        if self.output.take().is_some() {
            debug!("engine: output released");
        }
    }
}

/// 无输出引擎，状态语义与 [`CpalEngine`] 一致
#[derive(Debug, Default)]
pub struct SilentEngine {
    loaded: Option<PathBuf>,
    active: bool,
    volume: f32,
}

impl SilentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl AudioEngine for SilentEngine {
    fn load(&mut self, source: &Path) -> Result<(), EngineError> {
        self.loaded = Some(source.to_path_buf());
        self.active = false;
        self.volume = 0.0;
        Ok(())
    }

    fn play(&mut self) {
        self.active = self.loaded.is_some();
    }

    fn pause(&mut self) {
        self.active = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) {
        self.loaded = None;
        self.active = false;
    }
}
