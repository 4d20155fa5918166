//! 音频输出
//!
//! 使用 cpal 循环播放内存中的采样，音量与播放标志通过原子量与回调线程共享。
//! 设备不支持资源的声道数或采样率时，退回设备可用的 f32 配置并在回调中转换。

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use log::{error, info};

use crate::decoder::DecodedAudio;

/// 音频输出错误
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("No output device available")]
    NoDevice,
    #[error("No supported config for {sample_rate} Hz / {channels} ch")]
    NoConfig { sample_rate: u32, channels: u16 },
    #[error("Stream error: {0}")]
    Stream(String),
}

/// 循环输出流，丢弃即停止
pub struct AudioOutput {
    _stream: Stream,
    is_playing: Arc<AtomicBool>,
    volume: Arc<AtomicU32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// 在指定设备上创建输出，初始为暂停
    pub fn with_device(device: &Device, audio: DecodedAudio) -> Result<Self, OutputError> {
        let stream_config = pick_config(device, audio.sample_rate, audio.channels)?;
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels;
        if sample_rate != audio.sample_rate || channels != audio.channels {
            info!(
                "output: converting {} Hz / {} ch to {} Hz / {} ch",
                audio.sample_rate, audio.channels, sample_rate, channels
            );
        }

        let is_playing = Arc::new(AtomicBool::new(false));
        let volume = Arc::new(AtomicU32::new(0f32.to_bits()));

        let is_playing_cb = is_playing.clone();
        let volume_cb = volume.clone();
        // 暂停时保留读取位置，恢复后从原处继续
        let mut cursor = LoopCursor::new(audio, channels, sample_rate);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !is_playing_cb.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    let gain = f32::from_bits(volume_cb.load(Ordering::Relaxed));
                    cursor.fill(data, gain);
                },
                |err| {
                    error!("output: stream error: {}", err);
                },
                None,
            )
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        stream.play().map_err(|e| OutputError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            is_playing,
            volume,
            sample_rate,
            channels,
        })
    }

    pub fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    /// 设置音量 (0.0 - 1.0)
    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// 设备端采样率
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 设备端声道数
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// 选择输出配置：优先与资源完全一致的 f32 配置，否则取声道最多的 f32 配置，
/// 采样率夹到其支持范围内
fn pick_config(device: &Device, sample_rate: u32, channels: u16) -> Result<StreamConfig, OutputError> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| OutputError::Stream(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let exact = configs.iter().find(|c| {
        c.channels() == channels
            && c.min_sample_rate().0 <= sample_rate
            && c.max_sample_rate().0 >= sample_rate
    });
    if let Some(range) = exact {
        return Ok(range.clone().with_sample_rate(SampleRate(sample_rate)).into());
    }

    let fallback = configs
        .iter()
        .max_by_key(|c| c.channels())
        .ok_or(OutputError::NoConfig {
            sample_rate,
            channels,
        })?;
    let rate = sample_rate.clamp(fallback.min_sample_rate().0, fallback.max_sample_rate().0);
    Ok(fallback.clone().with_sample_rate(SampleRate(rate)).into())
}

/// 循环读取位置，负责声道映射与最近邻重采样
struct LoopCursor {
    samples: Arc<[f32]>,
    src_channels: usize,
    out_channels: usize,
    frames: usize,
    step: f64,
    position: f64,
}

impl LoopCursor {
    fn new(audio: DecodedAudio, out_channels: u16, out_rate: u32) -> Self {
        let src_channels = usize::from(audio.channels.max(1));
        let frames = audio.samples.len() / src_channels;
        let step = if out_rate == 0 || audio.sample_rate == 0 {
            1.0
        } else {
            f64::from(audio.sample_rate) / f64::from(out_rate)
        };
        Self {
            samples: audio.samples,
            src_channels,
            out_channels: usize::from(out_channels.max(1)),
            frames,
            step,
            position: 0.0,
        }
    }

    /// 填充一段交错输出；输出声道 `c` 取源声道 `c % src_channels`
    fn fill(&mut self, data: &mut [f32], gain: f32) {
        if self.frames == 0 {
            data.fill(0.0);
            return;
        }

        let len = self.frames as f64;
        for frame in data.chunks_mut(self.out_channels) {
            let index = (self.position as usize).min(self.frames - 1);
            let base = index * self.src_channels;
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = self.samples[base + c % self.src_channels] * gain;
            }
            self.position += self.step;
            while self.position >= len {
                self.position -= len;
            }
        }
    }
}
