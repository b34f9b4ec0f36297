use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{HeapProducer, HeapRb};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dsp::VoiceBank;
use crate::player::{AudioPlayer, NoteCue};

const COMMAND_CAPACITY: usize = 256;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToneSettings {
    /// Output device name; `None` picks the host default.
    pub device: Option<String>,
    pub gain: f32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            device: None,
            gain: 0.25,
        }
    }
}

enum ToneCommand {
    Start(NoteCue),
    StopAll,
}

/// Sounds cues as sine tones on a cpal output stream. Commands reach the
/// audio callback through a lock-free ring buffer.
pub struct TonePlayer {
    commands: HeapProducer<ToneCommand>,
    _stream: cpal::Stream,
}

impl TonePlayer {
    pub fn list_outputs() -> Result<Vec<String>> {
        let host = cpal::default_host();
        Ok(host
            .output_devices()?
            .map(|device| device.name().unwrap_or_else(|_| "Unknown".into()))
            .collect())
    }

    pub fn open(settings: &ToneSettings) -> Result<Self> {
        let host = cpal::default_host();
        let device = match settings.device.as_deref() {
            Some(name) => host
                .output_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("audio output {name:?} not found"))?,
            None => host
                .default_output_device()
                .ok_or_else(|| anyhow!("no default audio output"))?,
        };
        let supported = device
            .default_output_config()
            .context("query default output config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow!(
                "unsupported output sample format {:?}",
                supported.sample_format()
            ));
        }
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;
        let mut bank = VoiceBank::new(config.sample_rate.0 as f32, settings.gain);
        let (producer, mut consumer) = HeapRb::<ToneCommand>::new(COMMAND_CAPACITY).split();
        debug!(?config, "opening tone output stream");

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                while let Some(command) = consumer.pop() {
                    match command {
                        ToneCommand::Start(cue) => bank.trigger(&cue),
                        ToneCommand::StopAll => bank.silence(),
                    }
                }
                for frame in data.chunks_mut(channels) {
                    let sample = bank.next_sample();
                    for ch in frame {
                        *ch = sample;
                    }
                }
            },
            |err| warn!(%err, "tone output stream error"),
            None,
        )?;
        stream.play().context("start tone output stream")?;
        Ok(Self {
            commands: producer,
            _stream: stream,
        })
    }

    fn send(&mut self, command: ToneCommand) {
        if self.commands.push(command).is_err() {
            warn!("tone command queue full, dropping cue");
        }
    }
}

impl AudioPlayer for TonePlayer {
    fn start(&mut self, cue: NoteCue) {
        self.send(ToneCommand::Start(cue));
    }

    fn stop(&mut self) {
        self.send(ToneCommand::StopAll);
    }
}
