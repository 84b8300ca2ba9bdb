use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel as cb;
use log::info;
use nes_beyond_host::audio_ring::AudioConsumer;
use nes_beyond_host::error::AudioError;
use nes_beyond_host::output::{AudioBackend, AudioOutput};

/// Plays the ring through the default `cpal` output device.
///
/// Stream errors happen on the device thread; they are forwarded to the
/// receiver returned by [`CpalBackend::new`] for the UI to log.
pub struct CpalBackend {
    errors: cb::Sender<cpal::StreamError>,
}

struct CpalOutput {
    _stream: cpal::Stream,
    rate: u32,
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

impl CpalBackend {
    pub fn new() -> (Self, cb::Receiver<cpal::StreamError>) {
        let (tx, rx) = cb::unbounded();
        (Self { errors: tx }, rx)
    }
}

impl AudioBackend for CpalBackend {
    fn open(&mut self, consumer: AudioConsumer) -> Result<Box<dyn AudioOutput>, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Stream(format!("no supported output config: {e}")))?;
        let sample_format = supported.sample_format();
        let config = supported.config();
        let rate = config.sample_rate.0;
        info!(
            "Audio output: {} channel(s) at {rate} Hz, {sample_format:?}",
            config.channels
        );

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, consumer, self.errors.clone())
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, consumer, self.errors.clone())
            }
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, consumer, self.errors.clone())
            }
            other => {
                return Err(AudioError::Stream(format!(
                    "unsupported sample format {other:?}"
                )));
            }
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(format!("failed to play stream: {e}")))?;
        Ok(Box::new(CpalOutput {
            _stream: stream,
            rate,
        }))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    consumer: AudioConsumer,
    errors: cb::Sender<cpal::StreamError>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                for frame in data.chunks_mut(channels) {
                    let (left, right) = consumer.pop_stereo().unwrap_or((0.0, 0.0));
                    frame[0] = T::from_sample(left);
                    if channels > 1 {
                        frame[1] = T::from_sample(right);
                    }
                    for extra in frame.iter_mut().skip(2) {
                        *extra = T::EQUILIBRIUM;
                    }
                }
            },
            move |err| {
                let _ = errors.send(err);
            },
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}
