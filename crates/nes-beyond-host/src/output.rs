use log::debug;

use crate::audio_ring::AudioConsumer;
use crate::error::AudioError;

/// Rate assumed when no device dictates one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// A live audio device. Dropping it closes the device.
pub trait AudioOutput {
    /// Samples per second the device consumes.
    fn sample_rate(&self) -> u32;
}

/// Opens audio devices that drain the consumer side of the ring.
pub trait AudioBackend {
    fn open(&mut self, consumer: AudioConsumer) -> Result<Box<dyn AudioOutput>, AudioError>;
}

/// Backend for runs without sound: it holds the consumer but never plays it.
#[derive(Default)]
pub struct NullAudioBackend;

struct NullOutput {
    _consumer: AudioConsumer,
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }
}

impl AudioBackend for NullAudioBackend {
    fn open(&mut self, consumer: AudioConsumer) -> Result<Box<dyn AudioOutput>, AudioError> {
        debug!("audio disabled; ring of {} slots is not drained", consumer.capacity());
        Ok(Box::new(NullOutput {
            _consumer: consumer,
        }))
    }
}
