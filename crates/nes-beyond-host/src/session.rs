//! The host loop: owns the core, paces it, and routes its output.
//!
//! A [`Session`] is driven from a single thread. Each call to
//! [`Session::tick`] is one turn of the loop: if the scheduler says a frame
//! is due, level-sampled input is polled, the core advances exactly one
//! frame into the pixel buffer and audio ring, and control returns to the
//! caller, which blits [`Session::frame`]. The only other thread involved is
//! the audio device callback draining the ring.

use std::path::Path;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::audio_ring::{AudioProducer, DEFAULT_BLOCK, audio_ring_for_block};
use crate::config::EmulatorConfig;
use crate::core::{Button, ButtonSet, ConsoleCore, CoreFactory, Player};
use crate::error::{LoadError, SessionError};
use crate::input::{ButtonEvent, InputMux, InputSource, LevelSource};
use crate::output::{AudioBackend, AudioOutput};
use crate::savestate::{SaveState, SaveStateManager, StateStore};
use crate::scheduler::{FrameScheduler, Speed, Tick};
use crate::video::PixelBuffer;

/// File extension of program images the host accepts.
pub const PROGRAM_EXTENSION: &str = "nes";

/// Whether a file name has the program-image extension.
pub fn is_recognized_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PROGRAM_EXTENSION))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub name: String,
}

/// Snapshot of what the session is doing, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub program: Option<String>,
    pub frames: u64,
    pub buffered_samples: usize,
    pub audio_overruns: u64,
}

struct Running {
    program: ProgramInfo,
    core: Box<dyn ConsoleCore>,
    producer: AudioProducer,
    // Declared last: the device closes after the core stops feeding it.
    output: Box<dyn AudioOutput>,
}

pub struct Session {
    factory: CoreFactory,
    audio: Box<dyn AudioBackend>,
    audio_block: usize,
    states: SaveStateManager,
    config: EmulatorConfig,
    scheduler: FrameScheduler,
    input: InputMux,
    pixels: PixelBuffer,
    running: Option<Running>,
}

impl Session {
    pub fn new(
        factory: CoreFactory,
        audio: Box<dyn AudioBackend>,
        store: Box<dyn StateStore>,
    ) -> Self {
        Self {
            factory,
            audio,
            audio_block: DEFAULT_BLOCK,
            states: SaveStateManager::new(store),
            config: EmulatorConfig::default(),
            scheduler: FrameScheduler::new(),
            input: InputMux::new(),
            pixels: PixelBuffer::new(),
            running: None,
        }
    }

    /// Samples the audio device pulls per callback; the ring is sized from it.
    /// Takes effect at the next program load.
    pub fn set_audio_block(&mut self, block: usize) {
        self.audio_block = block.max(1);
    }

    pub fn set_level_source(&mut self, source: Box<dyn LevelSource>) {
        self.input.set_level_source(source);
    }

    pub fn config(&self) -> EmulatorConfig {
        self.config
    }

    /// Apply a whole configuration, e.g. one loaded from disk.
    pub fn apply_config(&mut self, config: EmulatorConfig) {
        self.set_speed(config.speed);
        self.set_touch_overlay(config.touch_overlay);
    }

    /// Takes effect on the next tick; pacing continues from the last frame.
    pub fn set_speed(&mut self, speed: Speed) {
        if self.config.speed != speed {
            info!("Speed set to {speed}");
        }
        self.config.speed = speed;
        if let Some(run) = self.running.as_mut() {
            run.core
                .set_sample_rate(core_sample_rate(run.output.sample_rate(), speed));
        }
    }

    pub fn set_touch_overlay(&mut self, enabled: bool) {
        self.config.touch_overlay = enabled;
        let events = self.input.set_touch_enabled(enabled);
        self.forward(&events);
    }

    pub fn program(&self) -> Option<&ProgramInfo> {
        self.running.as_ref().map(|r| &r.program)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some() && self.scheduler.is_running()
    }

    pub fn frame(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn held(&self, player: Player) -> ButtonSet {
        self.input.held(player)
    }

    pub fn status(&self) -> SessionStatus {
        match &self.running {
            Some(run) => SessionStatus {
                program: Some(run.program.name.clone()),
                frames: self.scheduler.frames(),
                buffered_samples: run.producer.len(),
                audio_overruns: run.producer.overruns(),
            },
            None => SessionStatus {
                program: None,
                frames: 0,
                buffered_samples: 0,
                audio_overruns: 0,
            },
        }
    }

    /// Load a program image and start running it from `now`.
    ///
    /// A rejected file leaves the current program running. Once the new image
    /// has been accepted by a fresh core, the old program is stopped; if the
    /// audio device then fails to open the session ends up idle.
    pub fn load_program(
        &mut self,
        name: &str,
        image: &[u8],
        now: Instant,
    ) -> Result<(), LoadError> {
        if !is_recognized_name(name) {
            warn!("Rejected {name}: not a .{PROGRAM_EXTENSION} file");
            return Err(LoadError::UnsupportedFile);
        }

        let mut core =
            (self.factory)().inspect_err(|e| error!("Failed to create core: {e}"))?;
        core.load_program(image)
            .inspect_err(|e| warn!("Core rejected {name}: {e}"))?;

        self.eject();

        let (producer, consumer) = audio_ring_for_block(self.audio_block);
        let output = self
            .audio
            .open(consumer)
            .inspect_err(|e| error!("Failed to open audio output: {e}"))?;
        core.set_sample_rate(core_sample_rate(output.sample_rate(), self.config.speed));

        // Sources may still report buttons held for the previous program.
        self.input.release_all();

        self.running = Some(Running {
            program: ProgramInfo {
                name: name.to_string(),
            },
            core,
            producer,
            output,
        });
        self.scheduler.start(now);
        info!("Running {name} ({} bytes)", image.len());
        Ok(())
    }

    /// Stop the loop and release the core and audio device. Idempotent.
    pub fn eject(&mut self) {
        self.scheduler.stop();
        if let Some(run) = self.running.take() {
            info!(
                "Stopped {} after {} frames",
                run.program.name,
                self.scheduler.frames()
            );
            self.pixels.clear();
        }
        self.input.release_all();
    }

    /// One turn of the host loop.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let Some(run) = self.running.as_mut() else {
            return Tick::Idle;
        };

        let tick = self.scheduler.tick(now, self.config.speed);
        if tick == Tick::Advance {
            let events = self.input.poll_level_sources();
            forward_to(run.core.as_mut(), &events);
            run.core.advance_frame(&mut self.pixels, &mut run.producer);
        }
        tick
    }

    pub fn key_event(&mut self, player: Player, button: Button, pressed: bool) {
        let events = if pressed {
            self.input.press(InputSource::Keyboard, player, button)
        } else {
            self.input.release(InputSource::Keyboard, player, button)
        };
        self.forward(&events);
    }

    /// On-screen controls drive player one and only while the overlay is on.
    pub fn touch_event(&mut self, button: Button, pressed: bool) {
        let events = if pressed {
            self.input.press(InputSource::Touch, Player::ONE, button)
        } else {
            self.input.release(InputSource::Touch, Player::ONE, button)
        };
        self.forward(&events);
    }

    fn forward(&mut self, events: &[ButtonEvent]) {
        if let Some(run) = self.running.as_mut() {
            forward_to(run.core.as_mut(), events);
        }
    }

    /// The core's current snapshot, or `None` without a program.
    pub fn capture_state(&self) -> Option<SaveState> {
        let run = self.running.as_ref()?;
        match run.core.capture_state() {
            Ok(bytes) => Some(SaveState::from_bytes(bytes)),
            Err(e) => {
                warn!("Failed to capture state of {}: {e}", run.program.name);
                None
            }
        }
    }

    /// Replace the live core state. Returns whether it was applied; without a
    /// program, or if the core rejects the bytes, nothing changes.
    pub fn restore_state(&mut self, state: &SaveState) -> bool {
        let Some(run) = self.running.as_mut() else {
            debug!("restore ignored: no program loaded");
            return false;
        };
        match run.core.restore_state(state.as_bytes()) {
            Ok(()) => {
                // The snapshot carries its own held buttons; match them to
                // what is actually pressed now.
                for player in Player::all() {
                    for button in Button::ALL {
                        run.core.button_up(player, button);
                    }
                    for button in self.input.held(player).iter() {
                        run.core.button_down(player, button);
                    }
                }
                true
            }
            Err(e) => {
                warn!("Failed to restore state for {}: {e}", run.program.name);
                false
            }
        }
    }

    /// Capture the current state and persist it under the program's key.
    pub fn save_state(&mut self) -> Result<(), SessionError> {
        let name = self
            .program()
            .map(|p| p.name.clone())
            .ok_or(SessionError::NoProgram)?;
        let state = self.capture_state().ok_or(SessionError::CaptureFailed)?;
        self.states.persist(&name, &state)?;
        info!("Saved state for {name} ({} bytes)", state.len());
        Ok(())
    }

    /// Restore the persisted state for the loaded program.
    pub fn load_state(&mut self) -> Result<(), SessionError> {
        let name = self
            .program()
            .map(|p| p.name.clone())
            .ok_or(SessionError::NoProgram)?;
        let state = self
            .states
            .fetch(&name)?
            .ok_or(SessionError::NoSaveState)?;
        if self.restore_state(&state) {
            info!("Loaded state for {name}");
        }
        Ok(())
    }
}

/// Rate the core should emit at so that one wall-clock second of frames at
/// `speed` fills one second of device audio.
fn core_sample_rate(device_rate: u32, speed: Speed) -> u32 {
    ((f64::from(device_rate) / speed.factor()).round() as u32).max(1)
}

fn forward_to(core: &mut dyn ConsoleCore, events: &[ButtonEvent]) {
    for ev in events {
        if ev.pressed {
            core.button_down(ev.player, ev.button);
        } else {
            core.button_up(ev.player, ev.button);
        }
    }
}
