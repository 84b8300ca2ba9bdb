//! Deterministic stand-in console core.
//!
//! It recognizes iNES images by their header, draws a test pattern driven by
//! the image checksum, the frame counter and the held buttons, and plays a
//! square tone whose pitch follows the d-pad. It has no CPU; it exists so the
//! host can run (and be tested) without a real emulation library linked in.

use crate::core::{AudioSink, Button, ButtonSet, ConsoleCore, MAX_PLAYERS, Player, VideoSink};
use crate::error::CoreError;
use crate::output::DEFAULT_SAMPLE_RATE;
use crate::video::{FRAME_PIXELS, SCREEN_WIDTH};

/// iNES header magic: "NES" followed by MS-DOS EOF.
pub const INES_MAGIC: [u8; 4] = *b"NES\x1A";
const INES_HEADER_LEN: usize = 16;

pub const SAMPLE_RATE: u32 = DEFAULT_SAMPLE_RATE;
/// Samples per frame at [`SAMPLE_RATE`].
pub const SAMPLES_PER_FRAME: usize = SAMPLE_RATE as usize / 60;

const STATE_MAGIC: [u8; 4] = *b"PCST";
const STATE_VERSION: u8 = 1;
const STATE_LEN: usize = 4 + 1 + 4 + 8 + MAX_PLAYERS + 4;

const AMPLITUDE: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Machine {
    seed: u32,
    frame: u64,
    held: [u8; MAX_PLAYERS],
    phase: u32,
}

impl Machine {
    fn to_bytes(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(STATE_LEN);
        buf.extend_from_slice(&STATE_MAGIC);
        buf.push(STATE_VERSION);
        buf.extend_from_slice(&self.seed.to_le_bytes());
        buf.extend_from_slice(&self.frame.to_le_bytes());
        buf.extend_from_slice(&self.held);
        buf.extend_from_slice(&self.phase.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, CoreError> {
        if buf.len() != STATE_LEN {
            return Err(CoreError::MalformedState("unexpected length"));
        }
        if buf[..4] != STATE_MAGIC {
            return Err(CoreError::MalformedState("bad magic"));
        }
        if buf[4] != STATE_VERSION {
            return Err(CoreError::MalformedState("unsupported version"));
        }

        let mut seed = [0u8; 4];
        seed.copy_from_slice(&buf[5..9]);
        let mut frame = [0u8; 8];
        frame.copy_from_slice(&buf[9..17]);
        let mut held = [0u8; MAX_PLAYERS];
        held.copy_from_slice(&buf[17..17 + MAX_PLAYERS]);
        let mut phase = [0u8; 4];
        phase.copy_from_slice(&buf[17 + MAX_PLAYERS..STATE_LEN]);

        Ok(Self {
            seed: u32::from_le_bytes(seed),
            frame: u64::from_le_bytes(frame),
            held,
            phase: u32::from_le_bytes(phase),
        })
    }

    /// Samples per square-wave half period at `rate`; the d-pad bends the
    /// pitch, the rate does not.
    fn half_period(&self, rate: u32) -> u32 {
        let p1 = ButtonSet::from_bits(self.held[0]);
        let mut half = u64::from(50 + (self.seed % 50));
        if p1.contains(Button::Up) {
            half /= 2;
        }
        if p1.contains(Button::Down) {
            half *= 2;
        }
        (half * u64::from(rate) / u64::from(SAMPLE_RATE)).max(1) as u32
    }
}

/// Test-pattern core. See the module docs.
pub struct PatternCore {
    machine: Option<Machine>,
    frame: Vec<u32>,
    sample_rate: u32,
}

impl Default for PatternCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternCore {
    pub fn new() -> Self {
        Self {
            machine: None,
            frame: vec![0; FRAME_PIXELS],
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames emulated since the program was loaded.
    pub fn frame_count(&self) -> Option<u64> {
        self.machine.map(|m| m.frame)
    }

    fn render(&mut self, m: &Machine) {
        if self.frame.len() != FRAME_PIXELS {
            self.frame.resize(FRAME_PIXELS, 0);
        }
        let t = m.frame as u32;
        let p1 = m.held[0] as u32;
        let p2 = m.held[1] as u32;
        for (i, px) in self.frame.iter_mut().enumerate() {
            let x = (i % SCREEN_WIDTH) as u32;
            let y = (i / SCREEN_WIDTH) as u32;
            let r = (x.wrapping_add(t) ^ p1) & 0xFF;
            let g = (y.wrapping_mul(3).wrapping_add(m.seed >> 8) ^ p2) & 0xFF;
            let b = ((x ^ y).wrapping_add(m.seed) ^ t.rotate_left(3)) & 0xFF;
            *px = (r << 16) | (g << 8) | b;
        }
    }
}

/// Samples due in frame `frame` so that whole seconds hold exactly `rate`.
fn samples_in_frame(frame: u64, rate: u32) -> usize {
    let rate = u64::from(rate);
    ((frame + 1) * rate / 60 - frame * rate / 60) as usize
}

fn checksum(image: &[u8]) -> u32 {
    // FNV-1a
    image
        .iter()
        .fold(0x811C_9DC5u32, |h, &b| (h ^ b as u32).wrapping_mul(0x0100_0193))
}

impl ConsoleCore for PatternCore {
    fn load_program(&mut self, image: &[u8]) -> Result<(), CoreError> {
        if image.len() < INES_HEADER_LEN || image[..4] != INES_MAGIC {
            return Err(CoreError::UnrecognizedImage);
        }
        self.machine = Some(Machine {
            seed: checksum(image),
            frame: 0,
            held: [0; MAX_PLAYERS],
            phase: 0,
        });
        Ok(())
    }

    fn advance_frame(&mut self, video: &mut dyn VideoSink, audio: &mut dyn AudioSink) {
        let Some(mut m) = self.machine else {
            return;
        };

        let half = m.half_period(self.sample_rate);
        for _ in 0..samples_in_frame(m.frame, self.sample_rate) {
            let high = (m.phase / half) % 2 == 0;
            let s = if high { AMPLITUDE } else { -AMPLITUDE };
            let pan = if ButtonSet::from_bits(m.held[0]).contains(Button::A) {
                0.5
            } else {
                1.0
            };
            audio.sample_emitted(s, s * pan);
            m.phase = m.phase.wrapping_add(1) % (half * 2);
        }

        self.render(&m);
        video.frame_emitted(&self.frame);

        m.frame += 1;
        self.machine = Some(m);
    }

    fn button_down(&mut self, player: Player, button: Button) {
        if let Some(m) = self.machine.as_mut() {
            let mut set = ButtonSet::from_bits(m.held[player.index()]);
            set.insert(button);
            m.held[player.index()] = set.bits();
        }
    }

    fn button_up(&mut self, player: Player, button: Button) {
        if let Some(m) = self.machine.as_mut() {
            let mut set = ButtonSet::from_bits(m.held[player.index()]);
            set.remove(button);
            m.held[player.index()] = set.bits();
        }
    }

    fn set_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate.max(1);
    }

    fn capture_state(&self) -> Result<Vec<u8>, CoreError> {
        self.machine
            .map(Machine::to_bytes)
            .ok_or(CoreError::NoProgram)
    }

    fn restore_state(&mut self, state: &[u8]) -> Result<(), CoreError> {
        if self.machine.is_none() {
            return Err(CoreError::NoProgram);
        }
        self.machine = Some(Machine::from_bytes(state)?);
        Ok(())
    }
}

/// Minimal valid iNES image: header plus one 16 KiB PRG bank and one 8 KiB CHR bank.
pub fn blank_ines_image(fill: u8) -> Vec<u8> {
    let mut image = vec![fill; INES_HEADER_LEN + 16 * 1024 + 8 * 1024];
    image[..4].copy_from_slice(&INES_MAGIC);
    image[4] = 1;
    image[5] = 1;
    image[6..INES_HEADER_LEN].fill(0);
    image
}
