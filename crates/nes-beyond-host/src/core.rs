//! Contract between the host loop and a console core.
//!
//! The host never looks inside the core. It hands the core two sinks for the
//! duration of [`ConsoleCore::advance_frame`], forwards button edges, and
//! shuttles opaque snapshots in and out.

use std::fmt;

use crate::error::CoreError;

/// Number of logical controllers the host can drive.
pub const MAX_PLAYERS: usize = 2;

/// The console's fixed button vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
    ];

    #[inline]
    const fn mask(self) -> u8 {
        match self {
            Button::Up => 0x01,
            Button::Down => 0x02,
            Button::Left => 0x04,
            Button::Right => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
            Button::Start => 0x40,
            Button::Select => 0x80,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
            Button::Start => "start",
            Button::Select => "select",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// A 1-based controller index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Player(u8);

impl Player {
    pub const ONE: Player = Player(1);
    pub const TWO: Player = Player(2);

    pub fn new(number: u8) -> Option<Self> {
        if (1..=MAX_PLAYERS as u8).contains(&number) {
            Some(Self(number))
        } else {
            None
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based slot for per-player tables.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn all() -> impl Iterator<Item = Player> {
        (1..=MAX_PLAYERS as u8).map(Player)
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Set of pressed buttons for one controller.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ButtonSet(u8);

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet(0);

    pub fn from_buttons(buttons: impl IntoIterator<Item = Button>) -> Self {
        let mut set = Self::EMPTY;
        for b in buttons {
            set.insert(b);
        }
        set
    }

    #[inline]
    pub fn insert(&mut self, button: Button) {
        self.0 |= button.mask();
    }

    #[inline]
    pub fn remove(&mut self, button: Button) {
        self.0 &= !button.mask();
    }

    #[inline]
    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.insert(button);
        } else {
            self.remove(button);
        }
    }

    #[inline]
    pub fn contains(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    #[inline]
    pub fn union(self, other: ButtonSet) -> ButtonSet {
        ButtonSet(self.0 | other.0)
    }

    /// Buttons in `self` that are not in `other`.
    #[inline]
    pub fn difference(self, other: ButtonSet) -> ButtonSet {
        ButtonSet(self.0 & !other.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for ButtonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Receives the frames a core emits. Pixels are `0x00RRGGBB` in raster order.
pub trait VideoSink {
    fn frame_emitted(&mut self, pixels: &[u32]);
}

/// Receives stereo samples as the core produces them.
pub trait AudioSink {
    fn sample_emitted(&mut self, left: f32, right: f32);
}

/// An emulation core the host can drive.
///
/// Implementations do all hardware emulation; the host only paces them.
pub trait ConsoleCore {
    /// Insert a program image. Fails if the bytes are not a recognized image.
    fn load_program(&mut self, image: &[u8]) -> Result<(), CoreError>;

    /// Advance exactly one video frame. The sinks are invoked synchronously
    /// zero or more times before this returns.
    fn advance_frame(&mut self, video: &mut dyn VideoSink, audio: &mut dyn AudioSink);

    fn button_down(&mut self, player: Player, button: Button);

    fn button_up(&mut self, player: Player, button: Button);

    /// Samples per second of wall-clock time the audio sink is drained at.
    /// The host calls this after opening the device and on speed changes.
    fn set_sample_rate(&mut self, _rate: u32) {}

    /// Serialize the complete emulation state.
    fn capture_state(&self) -> Result<Vec<u8>, CoreError>;

    /// Replace the complete emulation state. On error the live state is kept.
    fn restore_state(&mut self, state: &[u8]) -> Result<(), CoreError>;
}

/// Builds a fresh core for each program load.
pub type CoreFactory = Box<dyn FnMut() -> Result<Box<dyn ConsoleCore>, CoreError>>;

/// Sinks that drop everything. Handy for cores driven without a display.
pub struct NullSinks;

impl VideoSink for NullSinks {
    fn frame_emitted(&mut self, _pixels: &[u32]) {}
}

impl AudioSink for NullSinks {
    fn sample_emitted(&mut self, _left: f32, _right: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_set_basic_ops() {
        let mut set = ButtonSet::EMPTY;
        set.insert(Button::Up);
        set.insert(Button::A);
        assert!(set.contains(Button::Up));
        assert!(!set.contains(Button::Down));
        assert_eq!(set.len(), 2);

        set.remove(Button::Up);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Button::A]);

        let other = ButtonSet::from_buttons([Button::A, Button::Start]);
        assert_eq!(other.difference(set), ButtonSet::from_buttons([Button::Start]));
        assert_eq!(set.union(other), other);
    }

    #[test]
    fn player_numbers_are_one_based() {
        assert_eq!(Player::new(0), None);
        assert_eq!(Player::new(1), Some(Player::ONE));
        assert_eq!(Player::new(3), None);
        assert_eq!(Player::TWO.index(), 1);
        assert_eq!(Player::all().count(), MAX_PLAYERS);
    }

    #[test]
    fn button_names_round_trip() {
        for b in Button::ALL {
            assert_eq!(Button::from_name(b.name()), Some(b));
        }
        assert_eq!(Button::from_name("turbo"), None);
    }
}
