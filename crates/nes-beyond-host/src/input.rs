//! Merges keyboard, touch and gamepad input into per-controller edge events.
//!
//! Every source keeps its own pressed set. A button counts as held while any
//! source asserts it, and the core only hears about transitions of that
//! combined set.

use crate::core::{Button, ButtonSet, MAX_PLAYERS, Player};

/// Analog deflection (fraction of full scale) that counts as a d-pad press.
pub const STICK_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Touch,
    Gamepad,
}

impl InputSource {
    const COUNT: usize = 3;

    fn slot(self) -> usize {
        match self {
            InputSource::Keyboard => 0,
            InputSource::Touch => 1,
            InputSource::Gamepad => 2,
        }
    }
}

/// A discrete press or release to forward to the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonEvent {
    pub player: Player,
    pub button: Button,
    pub pressed: bool,
}

/// A source that can only be sampled, not listened to.
pub trait LevelSource {
    /// Currently held buttons, indexed by player slot.
    fn sample(&mut self) -> [ButtonSet; MAX_PLAYERS];
}

/// Map an analog stick position to d-pad directions. Positive `y` is up.
pub fn stick_to_dpad(x: f32, y: f32, threshold: f32) -> ButtonSet {
    let mut set = ButtonSet::EMPTY;
    if y >= threshold {
        set.insert(Button::Up);
    } else if y <= -threshold {
        set.insert(Button::Down);
    }
    if x <= -threshold {
        set.insert(Button::Left);
    } else if x >= threshold {
        set.insert(Button::Right);
    }
    set
}

#[derive(Default, Clone, Copy)]
struct PlayerInput {
    sources: [ButtonSet; InputSource::COUNT],
    reported: ButtonSet,
}

impl PlayerInput {
    fn combined(&self) -> ButtonSet {
        self.sources
            .iter()
            .fold(ButtonSet::EMPTY, |acc, s| acc.union(*s))
    }
}

pub struct InputMux {
    players: [PlayerInput; MAX_PLAYERS],
    level_source: Option<Box<dyn LevelSource>>,
    touch_enabled: bool,
}

impl Default for InputMux {
    fn default() -> Self {
        Self::new()
    }
}

impl InputMux {
    pub fn new() -> Self {
        Self {
            players: [PlayerInput::default(); MAX_PLAYERS],
            level_source: None,
            touch_enabled: false,
        }
    }

    pub fn set_level_source(&mut self, source: Box<dyn LevelSource>) {
        self.level_source = Some(source);
    }

    pub fn has_level_source(&self) -> bool {
        self.level_source.is_some()
    }

    pub fn touch_enabled(&self) -> bool {
        self.touch_enabled
    }

    /// Enable or disable the touch overlay. Disabling drops every touch hold.
    pub fn set_touch_enabled(&mut self, enabled: bool) -> Vec<ButtonEvent> {
        self.touch_enabled = enabled;
        let mut events = Vec::new();
        if !enabled {
            for player in Player::all() {
                let touch = &mut self.players[player.index()].sources[InputSource::Touch.slot()];
                *touch = ButtonSet::EMPTY;
                self.sync(player, &mut events);
            }
        }
        events
    }

    /// Edge from a source that reports transitions itself.
    pub fn press(
        &mut self,
        source: InputSource,
        player: Player,
        button: Button,
    ) -> Vec<ButtonEvent> {
        self.update(source, player, button, true)
    }

    pub fn release(
        &mut self,
        source: InputSource,
        player: Player,
        button: Button,
    ) -> Vec<ButtonEvent> {
        self.update(source, player, button, false)
    }

    fn update(
        &mut self,
        source: InputSource,
        player: Player,
        button: Button,
        pressed: bool,
    ) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        if source == InputSource::Touch && !self.touch_enabled {
            return events;
        }
        self.players[player.index()].sources[source.slot()].set(button, pressed);
        self.sync(player, &mut events);
        events
    }

    /// Replace the sampled state of a level source for one player.
    pub fn set_levels(
        &mut self,
        source: InputSource,
        player: Player,
        held: ButtonSet,
    ) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        if source == InputSource::Touch && !self.touch_enabled {
            return events;
        }
        self.players[player.index()].sources[source.slot()] = held;
        self.sync(player, &mut events);
        events
    }

    /// Sample the registered level source once. Call once per scheduler tick.
    pub fn poll_level_sources(&mut self) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        let Some(source) = self.level_source.as_mut() else {
            return events;
        };
        let levels = source.sample();
        for player in Player::all() {
            self.players[player.index()].sources[InputSource::Gamepad.slot()] =
                levels[player.index()];
            self.sync(player, &mut events);
        }
        events
    }

    /// Forget every held button, emitting releases for whatever was reported.
    pub fn release_all(&mut self) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        for player in Player::all() {
            self.players[player.index()].sources = [ButtonSet::EMPTY; InputSource::COUNT];
            self.sync(player, &mut events);
        }
        events
    }

    /// Buttons the core currently believes are held.
    pub fn held(&self, player: Player) -> ButtonSet {
        self.players[player.index()].reported
    }

    fn sync(&mut self, player: Player, events: &mut Vec<ButtonEvent>) {
        let state = &mut self.players[player.index()];
        let now = state.combined();
        let released = state.reported.difference(now);
        let pressed = now.difference(state.reported);
        state.reported = now;

        events.extend(released.iter().map(|button| ButtonEvent {
            player,
            button,
            pressed: false,
        }));
        events.extend(pressed.iter().map(|button| ButtonEvent {
            player,
            button,
            pressed: true,
        }));
    }
}
