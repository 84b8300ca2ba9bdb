//! Game controllers via gilrs, sampled once per emulated frame.

use std::collections::HashSet;

use gilrs::{Axis, EventType, GamepadId, Gilrs};
use log::{info, warn};
use nes_beyond_host::core::{Button, ButtonSet, MAX_PLAYERS};
use nes_beyond_host::input::{LevelSource, STICK_THRESHOLD, stick_to_dpad};

/// Maps connected pads to player 1 and 2. A pad keeps its player until it
/// disconnects; the freed slot goes to the next pad that connects.
pub struct Gamepads {
    gilrs: Gilrs,
    slots: PlayerSlots<GamepadId>,
}

impl Gamepads {
    pub fn new() -> Option<Self> {
        match Gilrs::new() {
            Ok(gilrs) => {
                let mut slots = PlayerSlots::default();
                for (id, gp) in gilrs.gamepads() {
                    if let Some(slot) = slots.connect(id) {
                        info!("Gamepad connected as player {}: {}", slot + 1, gp.name());
                    }
                }
                Some(Self { gilrs, slots })
            }
            Err(e) => {
                warn!("Gamepad support unavailable: {e}");
                None
            }
        }
    }

    fn drain_events(&mut self) {
        while let Some(gilrs::Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    if let Some(slot) = self.slots.connect(id) {
                        info!(
                            "Gamepad connected as player {}: {}",
                            slot + 1,
                            self.gilrs.gamepad(id).name()
                        );
                    }
                }
                EventType::Disconnected => {
                    if let Some(slot) = self.slots.disconnect(id) {
                        info!("Gamepad for player {} disconnected", slot + 1);
                    }
                }
                EventType::ButtonPressed(b, _) => {
                    if let Some(state) = self.slots.state_mut(id) {
                        state.button(b, true);
                    }
                }
                EventType::ButtonReleased(b, _) => {
                    if let Some(state) = self.slots.state_mut(id) {
                        state.button(b, false);
                    }
                }
                EventType::AxisChanged(axis, value, _) => {
                    if let Some(state) = self.slots.state_mut(id) {
                        state.axis(axis, value);
                    }
                }
                _ => {}
            }
        }
    }
}

impl LevelSource for Gamepads {
    fn sample(&mut self) -> [ButtonSet; MAX_PLAYERS] {
        self.drain_events();
        self.slots.levels()
    }
}

/// Fixed player slots keyed by pad id.
struct PlayerSlots<K> {
    slots: [Option<(K, PadState)>; MAX_PLAYERS],
}

impl<K> Default for PlayerSlots<K> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<K: Copy + PartialEq> PlayerSlots<K> {
    /// Give `id` the first free slot. Returns it, or `None` if `id` already
    /// has one or every slot is taken.
    fn connect(&mut self, id: K) -> Option<usize> {
        if self.position(id).is_some() {
            return None;
        }
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some((id, PadState::default()));
        Some(slot)
    }

    fn disconnect(&mut self, id: K) -> Option<usize> {
        let slot = self.position(id)?;
        self.slots[slot] = None;
        Some(slot)
    }

    fn position(&self, id: K) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|(k, _)| *k == id))
    }

    fn state_mut(&mut self, id: K) -> Option<&mut PadState> {
        let slot = self.position(id)?;
        self.slots[slot].as_mut().map(|(_, state)| state)
    }

    fn levels(&self) -> [ButtonSet; MAX_PLAYERS] {
        let mut levels = [ButtonSet::EMPTY; MAX_PLAYERS];
        for (level, slot) in levels.iter_mut().zip(&self.slots) {
            if let Some((_, state)) = slot {
                *level = state.levels();
            }
        }
        levels
    }
}

#[derive(Debug, Default, Clone)]
struct PadState {
    pressed: HashSet<gilrs::Button>,
    stick_x: f32,
    stick_y: f32,
}

impl PadState {
    fn button(&mut self, b: gilrs::Button, pressed: bool) {
        if pressed {
            self.pressed.insert(b);
        } else {
            self.pressed.remove(&b);
        }
    }

    fn axis(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::LeftStickX => self.stick_x = value,
            Axis::LeftStickY => self.stick_y = value,
            _ => {}
        }
    }

    /// Several physical buttons can map to one console button; it is held
    /// while any of them is.
    fn levels(&self) -> ButtonSet {
        ButtonSet::from_buttons(self.pressed.iter().filter_map(|&b| map_button(b)))
            .union(stick_to_dpad(self.stick_x, self.stick_y, STICK_THRESHOLD))
    }
}

/// Face buttons follow the controller's layout: B on the left/bottom, A on
/// the right/top.
fn map_button(b: gilrs::Button) -> Option<Button> {
    match b {
        gilrs::Button::DPadUp => Some(Button::Up),
        gilrs::Button::DPadDown => Some(Button::Down),
        gilrs::Button::DPadLeft => Some(Button::Left),
        gilrs::Button::DPadRight => Some(Button::Right),
        gilrs::Button::East | gilrs::Button::North => Some(Button::A),
        gilrs::Button::South | gilrs::Button::West => Some(Button::B),
        gilrs::Button::Start => Some(Button::Start),
        gilrs::Button::Select => Some(Button::Select),
        _ => None,
    }
}
