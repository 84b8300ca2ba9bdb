use eframe::egui::Key;
use log::{info, warn};
use nes_beyond_host::core::{Button, Player};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::settings::config_dir;

pub fn default_keybinds_path() -> PathBuf {
    config_dir().join("keybinds.toml")
}

/// Keyboard to controller mapping. One key per (player, button).
#[derive(Clone, Debug)]
pub struct KeyBindings {
    joypad: HashMap<Key, (Player, Button)>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl KeyBindings {
    pub fn defaults() -> Self {
        let p1 = [
            (Key::W, Button::Up),
            (Key::S, Button::Down),
            (Key::A, Button::Left),
            (Key::D, Button::Right),
            (Key::J, Button::A),
            (Key::K, Button::B),
            (Key::Enter, Button::Start),
            // egui reports no key event for Shift on its own
            (Key::Tab, Button::Select),
        ];
        let p2 = [
            (Key::ArrowUp, Button::Up),
            (Key::ArrowDown, Button::Down),
            (Key::ArrowLeft, Button::Left),
            (Key::ArrowRight, Button::Right),
            (Key::Period, Button::A),
            (Key::Comma, Button::B),
            (Key::Num0, Button::Start),
            (Key::Num9, Button::Select),
        ];

        let joypad = p1
            .into_iter()
            .map(|(k, b)| (k, (Player::ONE, b)))
            .chain(p2.into_iter().map(|(k, b)| (k, (Player::TWO, b))))
            .collect();
        Self { joypad }
    }

    pub fn load_from_file(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            warn!(
                "Failed to read keybinds file {}; using defaults",
                path.display()
            );
            return Self::defaults();
        };
        Self::parse(&text, &path.display().to_string())
    }

    /// Apply `name = Key` lines over the defaults. `origin` only labels warnings.
    pub fn parse(text: &str, origin: &str) -> Self {
        let mut bindings = Self::defaults();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((name, value)) = line.split_once('=') else {
                warn!(
                    "Ignoring invalid keybinds line {origin}:{} (expected name = value)",
                    line_no + 1
                );
                continue;
            };

            let name = name.trim();
            let value = value.trim();
            let Some(key) = parse_key(value) else {
                warn!(
                    "Ignoring keybinds line {origin}:{} (unknown Key '{value}')",
                    line_no + 1
                );
                continue;
            };
            let Some(target) = parse_target(name) else {
                warn!(
                    "Ignoring unknown keybind name '{name}' in {origin}:{}",
                    line_no + 1
                );
                continue;
            };

            bindings.rebind(target.0, target.1, key);
        }

        bindings
    }

    pub fn binding_for(&self, key: Key) -> Option<(Player, Button)> {
        self.joypad.get(&key).copied()
    }

    pub fn key_for(&self, player: Player, button: Button) -> Option<Key> {
        self.joypad
            .iter()
            .find(|&(_, &t)| t == (player, button))
            .map(|(k, _)| *k)
    }

    /// Key names for the on-screen controls help, d-pad first.
    pub fn legend(&self, player: Player) -> Vec<(String, &'static str)> {
        let key = |button| self.key_for(player, button).map_or("-", Key::name);
        let dpad = [Button::Up, Button::Left, Button::Down, Button::Right]
            .map(key)
            .join("/");
        vec![
            (dpad, "D-Pad"),
            (key(Button::A).to_string(), "Button A"),
            (key(Button::B).to_string(), "Button B"),
            (key(Button::Start).to_string(), "Start"),
            (key(Button::Select).to_string(), "Select"),
        ]
    }

    /// Bind `key` to the button, dropping the button's old key and whatever
    /// the key was bound to before.
    pub fn rebind(&mut self, player: Player, button: Button, key: Key) {
        self.joypad.retain(|_, t| *t != (player, button));
        self.joypad.insert(key, (player, button));
    }

    pub fn to_text(&self) -> String {
        let mut lines = vec!["# NES Beyond keybinds".to_string()];
        for player in Player::all() {
            lines.push(String::new());
            for button in Button::ALL {
                if let Some(key) = self.key_for(player, button) {
                    lines.push(format!(
                        "p{}_{} = {}",
                        player.number(),
                        button.name(),
                        key.name()
                    ));
                }
            }
        }
        lines.join("\n") + "\n"
    }

    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        info!("Saved keybinds to {}", path.display());
        Ok(())
    }
}

/// `p1_up` style names.
fn parse_target(name: &str) -> Option<(Player, Button)> {
    let rest = name.strip_prefix('p')?;
    let (number, button) = rest.split_once('_')?;
    let player = Player::new(number.parse().ok()?)?;
    Some((player, Button::from_name(button)?))
}

fn parse_key(raw: &str) -> Option<Key> {
    let s = raw.trim();
    Key::from_name(s).or_else(|| {
        // single letters may be written in either case
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                Key::from_name(&c.to_ascii_uppercase().to_string())
            }
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_controllers() {
        let b = KeyBindings::defaults();
        assert_eq!(b.binding_for(Key::W), Some((Player::ONE, Button::Up)));
        assert_eq!(b.binding_for(Key::J), Some((Player::ONE, Button::A)));
        assert_eq!(b.binding_for(Key::Enter), Some((Player::ONE, Button::Start)));
        assert_eq!(
            b.binding_for(Key::ArrowLeft),
            Some((Player::TWO, Button::Left))
        );
        for player in Player::all() {
            for button in Button::ALL {
                assert!(b.key_for(player, button).is_some(), "{player} {button:?}");
            }
        }
    }

    #[test]
    fn parse_overrides_and_skips_garbage() {
        let text = "\
# comment
p1_a = l
p2_start = Space   # trailing comment
p3_up = Q
p1_jump = Z
p1_b = NoSuchKey
not a binding
";
        let b = KeyBindings::parse(text, "test");
        assert_eq!(b.binding_for(Key::L), Some((Player::ONE, Button::A)));
        assert_eq!(b.binding_for(Key::J), None);
        assert_eq!(b.binding_for(Key::Space), Some((Player::TWO, Button::Start)));
        assert_eq!(b.binding_for(Key::Num0), None);
        assert_eq!(b.binding_for(Key::Q), None);
        assert_eq!(b.binding_for(Key::Z), None);
        assert_eq!(b.key_for(Player::ONE, Button::B), Some(Key::K));
    }

    #[test]
    fn rebinding_a_used_key_moves_it() {
        let mut b = KeyBindings::defaults();
        b.rebind(Player::TWO, Button::A, Key::W);
        assert_eq!(b.binding_for(Key::W), Some((Player::TWO, Button::A)));
        assert_eq!(b.key_for(Player::ONE, Button::Up), None);
        assert_eq!(b.binding_for(Key::Period), None);
    }

    #[test]
    fn legend_follows_bindings() {
        let mut b = KeyBindings::defaults();
        let legend = b.legend(Player::ONE);
        assert_eq!(legend[0], ("W/A/S/D".to_string(), "D-Pad"));
        assert!(legend.contains(&("J".to_string(), "Button A")));
        assert!(legend.contains(&("Enter".to_string(), "Start")));

        b.rebind(Player::ONE, Button::A, Key::L);
        b.rebind(Player::TWO, Button::Select, Key::Tab);
        let legend = b.legend(Player::ONE);
        assert!(legend.contains(&("L".to_string(), "Button A")));
        assert!(legend.contains(&("-".to_string(), "Select")));
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("keybinds.toml");
        let mut b = KeyBindings::defaults();
        b.rebind(Player::ONE, Button::Select, Key::Backspace);
        b.save_to_file(&path).unwrap();

        let loaded = KeyBindings::load_from_file(&path);
        assert_eq!(
            loaded.binding_for(Key::Backspace),
            Some((Player::ONE, Button::Select))
        );
        assert_eq!(loaded.binding_for(Key::Tab), None);
        assert_eq!(loaded.joypad, b.joypad);
    }
}
