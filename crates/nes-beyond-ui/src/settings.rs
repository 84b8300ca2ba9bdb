use log::warn;
use nes_beyond_host::config::EmulatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "nes-beyond";

pub const DEFAULT_WINDOW_SCALE: u32 = 3;
pub const MAX_WINDOW_SCALE: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub emulator: EmulatorConfig,
    pub save_dir: Option<PathBuf>,
    pub window_scale: u32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            emulator: EmulatorConfig::default(),
            save_dir: None,
            window_scale: DEFAULT_WINDOW_SCALE,
        }
    }
}

impl UiSettings {
    pub fn window_scale(&self) -> u32 {
        self.window_scale.clamp(1, MAX_WINDOW_SCALE)
    }

    /// Where save states go: the configured directory, else `states/` next to
    /// the settings file.
    pub fn save_dir(&self) -> PathBuf {
        self.save_dir.clone().unwrap_or_else(default_save_dir)
    }
}

/// Per-user configuration directory for the emulator.
pub fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR);
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(APP_DIR);
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".config").join(APP_DIR);
    }

    PathBuf::new()
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("ui.toml")
}

pub fn default_save_dir() -> PathBuf {
    config_dir().join("states")
}

pub fn load_from_file(path: &Path) -> UiSettings {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return UiSettings::default(),
    };

    match toml::from_str::<UiSettings>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse settings {}: {e}; using defaults",
                path.display()
            );
            UiSettings::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &UiSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg).map_err(std::io::Error::other)?;
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nes_beyond_host::scheduler::Speed;

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ui.toml");
        let cfg = UiSettings {
            emulator: EmulatorConfig {
                speed: Speed::new(2.0).unwrap(),
                touch_overlay: true,
            },
            save_dir: Some(dir.path().join("states")),
            window_scale: 4,
        };
        save_to_file(&path, &cfg).unwrap();
        assert_eq!(load_from_file(&path), cfg);
    }

    #[test]
    fn missing_or_broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui.toml");
        assert_eq!(load_from_file(&path), UiSettings::default());

        std::fs::write(&path, "window_scale = \"huge\"").unwrap();
        assert_eq!(load_from_file(&path), UiSettings::default());
    }

    #[test]
    fn partial_files_keep_remaining_defaults() {
        let cfg: UiSettings = toml::from_str("[emulator]\nspeed = 3.0\n").unwrap();
        assert_eq!(cfg.emulator.speed, Speed::new(3.0).unwrap());
        assert!(!cfg.emulator.touch_overlay);
        assert_eq!(cfg.window_scale, DEFAULT_WINDOW_SCALE);
    }

    #[test]
    fn rejects_non_positive_speed() {
        assert!(toml::from_str::<UiSettings>("[emulator]\nspeed = 0.0\n").is_err());
    }

    #[test]
    fn window_scale_is_clamped() {
        let cfg = UiSettings {
            window_scale: 0,
            ..UiSettings::default()
        };
        assert_eq!(cfg.window_scale(), 1);
    }
}
