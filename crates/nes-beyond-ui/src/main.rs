mod app;
mod audio;
#[cfg(not(target_os = "android"))]
mod gamepad;
mod keybinds;
mod settings;

use clap::Parser;
use eframe::egui;
use log::{error, info, warn};
use nes_beyond_host::core::{ConsoleCore, CoreFactory};
use nes_beyond_host::output::NullAudioBackend;
use nes_beyond_host::pattern::PatternCore;
use nes_beyond_host::savestate::FileStore;
use nes_beyond_host::scheduler::{Speed, Tick};
use nes_beyond_host::session::Session;
use nes_beyond_host::video::{SCREEN_HEIGHT, SCREEN_WIDTH};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use crate::app::NesBeyondApp;
use crate::keybinds::KeyBindings;
use crate::settings::UiSettings;

/// Room for the control bar above the screen and the key legend below it.
const CONTROLS_HEIGHT: f32 = 120.0;

#[derive(Parser)]
#[command(name = "nes-beyond", about = "NES emulator front end")]
struct Args {
    /// Path to a .nes ROM file
    rom: Option<PathBuf>,

    /// Emulation speed multiplier, e.g. 0.5, 1, 2, 3
    #[arg(long, value_parser = parse_speed)]
    speed: Option<Speed>,

    /// Start with the on-screen touch controls enabled
    #[arg(long)]
    touch: bool,

    /// Run without opening a window
    #[arg(long)]
    headless: bool,

    /// Number of frames to run in headless mode
    #[arg(long)]
    frames: Option<u64>,

    /// Number of seconds to run in headless mode
    #[arg(long)]
    seconds: Option<u64>,

    /// Save the emulator state when a headless run ends
    #[arg(long)]
    save_state: bool,

    /// Restore the saved state for the ROM right after loading it
    #[arg(long)]
    load_state: bool,

    /// Settings file to use instead of the per-user default
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_speed(raw: &str) -> Result<Speed, String> {
    let factor: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    Speed::new(factor).ok_or_else(|| format!("speed must be positive, got {raw}"))
}

fn core_factory() -> CoreFactory {
    Box::new(|| Ok(Box::new(PatternCore::new()) as Box<dyn ConsoleCore>))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(settings::default_settings_path);
    let mut ui_settings = settings::load_from_file(&settings_path);
    if let Some(speed) = args.speed {
        ui_settings.emulator.speed = speed;
    }
    if args.touch {
        ui_settings.emulator.touch_overlay = true;
    }

    if args.headless {
        run_headless(&args, &ui_settings)
    } else {
        run_window(&args, ui_settings, settings_path)
    }
}

fn run_headless(args: &Args, ui_settings: &UiSettings) -> ExitCode {
    let Some(rom) = &args.rom else {
        error!("Headless mode needs a ROM path");
        return ExitCode::FAILURE;
    };
    let image = match std::fs::read(rom) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to read {}: {e}", rom.display());
            return ExitCode::FAILURE;
        }
    };

    let store = FileStore::new(ui_settings.save_dir());
    let mut session = Session::new(
        core_factory(),
        Box::new(NullAudioBackend),
        Box::new(store),
    );
    session.apply_config(ui_settings.emulator);

    if let Err(e) = session.load_program(&file_name(rom), &image, Instant::now()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    if args.load_state {
        match session.load_state() {
            Ok(()) => info!("State Loaded!"),
            Err(e) => warn!("{e}"),
        }
    }

    let frame_limit = args.frames;
    let second_limit = args.seconds.map(Duration::from_secs);
    let start = Instant::now();
    loop {
        match session.tick(Instant::now()) {
            Tick::Advance => {}
            Tick::Wait(wait) => std::thread::sleep(wait),
            Tick::Idle => break,
        }

        if let Some(max) = frame_limit
            && session.status().frames >= max
        {
            break;
        }
        if let Some(limit) = second_limit
            && start.elapsed() >= limit
        {
            break;
        }
    }

    let status = session.status();
    if args.save_state {
        if let Err(e) = session.save_state() {
            error!("{e}");
            return ExitCode::FAILURE;
        }
        info!("State Saved!");
    }

    println!(
        "{}: {} frames in {:.2}s, {} audio overruns",
        status.program.unwrap_or_default(),
        status.frames,
        start.elapsed().as_secs_f64(),
        status.audio_overruns
    );
    ExitCode::SUCCESS
}

fn load_keybinds() -> KeyBindings {
    let path = keybinds::default_keybinds_path();
    if path.exists() {
        return KeyBindings::load_from_file(&path);
    }
    let bindings = KeyBindings::defaults();
    if let Err(e) = bindings.save_to_file(&path) {
        warn!("Failed to write default keybinds to {}: {e}", path.display());
    }
    bindings
}

fn run_window(args: &Args, ui_settings: UiSettings, settings_path: PathBuf) -> ExitCode {
    let (backend, audio_errors) = audio::CpalBackend::new();
    let store = FileStore::new(ui_settings.save_dir());
    let mut session = Session::new(core_factory(), Box::new(backend), Box::new(store));
    session.apply_config(ui_settings.emulator);

    #[cfg(not(target_os = "android"))]
    if let Some(pads) = gamepad::Gamepads::new() {
        session.set_level_source(Box::new(pads));
    }

    let scale = ui_settings.window_scale() as f32;
    let mut app = NesBeyondApp::new(
        session,
        load_keybinds(),
        ui_settings,
        settings_path,
        Some(audio_errors),
    );
    if let Some(rom) = &args.rom {
        app.open(rom, args.load_state);
    }

    let viewport = egui::ViewportBuilder::default()
        .with_title("NES Beyond")
        .with_inner_size([
            SCREEN_WIDTH as f32 * scale + 16.0,
            SCREEN_HEIGHT as f32 * scale + CONTROLS_HEIGHT,
        ])
        .with_drag_and_drop(true);
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    match eframe::run_native("NES Beyond", options, Box::new(|_| Ok(Box::new(app)))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to open window: {e}");
            ExitCode::FAILURE
        }
    }
}
