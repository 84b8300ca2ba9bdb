use crossbeam_channel as cb;
use eframe::egui;
use log::{error, warn};
use nes_beyond_host::core::{Button, ButtonSet, Player};
use nes_beyond_host::scheduler::{Speed, Tick};
use nes_beyond_host::session::Session;
use nes_beyond_host::video::{FRAME_PIXELS, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::keybinds::KeyBindings;
use crate::settings::{self, UiSettings};

const SCREEN_SIZE: [usize; 2] = [SCREEN_WIDTH, SCREEN_HEIGHT];

/// At most one audio overrun warning per interval.
const OVERRUN_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Touch controls, laid out in two rows.
const DPAD_BUTTONS: [(Button, &str); 4] = [
    (Button::Left, "◀"),
    (Button::Up, "▲"),
    (Button::Down, "▼"),
    (Button::Right, "▶"),
];
const ACTION_BUTTONS: [(Button, &str); 4] = [
    (Button::Select, "SELECT"),
    (Button::Start, "START"),
    (Button::B, "B"),
    (Button::A, "A"),
];

/// Rate-limits the audio overrun warning. The count only grows while a
/// program runs and starts from zero with the next one.
#[derive(Default)]
struct OverrunLog {
    reported: u64,
    last: Option<Instant>,
}

impl OverrunLog {
    /// Overruns since the last report, if a report is due at `now`.
    fn observe(&mut self, total: u64, now: Instant) -> Option<u64> {
        if total < self.reported {
            self.reported = 0;
        }
        let new = total - self.reported;
        if new == 0 {
            return None;
        }
        if let Some(last) = self.last
            && now.duration_since(last) < OVERRUN_LOG_INTERVAL
        {
            return None;
        }
        self.reported = total;
        self.last = Some(now);
        Some(new)
    }
}

struct StatusLine {
    text: String,
    is_error: bool,
}

pub struct NesBeyondApp {
    session: Session,
    keybinds: KeyBindings,
    settings: UiSettings,
    settings_path: PathBuf,
    audio_errors: Option<cb::Receiver<cpal::StreamError>>,
    texture: Option<egui::TextureHandle>,
    rgba: Vec<u8>,
    shown_revision: Option<u64>,
    touch_held: ButtonSet,
    status: Option<StatusLine>,
    overruns: OverrunLog,
}

impl NesBeyondApp {
    pub fn new(
        session: Session,
        keybinds: KeyBindings,
        settings: UiSettings,
        settings_path: PathBuf,
        audio_errors: Option<cb::Receiver<cpal::StreamError>>,
    ) -> Self {
        Self {
            session,
            keybinds,
            settings,
            settings_path,
            audio_errors,
            texture: None,
            rgba: vec![0; FRAME_PIXELS * 4],
            shown_revision: None,
            touch_held: ButtonSet::EMPTY,
            status: None,
            overruns: OverrunLog::default(),
        }
    }

    fn set_status(&mut self, text: impl Into<String>, is_error: bool) {
        self.status = Some(StatusLine {
            text: text.into(),
            is_error,
        });
    }

    fn save_settings(&mut self) {
        self.settings.emulator = self.session.config();
        if let Err(e) = settings::save_to_file(&self.settings_path, &self.settings) {
            warn!(
                "Failed to save settings to {}: {e}",
                self.settings_path.display()
            );
        }
    }

    fn load_program(&mut self, name: &str, image: &[u8]) {
        match self.session.load_program(name, image, Instant::now()) {
            Ok(()) => {
                self.touch_held = ButtonSet::EMPTY;
                self.status = None;
                self.overruns = OverrunLog::default();
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn load_program_file(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::read(path) {
            Ok(image) => self.load_program(&name, &image),
            Err(e) => {
                error!("Failed to read {}: {e}", path.display());
                self.set_status(format!("Could not read {name}: {e}"), true);
            }
        }
    }

    /// Load a ROM given on the command line, optionally resuming its save.
    pub fn open(&mut self, path: &Path, resume: bool) {
        self.load_program_file(path);
        if resume && self.session.program().is_some() {
            self.load_state();
        }
    }

    fn pick_program(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("NES ROM", &["nes"])
            .pick_file()
        {
            self.load_program_file(&path);
        }
    }

    fn save_state(&mut self) {
        match self.session.save_state() {
            Ok(()) => self.set_status("State Saved!", false),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn load_state(&mut self) {
        match self.session.load_state() {
            Ok(()) => self.set_status("State Loaded!", false),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn toggle_touch(&mut self) {
        let enabled = !self.session.config().touch_overlay;
        self.session.set_touch_overlay(enabled);
        self.touch_held = ButtonSet::EMPTY;
        self.save_settings();
    }

    fn set_speed(&mut self, speed: Speed) {
        self.session.set_speed(speed);
        self.save_settings();
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let mut keys = Vec::new();
        let mut dropped = Vec::new();
        ctx.input(|i| {
            for event in &i.raw.events {
                if let egui::Event::Key {
                    key,
                    pressed,
                    repeat: false,
                    ..
                } = event
                {
                    keys.push((*key, *pressed));
                }
            }
            dropped.extend(i.raw.dropped_files.iter().cloned());
        });

        for (key, pressed) in keys {
            if let Some((player, button)) = self.keybinds.binding_for(key) {
                self.session.key_event(player, button, pressed);
            }
        }

        // Only the last dropped file counts when several arrive at once.
        if let Some(file) = dropped.pop() {
            match (file.bytes, file.path) {
                (Some(bytes), _) => self.load_program(&file.name, &bytes),
                (None, Some(path)) => self.load_program_file(&path),
                (None, None) => warn!("Dropped file {} has no contents", file.name),
            }
        }
    }

    fn drain_audio_errors(&mut self) {
        let Some(rx) = &self.audio_errors else {
            return;
        };
        for err in rx.try_iter() {
            warn!("Audio stream error: {err}");
        }
    }

    fn log_overruns(&mut self) {
        let total = self.session.status().audio_overruns;
        if let Some(new) = self.overruns.observe(total, Instant::now()) {
            warn!("Audio buffer overran {new} more time(s), {total} since load");
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let frame = self.session.frame();
        if self.texture.is_some() && self.shown_revision == Some(frame.revision()) {
            return;
        }
        frame.write_rgba(&mut self.rgba);
        self.shown_revision = Some(frame.revision());

        let image = egui::ColorImage::from_rgba_unmultiplied(SCREEN_SIZE, &self.rgba);
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("nes_screen", image, egui::TextureOptions::NEAREST));
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let loaded = self.session.program().is_some();
        ui.horizontal_wrapped(|ui| {
            let upload = if loaded {
                "REPLACE ROM"
            } else {
                "UPLOAD .NES FILE"
            };
            if ui.button(upload).clicked() {
                self.pick_program();
            }
            if ui
                .add_enabled(loaded, egui::Button::new("SAVE STATE"))
                .clicked()
            {
                self.save_state();
            }
            if ui
                .add_enabled(loaded, egui::Button::new("LOAD STATE"))
                .clicked()
            {
                self.load_state();
            }

            ui.separator();
            let touch = if self.session.config().touch_overlay {
                "DISABLE TOUCH"
            } else {
                "MOBILE MODE"
            };
            if ui.button(touch).clicked() {
                self.toggle_touch();
            }

            ui.separator();
            let current = self.session.config().speed;
            for speed in Speed::PRESETS {
                if ui
                    .selectable_label(current == speed, speed.to_string())
                    .clicked()
                {
                    self.set_speed(speed);
                }
            }
        });

        if let Some(program) = self.session.program() {
            ui.label(format!("Loaded: {}", program.name));
        }
        if let Some(status) = &self.status {
            let color = if status.is_error {
                ui.visuals().error_fg_color
            } else {
                ui.visuals().strong_text_color()
            };
            ui.label(egui::RichText::new(&status.text).color(color));
        }
    }

    fn key_legend(&self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            ui.strong("Controls");
            for (key, action) in self.keybinds.legend(Player::ONE) {
                ui.label(egui::RichText::new(key).monospace().strong());
                ui.label(action);
                ui.add_space(8.0);
            }
        });
    }

    fn screen(&mut self, ui: &mut egui::Ui) {
        let scale = self.settings.window_scale() as f32;
        let size = egui::vec2(SCREEN_WIDTH as f32 * scale, SCREEN_HEIGHT as f32 * scale);
        ui.vertical_centered(|ui| match (&self.texture, self.session.program()) {
            (Some(texture), Some(_)) => {
                ui.add(egui::Image::from_texture(texture).fit_to_exact_size(size));
            }
            _ => {
                let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
                ui.painter().rect_filled(rect, 0.0, egui::Color32::BLACK);
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "INSERT CARTRIDGE",
                    egui::FontId::proportional(24.0 * scale / 2.0),
                    egui::Color32::GRAY,
                );
            }
        });
    }

    fn touch_overlay(&mut self, ui: &mut egui::Ui) {
        let mut held = ButtonSet::EMPTY;
        for row in [DPAD_BUTTONS, ACTION_BUTTONS] {
            ui.horizontal(|ui| {
                for (button, label) in row {
                    let response = ui.add(
                        egui::Button::new(egui::RichText::new(label).size(20.0))
                            .min_size(egui::vec2(56.0, 40.0)),
                    );
                    if response.is_pointer_button_down_on() {
                        held.insert(button);
                    }
                }
            });
        }

        for button in self.touch_held.difference(held).iter() {
            self.session.touch_event(button, false);
        }
        for button in held.difference(self.touch_held).iter() {
            self.session.touch_event(button, true);
        }
        self.touch_held = held;
    }
}

impl eframe::App for NesBeyondApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_audio_errors();
        self.log_overruns();
        self.handle_input(ctx);

        match self.session.tick(Instant::now()) {
            Tick::Advance => ctx.request_repaint(),
            Tick::Wait(wait) => ctx.request_repaint_after(wait),
            Tick::Idle => {}
        }
        self.upload_frame(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| self.controls(ui));
        if self.session.config().touch_overlay {
            egui::TopBottomPanel::bottom("touch").show(ctx, |ui| self.touch_overlay(ui));
        } else {
            egui::TopBottomPanel::bottom("legend").show(ctx, |ui| self.key_legend(ui));
        }
        egui::CentralPanel::default().show(ctx, |ui| self.screen(ui));
    }
}
