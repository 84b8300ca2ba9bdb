//! Real-time host loop for a pluggable NES emulation core.
//!
//! This crate paces frames against wall-clock time, converts the core's pixel
//! output for display, buffers its audio for the device callback, merges
//! input devices into controller button edges, and saves/restores opaque
//! snapshots. The emulation itself sits behind [`core::ConsoleCore`].
//! Frontends (desktop UI, headless runner) live in a separate crate and drive
//! the host via the [`session`] facade.

/// Lock-free single-producer/single-consumer stereo sample ring.
pub mod audio_ring;

/// User-selected emulation settings.
pub mod config;

/// Console-core contract: buttons, players, sinks.
pub mod core;

/// Error types shared across the host.
pub mod error;

/// Keyboard/touch/gamepad merging into button edge events.
pub mod input;

/// Audio device seam.
pub mod output;

/// Deterministic test-pattern core.
pub mod pattern;

/// Snapshot persistence.
pub mod savestate;

/// Frame pacing against wall-clock time.
pub mod scheduler;

/// Facade wiring the scheduler, core, input, audio and save states together.
pub mod session;

/// 24-bit to display-ready 32-bit pixel conversion.
pub mod video;
