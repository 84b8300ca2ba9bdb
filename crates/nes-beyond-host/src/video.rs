use log::debug;

use crate::core::VideoSink;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;
pub const FRAME_PIXELS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

const OPAQUE: u32 = 0xFF00_0000;

/// Display-ready frame: one `0xAARRGGBB` cell per pixel, alpha always opaque.
///
/// Only the render path writes it, and only as a whole frame at a time.
pub struct PixelBuffer {
    cells: Box<[u32]>,
    frames_written: u64,
    revision: u64,
}

impl PixelBuffer {
    pub fn new() -> Self {
        Self {
            cells: vec![OPAQUE; FRAME_PIXELS].into_boxed_slice(),
            frames_written: 0,
            revision: 0,
        }
    }

    pub fn pixels(&self) -> &[u32] {
        &self.cells
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Bumped on every change to the pixels, including [`clear`](Self::clear).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Blank back to opaque black, e.g. when a program is ejected.
    pub fn clear(&mut self) {
        self.cells.fill(OPAQUE);
        self.revision += 1;
    }

    /// Write the frame as RGBA8 bytes, the layout display textures expect.
    pub fn write_rgba(&self, out: &mut [u8]) {
        for (dst, &src) in out.chunks_exact_mut(4).zip(self.cells.iter()) {
            dst[0] = (src >> 16) as u8;
            dst[1] = (src >> 8) as u8;
            dst[2] = src as u8;
            dst[3] = (src >> 24) as u8;
        }
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink for PixelBuffer {
    fn frame_emitted(&mut self, pixels: &[u32]) {
        if convert_frame(pixels, self) {
            self.frames_written += 1;
            self.revision += 1;
        }
    }
}

/// Convert a core frame of 24-bit `0x00RRGGBB` colours into `dst`.
///
/// Frames of the wrong size are dropped and `dst` keeps the previous frame.
pub fn convert_frame(src: &[u32], dst: &mut PixelBuffer) -> bool {
    if src.len() != FRAME_PIXELS {
        debug!(
            "dropping frame of {} pixels (expected {FRAME_PIXELS})",
            src.len()
        );
        return false;
    }

    for (cell, &rgb) in dst.cells.iter_mut().zip(src) {
        *cell = OPAQUE | (rgb & 0x00FF_FFFF);
    }
    true
}
