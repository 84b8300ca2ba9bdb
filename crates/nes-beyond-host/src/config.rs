use serde::{Deserialize, Serialize};

use crate::scheduler::Speed;

/// User-selected emulation settings.
///
/// The scheduler reads `speed` and the input multiplexer reads
/// `touch_overlay`; only user actions change them, between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmulatorConfig {
    pub speed: Speed,
    pub touch_overlay: bool,
}
