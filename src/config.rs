// src/config.rs
use std::time::Duration;

use egui::Color32;

use crate::edges::ThresholdPair;

// --- Selector styling ---
pub const SELECTOR_DIM: Color32 = Color32::from_black_alpha(77); // ~30% opacity
pub const SELECTION_OUTLINE: Color32 = Color32::RED;
pub const SELECTION_OUTLINE_WIDTH: f32 = 2.0;

// --- Overlay styling ---
pub const OVERLAY_BACKGROUND: Color32 = Color32::from_black_alpha(150);

pub const DEFAULT_LOWER_THRESHOLD: u8 = 50;
pub const DEFAULT_UPPER_THRESHOLD: u8 = 150;
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_millis(1000);

/// Settings for the floating edge overlay window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayConfig {
    pub capture_interval: Duration,
    pub thresholds: ThresholdPair,
    /// Inner size in points.
    pub window_size: [f32; 2],
    /// Outer position in points, independent of the selected region.
    pub window_position: [f32; 2],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            capture_interval: DEFAULT_CAPTURE_INTERVAL,
            thresholds: ThresholdPair::new(DEFAULT_LOWER_THRESHOLD, DEFAULT_UPPER_THRESHOLD),
            window_size: [400.0, 400.0],
            window_position: [100.0, 100.0],
        }
    }
}
