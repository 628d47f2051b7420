// src/edges.rs
//! Conversion boundary between the capture buffer, the filter and egui.
//!
//! Everything toolkit-specific about pixel formats stays in this file:
//! captured frames come in as RGBA, the filter works on `GrayImage`, and the
//! result leaves as an `egui::ColorImage` ready for a texture upload.

use egui::ColorImage;
use image::{imageops, GrayImage, RgbaImage};
use imageproc::edges::canny;

use crate::config::{DEFAULT_LOWER_THRESHOLD, DEFAULT_UPPER_THRESHOLD};

/// Canny hysteresis thresholds, each clamped to `0..=255`.
///
/// No ordering is enforced between the two; [`detect_edges`] sorts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPair {
    lower: u8,
    upper: u8,
}

impl ThresholdPair {
    pub const fn new(lower: u8, upper: u8) -> Self {
        Self { lower, upper }
    }

    pub fn lower(&self) -> u8 {
        self.lower
    }

    pub fn upper(&self) -> u8 {
        self.upper
    }

    pub fn set_lower(&mut self, value: i32) {
        self.lower = clamp_channel(value);
    }

    pub fn set_upper(&mut self, value: i32) {
        self.upper = clamp_channel(value);
    }

    /// (low, high) as the filter expects them.
    ///
    /// Both stay strictly positive: hysteresis treats a zero low threshold as
    /// matching the zeroed image border and walks off the image.
    fn ordered(&self) -> (f32, f32) {
        let low = (self.lower.min(self.upper) as f32).max(f32::MIN_POSITIVE);
        let high = (self.lower.max(self.upper) as f32).max(low);
        (low, high)
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self::new(DEFAULT_LOWER_THRESHOLD, DEFAULT_UPPER_THRESHOLD)
    }
}

#[inline]
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

/// Luma conversion of a captured RGBA frame.
pub fn to_grayscale(frame: &RgbaImage) -> GrayImage {
    imageops::grayscale(frame)
}

/// Runs Canny on `gray`. Output pixels are 255 on edges and 0 elsewhere.
pub fn detect_edges(gray: &GrayImage, thresholds: ThresholdPair) -> GrayImage {
    let (width, height) = gray.dimensions();
    // Non-maximum suppression walks the interior only; tiny frames have none.
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }
    let (low, high) = thresholds.ordered();
    canny(gray, low, high)
}

/// Wraps a single-channel edge image as an egui image.
pub fn edge_image_to_color(edges: &GrayImage) -> ColorImage {
    let size = [edges.width() as usize, edges.height() as usize];
    ColorImage::from_gray(size, edges.as_raw())
}

/// Full per-tick filter pass: RGBA frame in, displayable edge image out.
pub fn process_frame(frame: &RgbaImage, thresholds: ThresholdPair) -> ColorImage {
    let gray = to_grayscale(frame);
    let edges = detect_edges(&gray, thresholds);
    edge_image_to_color(&edges)
}
