// src/capture.rs
use image::{imageops, RgbaImage};
use log::{debug, info};
use xcap::Monitor;

use crate::selection::{Rectangle, ScreenPoint};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No monitor found")]
    NoMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error(
        "Region ({},{} {}x{}) lies outside the {}x{} screen",
        region.x, region.y, region.width, region.height,
        screen.0, screen.1
    )]
    OffScreen { region: Rectangle, screen: (u32, u32) },
}

/// Source of captured screen regions for the overlay's tick.
pub trait RegionSource {
    fn capture(&mut self, region: Rectangle) -> Result<RgbaImage, CaptureError>;
}

/// Captures one monitor through `xcap` and crops it to the region.
///
/// The monitor is the one under `anchor` (a desktop point inside the selector
/// window), so region coordinates line up with where the user dragged. Without
/// an anchor, or when no monitor contains it, the primary monitor is used.
/// Region coordinates are physical pixels relative to the monitor origin.
#[derive(Debug, Default)]
pub struct ScreenCapture {
    anchor: Option<ScreenPoint>,
    logged_monitor: bool,
}

impl ScreenCapture {
    pub fn new(anchor: Option<ScreenPoint>) -> Self {
        Self {
            anchor,
            logged_monitor: false,
        }
    }

    fn monitor(&mut self) -> Result<Monitor, CaptureError> {
        let anchored = self.anchor.and_then(|a| match Monitor::from_point(a.x, a.y) {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                debug!("No monitor at ({}, {}): {}. Using the primary one.", a.x, a.y, e);
                None
            }
        });
        let monitor = match anchored {
            Some(monitor) => monitor,
            None => primary_monitor()?,
        };

        if !self.logged_monitor {
            info!(
                "Capturing from monitor {:?}",
                monitor.name().unwrap_or_default()
            );
            self.logged_monitor = true;
        }
        Ok(monitor)
    }
}

fn primary_monitor() -> Result<Monitor, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;

    let mut primary = None;
    let mut first = None;
    for monitor in monitors {
        if monitor.is_primary().unwrap_or(false) {
            primary = Some(monitor);
            break;
        }
        if first.is_none() {
            first = Some(monitor);
        }
    }
    // Fallback: if no monitor reports as primary, use the first one
    primary.or(first).ok_or(CaptureError::NoMonitor)
}

impl RegionSource for ScreenCapture {
    fn capture(&mut self, region: Rectangle) -> Result<RgbaImage, CaptureError> {
        let monitor = self.monitor()?;
        let screen = monitor
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
        crop_region(&screen, region)
    }
}

/// Crops `screen` to the part of `region` that is actually on it.
pub fn crop_region(screen: &RgbaImage, region: Rectangle) -> Result<RgbaImage, CaptureError> {
    let (screen_w, screen_h) = screen.dimensions();
    let (x, y, width, height) =
        visible_area(region, screen_w, screen_h).ok_or(CaptureError::OffScreen {
            region,
            screen: (screen_w, screen_h),
        })?;
    if (width, height) != (region.width, region.height) {
        debug!(
            "Region clamped to {}x{} at ({}, {}) on a {}x{} screen",
            width, height, x, y, screen_w, screen_h
        );
    }
    Ok(imageops::crop_imm(screen, x, y, width, height).to_image())
}

/// Intersection of `region` with a `screen_w` x `screen_h` screen as
/// `(x, y, width, height)`, or `None` when nothing of it is visible.
pub fn visible_area(region: Rectangle, screen_w: u32, screen_h: u32) -> Option<(u32, u32, u32, u32)> {
    let left = i64::from(region.x).max(0);
    let top = i64::from(region.y).max(0);
    let right = (i64::from(region.x) + i64::from(region.width)).min(i64::from(screen_w));
    let bottom = (i64::from(region.y) + i64::from(region.height)).min(i64::from(screen_h));

    if right <= left || bottom <= top {
        return None;
    }
    Some((
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn rect(x: i32, y: i32, width: u32, height: u32) -> Rectangle {
        Rectangle { x, y, width, height }
    }

    #[test]
    fn region_inside_screen_is_unchanged() {
        assert_eq!(visible_area(rect(10, 10, 100, 50), 1920, 1080), Some((10, 10, 100, 50)));
    }

    #[test]
    fn region_hanging_off_the_edge_is_clamped() {
        assert_eq!(visible_area(rect(1900, 1000, 100, 100), 1920, 1080), Some((1900, 1000, 20, 80)));
        assert_eq!(visible_area(rect(-30, -5, 100, 50), 1920, 1080), Some((0, 0, 70, 45)));
    }

    #[test]
    fn region_fully_off_screen_has_no_area() {
        assert_eq!(visible_area(rect(2000, 10, 100, 50), 1920, 1080), None);
        assert_eq!(visible_area(rect(-200, 10, 100, 50), 1920, 1080), None);
        assert_eq!(visible_area(rect(10, 10, 0, 50), 1920, 1080), None);
    }

    #[test]
    fn crop_copies_the_requested_pixels() {
        let screen = RgbaImage::from_fn(40, 30, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let cropped = crop_region(&screen, rect(5, 7, 10, 4)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 4));
        assert_eq!(cropped.get_pixel(0, 0), &Rgba([5, 7, 0, 255]));
        assert_eq!(cropped.get_pixel(9, 3), &Rgba([14, 10, 0, 255]));
    }

    #[test]
    fn crop_off_screen_is_an_error() {
        let screen = RgbaImage::new(40, 30);
        let result = crop_region(&screen, rect(50, 50, 10, 10));
        assert!(matches!(result, Err(CaptureError::OffScreen { .. })));
    }
}
