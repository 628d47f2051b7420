// src/overlay.rs
use std::time::{Duration, Instant};

use anyhow::{ensure, Context as _};
use egui::{
    pos2, Align, Color32, ColorImage, ImageData, Layout, Rect, RichText, Sense, TextureHandle,
    TextureOptions, ViewportCommand,
};
use log::{debug, info, warn};

use crate::{
    capture::RegionSource,
    config::{OverlayConfig, OVERLAY_BACKGROUND},
    edges::{self, ThresholdPair},
    selection::Rectangle,
};

const HEADER_HEIGHT: f32 = 22.0;

/// Fixed-period timer driven by the UI loop. Re-arms itself on every fire.
#[derive(Debug)]
pub struct CaptureTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl CaptureTimer {
    /// First fire is one `period` after `start`.
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_due: Some(start + period),
        }
    }

    /// `true` once per elapsed period. Late polls fire once and re-arm from `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    /// Time until the next fire; `None` once stopped.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }
}

/// Floating window that re-captures one region, runs Canny on it and shows the result.
pub struct EdgeOverlay {
    region: Rectangle,
    thresholds: ThresholdPair,
    timer: CaptureTimer,
    source: Box<dyn RegionSource>,
    texture: Option<TextureHandle>,
    tick_count: u64,
    last_error: Option<String>,
}

impl EdgeOverlay {
    pub fn new(
        region: Rectangle,
        config: &OverlayConfig,
        source: Box<dyn RegionSource>,
        now: Instant,
    ) -> Self {
        info!(
            "Edge overlay watching ({}, {}) {}x{}, every {:?}",
            region.x, region.y, region.width, region.height, config.capture_interval
        );
        let last_error = region
            .is_empty()
            .then(|| "Selected region is empty".to_string());
        let mut timer = CaptureTimer::new(config.capture_interval, now);
        if region.is_empty() {
            warn!("Selected region has no area. Nothing will be captured.");
            timer.stop();
        }
        Self {
            region,
            thresholds: config.thresholds,
            timer,
            source,
            texture: None,
            tick_count: 0,
            last_error,
        }
    }

    #[cfg(test)]
    pub fn region(&self) -> Rectangle {
        self.region
    }

    #[cfg(test)]
    pub fn thresholds(&self) -> ThresholdPair {
        self.thresholds
    }

    pub fn thresholds_mut(&mut self) -> &mut ThresholdPair {
        &mut self.thresholds
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    #[cfg(test)]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        !self.timer.is_running()
    }

    /// Stops further capture ticks.
    pub fn close(&mut self) {
        if self.timer.is_running() {
            info!("Edge overlay closed after {} ticks", self.tick_count);
        }
        self.timer.stop();
    }

    /// Runs a tick if one is due. Returns the new edge image, if any.
    pub fn poll(&mut self, now: Instant) -> Option<ColorImage> {
        if !self.timer.poll(now) {
            return None;
        }
        self.tick_count += 1;
        let tick_start = Instant::now();

        match self.run_tick() {
            Ok(image) => {
                self.last_error = None;
                debug!(
                    "Tick {} processed {}x{} in {:?}",
                    self.tick_count,
                    image.size[0],
                    image.size[1],
                    tick_start.elapsed()
                );
                Some(image)
            }
            Err(err) => {
                warn!("Tick {} failed: {:#}", self.tick_count, err);
                self.last_error = Some(format!("{:#}", err));
                None
            }
        }
    }

    /// capture -> grayscale -> canny -> egui image, thresholds read fresh.
    fn run_tick(&mut self) -> anyhow::Result<ColorImage> {
        let frame = self
            .source
            .capture(self.region)
            .context("capturing screen region")?;
        ensure!(
            frame.width() > 0 && frame.height() > 0,
            "captured frame is empty"
        );
        Ok(edges::process_frame(&frame, self.thresholds))
    }

    fn upload(&mut self, ctx: &egui::Context, image: ColorImage) {
        match self.texture {
            Some(ref mut texture) => {
                texture.set(ImageData::Color(image.into()), TextureOptions::LINEAR);
            }
            None => {
                info!("Creating edge texture with size: {:?}", image.size);
                self.texture = Some(ctx.load_texture(
                    "edge_overlay",
                    ImageData::Color(image.into()),
                    TextureOptions::LINEAR,
                ));
            }
        }
    }

    /// Ticks if due, re-arms the repaint, and draws the overlay.
    pub fn show(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if let Some(image) = self.poll(now) {
            self.upload(ctx, image);
        }
        if let Some(wait) = self.timer.remaining(now) {
            ctx.request_repaint_after(wait);
        }

        let panel_frame = egui::Frame::NONE
            .fill(OVERLAY_BACKGROUND)
            .inner_margin(6.0);

        egui::TopBottomPanel::top("overlay_header")
            .frame(panel_frame)
            .exact_height(HEADER_HEIGHT)
            .show(ctx, |ui| self.header(ui));

        egui::TopBottomPanel::bottom("overlay_controls")
            .frame(panel_frame)
            .resizable(false)
            .show(ctx, |ui| self.controls(ui));

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| match &self.texture {
                Some(texture) => {
                    // Stretched to fill, like a scaled label pixmap.
                    let (rect, _) = ui.allocate_exact_size(ui.available_size(), Sense::hover());
                    ui.painter().image(
                        texture.id(),
                        rect,
                        Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label(RichText::new("Edge Detection Output").color(Color32::WHITE));
                    });
                }
            });
    }

    fn header(&mut self, ui: &mut egui::Ui) {
        let drag = ui.interact(ui.max_rect(), ui.id().with("drag"), Sense::click_and_drag());
        if drag.drag_started() {
            ui.ctx().send_viewport_cmd(ViewportCommand::StartDrag);
        }
        ui.horizontal(|ui| {
            ui.add(
                egui::Label::new(RichText::new("Edge Detection Overlay").color(Color32::WHITE))
                    .selectable(false),
            );
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.small_button("❌").clicked() {
                    self.close();
                    ui.ctx().send_viewport_cmd(ViewportCommand::Close);
                }
            });
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let mut lower = self.thresholds.lower();
        ui.label(RichText::new("Lower Threshold:").color(Color32::WHITE));
        if ui.add(egui::Slider::new(&mut lower, 0..=255)).changed() {
            self.thresholds_mut().set_lower(lower.into());
        }

        let mut upper = self.thresholds.upper();
        ui.label(RichText::new("Upper Threshold:").color(Color32::WHITE));
        if ui.add(egui::Slider::new(&mut upper, 0..=255)).changed() {
            self.thresholds_mut().set_upper(upper.into());
        }

        ui.horizontal(|ui| {
            let status = format!(
                "Region {}x{} · ticks {}",
                self.region.width, self.region.height, self.tick_count
            );
            ui.label(RichText::new(status).small().color(Color32::LIGHT_GRAY));
            if let Some(err) = &self.last_error {
                ui.label(RichText::new(err).small().color(Color32::YELLOW));
            }
        });
    }
}
