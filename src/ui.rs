// src/ui.rs
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use egui::{pos2, vec2, viewport::WindowLevel, ViewportCommand};
use log::{error, info, warn};

use crate::{
    capture::{RegionSource, ScreenCapture},
    config::OverlayConfig,
    overlay::EdgeOverlay,
    selection::{Rectangle, RegionSelector, ScreenPoint},
};

/// Which of the two windows the single native viewport is acting as.
enum Phase {
    Selecting(RegionSelector),
    Overlay(EdgeOverlay),
    Finished,
}

/// What one frame did to the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Stay,
    OpenOverlay(Rectangle),
    Finish,
}

type SourceFactory = fn(Option<ScreenPoint>) -> Box<dyn RegionSource>;

fn screen_source(anchor: Option<ScreenPoint>) -> Box<dyn RegionSource> {
    Box::new(ScreenCapture::new(anchor))
}

/// Centre of the selector window in physical desktop pixels.
fn selector_anchor(outer_rect: Option<egui::Rect>, pixels_per_point: f32) -> Option<ScreenPoint> {
    outer_rect.map(|rect| ScreenPoint::from_pointer(rect.center(), pixels_per_point))
}

pub struct EdgeOverlayApp {
    phase: Phase,
    selection_rx: Receiver<Rectangle>,
    config: OverlayConfig,
    make_source: SourceFactory,
    anchor: Option<ScreenPoint>,
}

impl EdgeOverlayApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: OverlayConfig) -> Self {
        info!("Initializing EdgeOverlayApp");
        Self::with_source(config, screen_source)
    }

    fn with_source(config: OverlayConfig, make_source: SourceFactory) -> Self {
        // One region, handed over once.
        let (selection_tx, selection_rx) = bounded(1);
        Self {
            phase: Phase::Selecting(RegionSelector::new(selection_tx)),
            selection_rx,
            config,
            make_source,
            anchor: None,
        }
    }

    /// Applies this frame's handover result and close flag to the phase.
    fn advance(
        &mut self,
        received: Result<Rectangle, TryRecvError>,
        close_requested: bool,
    ) -> Transition {
        let transition = match (&self.phase, received) {
            (Phase::Finished, _) => Transition::Stay,
            _ if close_requested => Transition::Finish,
            (Phase::Selecting(_), Ok(region)) => Transition::OpenOverlay(region),
            (Phase::Selecting(_), Err(TryRecvError::Disconnected)) => {
                error!("Selector disconnected without a region!");
                Transition::Finish
            }
            (Phase::Overlay(_), Ok(region)) => {
                warn!("Ignoring second region {:?}; overlay already running", region);
                Transition::Stay
            }
            // The selector is gone once the overlay runs, so Disconnected is expected.
            _ => Transition::Stay,
        };

        match transition {
            Transition::OpenOverlay(region) => {
                let source = (self.make_source)(self.anchor);
                let overlay = EdgeOverlay::new(region, &self.config, source, Instant::now());
                self.phase = Phase::Overlay(overlay);
            }
            Transition::Finish => {
                if let Phase::Overlay(overlay) = &mut self.phase {
                    overlay.close();
                }
                self.phase = Phase::Finished;
            }
            Transition::Stay => {}
        }
        transition
    }

    /// Turns the full-screen selector viewport into the small floating overlay.
    fn reconfigure_as_overlay(&self, ctx: &egui::Context) {
        let [w, h] = self.config.window_size;
        let [x, y] = self.config.window_position;
        ctx.send_viewport_cmd(ViewportCommand::Fullscreen(false));
        ctx.send_viewport_cmd(ViewportCommand::Title("Edge Detection Overlay".to_owned()));
        ctx.send_viewport_cmd(ViewportCommand::InnerSize(vec2(w, h)));
        ctx.send_viewport_cmd(ViewportCommand::OuterPosition(pos2(x, y)));
        ctx.send_viewport_cmd(ViewportCommand::WindowLevel(WindowLevel::AlwaysOnTop));
        ctx.set_cursor_icon(egui::CursorIcon::Default);
    }
}

impl eframe::App for EdgeOverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let (close_requested, outer_rect, escape) = ctx.input(|i| {
            (
                i.viewport().close_requested(),
                i.viewport().outer_rect,
                i.key_pressed(egui::Key::Escape),
            )
        });
        if close_requested {
            info!("Window close requested");
        }

        let mut cancelled = false;
        if !close_requested {
            match &mut self.phase {
                Phase::Selecting(selector) => {
                    self.anchor = selector_anchor(outer_rect, ctx.pixels_per_point());
                    if selector.handle_input(ctx) {
                        selector.show(ctx);
                    } else {
                        cancelled = true;
                    }
                }
                Phase::Overlay(overlay) => {
                    if escape {
                        cancelled = true;
                    } else {
                        overlay.show(ctx);
                    }
                }
                Phase::Finished => {}
            }
        }

        // --- Process the selection handed over by the selector ---
        let received = self.selection_rx.try_recv();
        match self.advance(received, close_requested || cancelled) {
            Transition::OpenOverlay(_) => self.reconfigure_as_overlay(ctx),
            Transition::Finish if !close_requested => {
                ctx.send_viewport_cmd(ViewportCommand::Close);
            }
            _ => {}
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        egui::Rgba::TRANSPARENT.to_array()
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        match &self.phase {
            Phase::Selecting(_) => info!("Exit before a region was selected. No overlay started."),
            Phase::Overlay(overlay) => info!("Exit with overlay after {} ticks", overlay.tick_count()),
            Phase::Finished => info!("Exit requested."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use image::RgbaImage;

    struct BlankSource;

    impl RegionSource for BlankSource {
        fn capture(&mut self, region: Rectangle) -> Result<RgbaImage, CaptureError> {
            Ok(RgbaImage::new(region.width, region.height))
        }
    }

    fn blank_source(_anchor: Option<ScreenPoint>) -> Box<dyn RegionSource> {
        Box::new(BlankSource)
    }

    fn app() -> EdgeOverlayApp {
        EdgeOverlayApp::with_source(OverlayConfig::default(), blank_source)
    }

    fn drag(app: &mut EdgeOverlayApp, from: ScreenPoint, to: ScreenPoint) {
        let Phase::Selecting(selector) = &mut app.phase else {
            panic!("not selecting");
        };
        selector.begin_drag(from);
        selector.update_drag(to);
        selector.end_drag(to);
    }

    #[test]
    fn idle_selector_waits_for_a_region() {
        let mut app = app();
        let received = app.selection_rx.try_recv();
        assert_eq!(app.advance(received, false), Transition::Stay);
        assert!(matches!(app.phase, Phase::Selecting(_)));
    }

    #[test]
    fn closing_while_selecting_starts_no_overlay() {
        let mut app = app();
        if let Phase::Selecting(selector) = &mut app.phase {
            selector.begin_drag(ScreenPoint::new(10, 10));
            selector.update_drag(ScreenPoint::new(80, 40));
        }
        let received = app.selection_rx.try_recv();
        assert_eq!(received, Err(TryRecvError::Empty));
        assert_eq!(app.advance(received, true), Transition::Finish);
        assert!(matches!(app.phase, Phase::Finished));

        // Nothing brings it back afterwards.
        assert_eq!(app.advance(Ok(Rectangle { x: 0, y: 0, width: 5, height: 5 }), false), Transition::Stay);
        assert!(matches!(app.phase, Phase::Finished));
    }

    #[test]
    fn released_drag_opens_overlay_on_that_region() {
        let mut app = app();
        drag(&mut app, ScreenPoint::new(110, 60), ScreenPoint::new(10, 10));

        let expected = Rectangle { x: 10, y: 10, width: 100, height: 50 };
        let received = app.selection_rx.try_recv();
        assert_eq!(app.advance(received, false), Transition::OpenOverlay(expected));
        match &app.phase {
            Phase::Overlay(overlay) => assert_eq!(overlay.region(), expected),
            _ => panic!("overlay not started"),
        }
    }

    #[test]
    fn disconnected_selector_is_ignored_once_overlay_runs() {
        let mut app = app();
        drag(&mut app, ScreenPoint::new(0, 0), ScreenPoint::new(40, 30));
        let received = app.selection_rx.try_recv();
        app.advance(received, false);

        // The selector (and its sender) was dropped with the phase change.
        let received = app.selection_rx.try_recv();
        assert_eq!(received, Err(TryRecvError::Disconnected));
        assert_eq!(app.advance(received, false), Transition::Stay);
        assert!(matches!(app.phase, Phase::Overlay(_)));
    }

    #[test]
    fn disconnected_selector_finishes_selection() {
        let mut app = app();
        assert_eq!(app.advance(Err(TryRecvError::Disconnected), false), Transition::Finish);
        assert!(matches!(app.phase, Phase::Finished));
    }

    #[test]
    fn closing_overlay_stops_its_ticks() {
        let mut app = app();
        drag(&mut app, ScreenPoint::new(0, 0), ScreenPoint::new(40, 30));
        let received = app.selection_rx.try_recv();
        app.advance(received, false);

        assert_eq!(app.advance(Err(TryRecvError::Empty), true), Transition::Finish);
        assert!(matches!(app.phase, Phase::Finished));
    }

    #[test]
    fn anchor_is_window_centre_in_physical_pixels() {
        let rect = egui::Rect::from_min_size(pos2(1920.0, 0.0), vec2(1280.0, 720.0));
        assert_eq!(selector_anchor(Some(rect), 1.5), Some(ScreenPoint::new(3840, 540)));
        assert_eq!(selector_anchor(None, 1.0), None);
    }
}
