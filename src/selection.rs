// src/selection.rs
use crossbeam_channel::{Sender, TrySendError};
use egui::{pos2, vec2, CursorIcon, Key, Pos2, Rect, Stroke, StrokeKind};
use log::{debug, info, warn};

use crate::config::{SELECTION_OUTLINE, SELECTION_OUTLINE_WIDTH, SELECTOR_DIM};

/// A point in physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts a pointer position in egui points to physical pixels.
    pub fn from_pointer(pos: Pos2, pixels_per_point: f32) -> Self {
        Self::new(
            (pos.x * pixels_per_point).round() as i32,
            (pos.y * pixels_per_point).round() as i32,
        )
    }
}

/// Selected screen region in physical pixels. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    /// Spans the two corners in whatever order they were given.
    pub fn normalize(a: ScreenPoint, b: ScreenPoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Back to egui points for painting.
    fn to_rect(self, pixels_per_point: f32) -> Rect {
        Rect::from_min_size(
            pos2(self.x as f32, self.y as f32) / pixels_per_point,
            vec2(self.width as f32, self.height as f32) / pixels_per_point,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging { start: ScreenPoint, end: ScreenPoint },
    Done,
}

/// Full-screen drag-to-select. Emits exactly one [`Rectangle`] on release.
pub struct RegionSelector {
    state: DragState,
    listener: Sender<Rectangle>,
    needs_redraw: bool,
}

impl RegionSelector {
    pub fn new(listener: Sender<Rectangle>) -> Self {
        Self {
            state: DragState::Idle,
            listener,
            needs_redraw: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == DragState::Done
    }

    pub fn begin_drag(&mut self, point: ScreenPoint) {
        if self.state != DragState::Idle {
            return;
        }
        debug!("Selection started at ({}, {})", point.x, point.y);
        self.state = DragState::Dragging {
            start: point,
            end: point,
        };
        self.needs_redraw = true;
    }

    pub fn update_drag(&mut self, point: ScreenPoint) {
        if let DragState::Dragging { end, .. } = &mut self.state {
            if *end != point {
                *end = point;
                self.needs_redraw = true;
            }
        }
    }

    /// Finishes the drag and hands the rectangle to the listener.
    /// Returns the emitted rectangle; `None` (and no state change) outside a drag.
    pub fn end_drag(&mut self, point: ScreenPoint) -> Option<Rectangle> {
        let DragState::Dragging { start, .. } = self.state else {
            return None;
        };
        let rect = Rectangle::normalize(start, point);
        self.state = DragState::Done;
        self.needs_redraw = true;
        info!(
            "Selection complete: ({}, {}) {}x{}",
            rect.x, rect.y, rect.width, rect.height
        );

        match self.listener.try_send(rect) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Selection listener already holds a region. Dropping."),
            Err(TrySendError::Disconnected(_)) => warn!("Selection listener disconnected."),
        }
        Some(rect)
    }

    /// The in-progress rectangle, if a drag is under way.
    pub fn current_selection(&self) -> Option<Rectangle> {
        match self.state {
            DragState::Dragging { start, end } => Some(Rectangle::normalize(start, end)),
            _ => None,
        }
    }

    /// Translates this frame's pointer input into drag transitions.
    ///
    /// Returns `false` when the user cancelled with Escape.
    pub fn handle_input(&mut self, ctx: &egui::Context) -> bool {
        let ppp = ctx.pixels_per_point();
        let (pressed, released, pos, escape) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.latest_pos(),
                i.key_pressed(Key::Escape),
            )
        });

        if escape && !self.is_done() {
            info!("Selection cancelled");
            return false;
        }

        if let Some(pos) = pos {
            let point = ScreenPoint::from_pointer(pos, ppp);
            if pressed {
                self.begin_drag(point);
            }
            self.update_drag(point);
            if released {
                self.end_drag(point);
            }
        }

        if std::mem::take(&mut self.needs_redraw) {
            ctx.request_repaint();
        }
        true
    }

    /// Dims the screen and outlines the in-progress selection.
    pub fn show(&self, ctx: &egui::Context) {
        ctx.set_cursor_icon(CursorIcon::Crosshair);
        let ppp = ctx.pixels_per_point();

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let painter = ui.painter();
                painter.rect_filled(ctx.screen_rect(), 0.0, SELECTOR_DIM);

                if let Some(selection) = self.current_selection() {
                    painter.rect_stroke(
                        selection.to_rect(ppp),
                        0.0,
                        Stroke::new(SELECTION_OUTLINE_WIDTH, SELECTION_OUTLINE),
                        StrokeKind::Middle,
                    );
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, Receiver};

    fn selector() -> (RegionSelector, Receiver<Rectangle>) {
        let (tx, rx) = bounded(1);
        (RegionSelector::new(tx), rx)
    }

    #[test]
    fn normalize_is_order_independent() {
        let points = [(0, 0), (10, 10), (110, 60), (-20, 35), (7, -3), (500, 500)];
        for &(ax, ay) in &points {
            for &(bx, by) in &points {
                let a = ScreenPoint::new(ax, ay);
                let b = ScreenPoint::new(bx, by);
                let forward = Rectangle::normalize(a, b);
                let backward = Rectangle::normalize(b, a);
                assert_eq!(forward, backward);
                assert_eq!(forward.width, ax.abs_diff(bx));
                assert_eq!(forward.height, ay.abs_diff(by));
            }
        }
    }

    #[test]
    fn drag_emits_expected_rectangle() {
        let (mut sel, rx) = selector();
        sel.begin_drag(ScreenPoint::new(10, 10));
        sel.update_drag(ScreenPoint::new(60, 30));
        let emitted = sel.end_drag(ScreenPoint::new(110, 60));

        let expected = Rectangle { x: 10, y: 10, width: 100, height: 50 };
        assert_eq!(emitted, Some(expected));
        assert_eq!(rx.try_recv(), Ok(expected));
        assert!(sel.is_done());
    }

    #[test]
    fn reversed_drag_emits_same_rectangle() {
        let (mut sel, rx) = selector();
        sel.begin_drag(ScreenPoint::new(110, 60));
        sel.end_drag(ScreenPoint::new(10, 10));
        assert_eq!(rx.try_recv(), Ok(Rectangle { x: 10, y: 10, width: 100, height: 50 }));
    }

    #[test]
    fn update_tracks_the_pointer_while_dragging() {
        let (mut sel, _rx) = selector();
        sel.begin_drag(ScreenPoint::new(5, 5));
        sel.update_drag(ScreenPoint::new(25, 45));
        assert_eq!(
            sel.current_selection(),
            Some(Rectangle { x: 5, y: 5, width: 20, height: 40 })
        );
    }

    #[test]
    fn moves_and_releases_outside_a_drag_are_ignored() {
        let (mut sel, rx) = selector();
        sel.update_drag(ScreenPoint::new(30, 30));
        assert_eq!(sel.state(), DragState::Idle);
        assert_eq!(sel.end_drag(ScreenPoint::new(30, 30)), None);
        assert_eq!(sel.state(), DragState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn done_is_terminal() {
        let (mut sel, rx) = selector();
        sel.begin_drag(ScreenPoint::new(0, 0));
        sel.end_drag(ScreenPoint::new(4, 4));
        assert!(rx.try_recv().is_ok());

        sel.begin_drag(ScreenPoint::new(50, 50));
        sel.update_drag(ScreenPoint::new(90, 90));
        assert_eq!(sel.end_drag(ScreenPoint::new(90, 90)), None);
        assert_eq!(sel.state(), DragState::Done);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn second_press_does_not_restart_a_drag() {
        let (mut sel, _rx) = selector();
        sel.begin_drag(ScreenPoint::new(1, 2));
        sel.begin_drag(ScreenPoint::new(40, 40));
        assert_eq!(
            sel.state(),
            DragState::Dragging { start: ScreenPoint::new(1, 2), end: ScreenPoint::new(1, 2) }
        );
    }

    #[test]
    fn closing_before_release_emits_nothing() {
        let (mut sel, rx) = selector();
        sel.begin_drag(ScreenPoint::new(10, 10));
        sel.update_drag(ScreenPoint::new(80, 80));
        drop(sel);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn release_with_dropped_listener_still_finishes() {
        let (mut sel, rx) = selector();
        drop(rx);
        sel.begin_drag(ScreenPoint::new(0, 0));
        assert!(sel.end_drag(ScreenPoint::new(3, 3)).is_some());
        assert!(sel.is_done());
    }

    #[test]
    fn pointer_positions_scale_to_physical_pixels() {
        let point = ScreenPoint::from_pointer(pos2(10.0, 20.5), 2.0);
        assert_eq!(point, ScreenPoint::new(20, 41));
    }
}
