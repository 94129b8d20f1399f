//! Traits for rendering backends.

use crate::color::Color;
use crate::rect::Rect;
use cgmath::{Matrix3, SquareMatrix, Vector2};

/// A drawing context on an off-screen buffer.
///
/// Rectangles passed to `clip` are in window coordinates; drawing calls are in the coordinates set
/// by the last `set_transform`.
pub trait Canvas {
    /// Saves the clip and transform.
    fn save(&mut self);

    /// Restores the clip and transform saved by the matching `save`.
    fn restore(&mut self);

    /// Intersects the clip with a window-space rectangle.
    fn clip(&mut self, rect: Rect);

    fn set_transform(&mut self, transform: Matrix3<f64>);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color);
}

/// A window’s paint target: an off-screen buffer plus a way to put it on screen.
///
/// The scene holds surfaces behind a window-level lock, so a synchronous repaint from another
/// thread can’t interleave with the worker’s.
pub trait Surface: Send {
    fn size(&self) -> Vector2<f64>;

    fn resize(&mut self, size: Vector2<f64>);

    /// The off-screen buffer.
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// Copies a window-space region of the buffer to the screen.
    fn present(&mut self, region: Rect);
}

/// A recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Save,
    Restore,
    Clip(Rect),
    SetTransform(Matrix3<f64>),
    FillRect(Rect, Color),
    StrokeRect(Rect, f64, Color),
    Present(Rect),
}

/// A surface that records what is drawn on it. Works as a headless backend.
#[derive(Debug)]
pub struct RecordingSurface {
    size: Vector2<f64>,
    ops: Vec<PaintOp>,
}

impl RecordingSurface {
    pub fn new(size: Vector2<f64>) -> RecordingSurface {
        RecordingSurface {
            size,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[PaintOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<PaintOp> {
        std::mem::take(&mut self.ops)
    }

    /// Regions presented so far.
    pub fn presented(&self) -> Vec<Rect> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                PaintOp::Present(rect) => Some(*rect),
                _ => None,
            })
            .collect()
    }

    /// Rectangles filled so far, mapped to window space by the transform in effect.
    pub fn filled(&self) -> Vec<(Rect, Color)> {
        let mut transforms = vec![Matrix3::identity()];
        let mut out = Vec::new();
        for op in &self.ops {
            match op {
                PaintOp::Save => {
                    let top = transforms.last().copied().unwrap_or_else(Matrix3::identity);
                    transforms.push(top);
                }
                PaintOp::Restore => {
                    if transforms.len() > 1 {
                        transforms.pop();
                    }
                }
                PaintOp::SetTransform(t) => {
                    if let Some(top) = transforms.last_mut() {
                        *top = *t;
                    }
                }
                PaintOp::FillRect(rect, color) => {
                    let top = transforms.last().copied().unwrap_or_else(Matrix3::identity);
                    out.push((rect.transform(&top), *color));
                }
                _ => (),
            }
        }
        out
    }
}

impl Canvas for RecordingSurface {
    fn save(&mut self) {
        self.ops.push(PaintOp::Save);
    }

    fn restore(&mut self) {
        self.ops.push(PaintOp::Restore);
    }

    fn clip(&mut self, rect: Rect) {
        self.ops.push(PaintOp::Clip(rect));
    }

    fn set_transform(&mut self, transform: Matrix3<f64>) {
        self.ops.push(PaintOp::SetTransform(transform));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(PaintOp::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, width: f64, color: Color) {
        self.ops.push(PaintOp::StrokeRect(rect, width, color));
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Vector2<f64> {
        self.size
    }

    fn resize(&mut self, size: Vector2<f64>) {
        self.size = size;
    }

    fn canvas(&mut self) -> &mut dyn Canvas {
        self
    }

    fn present(&mut self, region: Rect) {
        self.ops.push(PaintOp::Present(region));
    }
}
