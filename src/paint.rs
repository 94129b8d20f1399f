//! Paint objects.

use crate::backend::Canvas;
use crate::color::Color;
use crate::rect::Rect;
use cgmath::Vector2;
use core::fmt;

/// Something a view draws in one of its layers.
///
/// Paints draw in the layer’s local coordinates, where the view occupies `(0, 0, size)`.
pub trait Paint: fmt::Debug + Send + Sync {
    /// The area this paint touches, in local coordinates.
    fn bounds(&self, size: Vector2<f64>) -> Rect;

    fn paint(&self, canvas: &mut dyn Canvas, size: Vector2<f64>);
}

/// Fills the view’s rectangle, optionally inset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillPaint {
    pub color: Color,
    pub inset: f64,
}

impl FillPaint {
    pub fn new(color: Color) -> FillPaint {
        FillPaint { color, inset: 0. }
    }
}

impl Paint for FillPaint {
    fn bounds(&self, size: Vector2<f64>) -> Rect {
        Rect::new((0., 0.).into(), size).inset(self.inset, self.inset)
    }

    fn paint(&self, canvas: &mut dyn Canvas, size: Vector2<f64>) {
        canvas.fill_rect(self.bounds(size), self.color);
    }
}

/// Strokes the view’s edge. The stroke is centered on the edge, so it reaches half its width
/// outside the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderPaint {
    pub color: Color,
    pub width: f64,
}

impl BorderPaint {
    pub fn new(width: f64, color: Color) -> BorderPaint {
        BorderPaint { color, width }
    }
}

impl Paint for BorderPaint {
    fn bounds(&self, size: Vector2<f64>) -> Rect {
        let half = self.width / 2.;
        Rect::from_xywh(-half, -half, size.x + self.width, size.y + self.width)
    }

    fn paint(&self, canvas: &mut dyn Canvas, size: Vector2<f64>) {
        canvas.stroke_rect(Rect::new((0., 0.).into(), size), self.width, self.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_reaches_outside() {
        let border = BorderPaint::new(2., Color::BLACK);
        assert_eq!(
            border.bounds(Vector2::new(10., 10.)),
            Rect::from_xywh(-1., -1., 12., 12.)
        );
    }
}
