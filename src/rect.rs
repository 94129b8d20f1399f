//! Rectangles.

use cgmath::{Matrix3, Point2, SquareMatrix, Vector2, Vector3, Zero};

/// A rectangle.
///
/// Sizes are never negative; an empty rectangle has a zero-area size and is ignored by
/// [`Rect::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Rectangle origin.
    pub origin: Point2<f64>,

    /// Rectangle size.
    pub size: Vector2<f64>,
}

impl Default for Rect {
    fn default() -> Self {
        Rect::zero()
    }
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(origin: Point2<f64>, size: Vector2<f64>) -> Rect {
        Rect { origin, size }
    }

    /// Creates a rectangle from x, y, width and height.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            origin: Point2::new(x, y),
            size: Vector2::new(width.max(0.), height.max(0.)),
        }
    }

    /// Creates the smallest rectangle containing both points.
    pub fn from_points(a: Point2<f64>, b: Point2<f64>) -> Rect {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Rect::from_xywh(min_x, min_y, a.x.max(b.x) - min_x, a.y.max(b.y) - min_y)
    }

    /// Returns a zero-sized rectangle at the origin.
    pub fn zero() -> Rect {
        Rect {
            origin: Point2::new(0., 0.),
            size: Vector2::zero(),
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.x
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.y
    }

    /// Returns true if the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        !(self.size.x > 0. && self.size.y > 0.)
    }

    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.
        } else {
            self.size.x * self.size.y
        }
    }

    /// Returns the center point.
    pub fn center(&self) -> Point2<f64> {
        self.origin + self.size / 2.
    }

    /// Returns true if the point is inside the rectangle. The far edges are exclusive.
    pub fn contains(&self, point: Point2<f64>) -> bool {
        (self.min_x()..self.max_x()).contains(&point.x)
            && (self.min_y()..self.max_y()).contains(&point.y)
    }

    /// Returns true if the two rectangles overlap. Touching edges don’t count.
    pub fn intersects(&self, rect: Rect) -> bool {
        self.min_x() < rect.max_x()
            && rect.min_x() < self.max_x()
            && self.min_y() < rect.max_y()
            && rect.min_y() < self.max_y()
    }

    /// Returns the overlapping part of two rectangles, if they overlap.
    pub fn intersect(&self, rect: Rect) -> Option<Rect> {
        if !self.intersects(rect) {
            return None;
        }
        let min_x = self.min_x().max(rect.min_x());
        let min_y = self.min_y().max(rect.min_y());
        let max_x = self.max_x().min(rect.max_x());
        let max_y = self.max_y().min(rect.max_y());
        Some(Rect::from_xywh(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Area shared by both rectangles.
    pub fn intersection_area(&self, rect: Rect) -> f64 {
        self.intersect(rect).map_or(0., |r| r.area())
    }

    /// Returns the smallest rectangle containing both rectangles.
    ///
    /// Empty rectangles don’t contribute.
    pub fn union(&self, rect: Rect) -> Rect {
        if rect.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return rect;
        }
        let min_x = self.min_x().min(rect.min_x());
        let min_y = self.min_y().min(rect.min_y());
        let max_x = self.max_x().max(rect.max_x());
        let max_y = self.max_y().max(rect.max_y());
        Rect::from_xywh(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Returns a new rectangle inset by the specified amount.
    pub fn inset(&self, horiz: f64, vert: f64) -> Rect {
        Rect {
            origin: (self.origin.x + horiz, self.origin.y + vert).into(),
            size: (
                (self.size.x - 2. * horiz).max(0.),
                (self.size.y - 2. * vert).max(0.),
            )
                .into(),
        }
    }

    /// Returns the bounding box of this rectangle after an affine transform.
    pub fn transform(&self, transform: &Matrix3<f64>) -> Rect {
        if self.is_empty() {
            return Rect::zero();
        }
        let corners = [
            self.origin,
            Point2::new(self.max_x(), self.min_y()),
            Point2::new(self.min_x(), self.max_y()),
            Point2::new(self.max_x(), self.max_y()),
        ];
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in corners.iter() {
            let p = transform_point(transform, *corner);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Rect::from_points(min, max)
    }

    /// Linear interpolation between two rectangles.
    pub fn lerp(&self, other: Rect, t: f64) -> Rect {
        Rect {
            origin: self.origin + (other.origin - self.origin) * t,
            size: self.size + (other.size - self.size) * t,
        }
    }
}

/// Affine translation matrix.
pub fn translation(x: f64, y: f64) -> Matrix3<f64> {
    Matrix3::new(1., 0., 0., 0., 1., 0., x, y, 1.)
}

/// Uniform scale matrix.
pub fn scaling(factor: f64) -> Matrix3<f64> {
    Matrix3::new(factor, 0., 0., 0., factor, 0., 0., 0., 1.)
}

/// Applies an affine transform to a point.
pub fn transform_point(transform: &Matrix3<f64>, point: Point2<f64>) -> Point2<f64> {
    let v = *transform * Vector3::new(point.x, point.y, 1.);
    Point2::new(v.x, v.y)
}

/// Maps a window point into the coordinate system described by `transform`.
pub fn untransform_point(transform: &Matrix3<f64>, point: Point2<f64>) -> Option<Point2<f64>> {
    transform
        .invert()
        .map(|inverse| transform_point(&inverse, point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_ignores_empty() {
        let a = Rect::from_xywh(0., 0., 10., 10.);
        assert_eq!(a.union(Rect::zero()), a);
        assert_eq!(Rect::zero().union(a), a);
        let b = Rect::from_xywh(20., 5., 10., 10.);
        assert_eq!(a.union(b), Rect::from_xywh(0., 0., 30., 15.));
    }

    #[test]
    fn transform_bounds() {
        let r = Rect::from_xywh(1., 2., 3., 4.);
        let t = translation(10., 20.) * scaling(2.);
        assert_eq!(r.transform(&t), Rect::from_xywh(12., 24., 6., 8.));
        let back = untransform_point(&t, Point2::new(12., 24.)).unwrap();
        assert!((back.x - 1.).abs() < 1e-9 && (back.y - 2.).abs() < 1e-9);
    }

    #[test]
    fn intersection_area() {
        let a = Rect::from_xywh(0., 0., 10., 10.);
        let b = Rect::from_xywh(5., 5., 10., 10.);
        assert_eq!(a.intersection_area(b), 25.);
        assert_eq!(a.intersection_area(Rect::from_xywh(50., 50., 1., 1.)), 0.);
    }
}
