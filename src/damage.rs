//! Damage accumulation and clustering.

use crate::rect::Rect;

/// Collects the damaged area of a window between repaints.
///
/// Keeps the overall bounding box plus a short list of clusters. A new rectangle is merged into
/// an existing cluster when doing so wastes little; otherwise it starts a cluster of its own.
/// Repainting a few tight clusters is cheaper than repainting their bounding box when damage is
/// scattered across the window.
#[derive(Debug, Clone)]
pub struct DamageAccumulator {
    bounds: Rect,
    clusters: Vec<Rect>,
    merge_ratio: f64,
    max_clusters: usize,
}

/// Damage taken out of an accumulator for repainting.
#[derive(Debug, Clone, PartialEq)]
pub struct Damage {
    pub bounds: Rect,
    pub clusters: Vec<Rect>,
}

/// Whether two damage rectangles are better painted as one.
///
/// `waste` is the area a merged rectangle would cover that neither input covers. Merge when there
/// is no waste, or when the overlap is large relative to it.
pub fn should_merge(a: Rect, b: Rect, ratio: f64) -> bool {
    let waste = a.union(b).area() - a.area() - b.area();
    if waste <= 0. {
        return true;
    }
    a.intersection_area(b) / waste > ratio
}

impl DamageAccumulator {
    pub fn new(merge_ratio: f64, max_clusters: usize) -> DamageAccumulator {
        DamageAccumulator {
            bounds: Rect::zero(),
            clusters: Vec::new(),
            merge_ratio,
            max_clusters: max_clusters.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn clusters(&self) -> &[Rect] {
        &self.clusters
    }

    pub fn add(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.bounds = self.bounds.union(rect);

        let mut merged = rect;
        while let Some(i) = self
            .clusters
            .iter()
            .position(|c| should_merge(*c, merged, self.merge_ratio))
        {
            merged = merged.union(self.clusters.swap_remove(i));
        }
        self.clusters.push(merged);

        if self.clusters.len() > self.max_clusters {
            self.clusters.clear();
            self.clusters.push(self.bounds);
        }
    }

    /// Takes the accumulated damage, leaving the accumulator empty.
    pub fn take(&mut self) -> Option<Damage> {
        if self.is_empty() {
            return None;
        }
        let damage = Damage {
            bounds: self.bounds,
            clusters: std::mem::take(&mut self.clusters),
        };
        self.bounds = Rect::zero();
        Some(damage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rects_are_ignored() {
        let mut acc = DamageAccumulator::new(1., 16);
        acc.add(Rect::zero());
        assert!(acc.is_empty());
        assert!(acc.take().is_none());
    }

    #[test]
    fn distant_rects_stay_apart() {
        let mut acc = DamageAccumulator::new(1., 16);
        acc.add(Rect::from_xywh(0., 0., 10., 10.));
        acc.add(Rect::from_xywh(100., 100., 10., 10.));
        assert_eq!(acc.clusters().len(), 2);
        assert_eq!(acc.bounds(), Rect::from_xywh(0., 0., 110., 110.));
    }

    #[test]
    fn overlapping_rects_merge() {
        let mut acc = DamageAccumulator::new(1., 16);
        acc.add(Rect::from_xywh(0., 0., 10., 10.));
        acc.add(Rect::from_xywh(2., 2., 10., 10.));
        assert_eq!(acc.clusters(), &[Rect::from_xywh(0., 0., 12., 12.)]);
    }

    #[test]
    fn adjacent_rects_merge_without_waste() {
        let a = Rect::from_xywh(0., 0., 10., 10.);
        let b = Rect::from_xywh(10., 0., 10., 10.);
        assert!(should_merge(a, b, 1.));
    }

    #[test]
    fn a_merge_can_cascade() {
        let mut acc = DamageAccumulator::new(1., 16);
        acc.add(Rect::from_xywh(0., 0., 10., 10.));
        acc.add(Rect::from_xywh(20., 0., 10., 10.));
        // bridges both clusters
        acc.add(Rect::from_xywh(5., 0., 20., 10.));
        assert_eq!(acc.clusters(), &[Rect::from_xywh(0., 0., 30., 10.)]);
    }

    #[test]
    fn too_many_clusters_collapse() {
        let mut acc = DamageAccumulator::new(1., 2);
        for i in 0..3 {
            acc.add(Rect::from_xywh(i as f64 * 100., 0., 1., 1.));
        }
        assert_eq!(acc.clusters(), &[acc.bounds()]);
    }
}
