//! Transitions: time-based interpolation of property changes.

use std::f64::consts::PI;
use std::time::Duration;

/// Easing curves. All of them map 0 to 0 and 1 to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0., 1.);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t * t,
            Easing::EaseOut => 1. - (1. - t).powi(3),
            Easing::EaseInOut => 0.5 - (PI * t).cos() / 2.,
        }
    }
}

/// How a property moves from its old value to a new one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub duration: Duration,
    pub easing: Easing,
}

impl Transition {
    pub fn new(duration: Duration, easing: Easing) -> Transition {
        Transition { duration, easing }
    }

    pub fn linear(duration: Duration) -> Transition {
        Transition::new(duration, Easing::Linear)
    }

    /// Eased progress at `now` for a transition that started at `start`, in 0..=1.
    pub fn progress(&self, start: Duration, now: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.;
        }
        let elapsed = now.saturating_sub(start).as_secs_f64();
        self.easing
            .apply(elapsed / self.duration.as_secs_f64())
    }

    /// A transition whose end lies beyond `Duration::MAX` is never done.
    pub fn is_done(&self, start: Duration, now: Duration) -> bool {
        start
            .checked_add(self.duration)
            .map_or(false, |end| now >= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_immediately_done() {
        let t = Transition::linear(Duration::from_secs(0));
        assert_eq!(t.progress(Duration::from_secs(3), Duration::from_secs(3)), 1.);
        assert!(t.is_done(Duration::from_secs(3), Duration::from_secs(3)));
    }

    #[test]
    fn endless_transitions_never_finish() {
        let t = Transition::linear(Duration::MAX);
        let start = Duration::from_secs(5);
        assert!(!t.is_done(start, start));
        assert!(!t.is_done(start, Duration::MAX));
        assert_eq!(t.progress(start, start), 0.);
    }

    #[test]
    fn easings_hit_endpoints() {
        for easing in [Easing::Linear, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            assert!(easing.apply(0.).abs() < 1e-12, "{:?}", easing);
            assert!((easing.apply(1.) - 1.).abs() < 1e-12, "{:?}", easing);
        }
    }
}
