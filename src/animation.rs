//! Composable animations.

use crate::error::{Error, PropertyError};
use crate::scene::{NodeId, PropertyId, Scene};
use crate::transition::Transition;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A tree of timed property writes.
#[derive(Debug, Clone)]
pub enum Animation {
    /// Writes one property with a transition; done when the transition is.
    SetProperty {
        node: NodeId,
        name: Arc<str>,
        value: Value,
        transition: Transition,
        started: Option<PropertyId>,
    },
    /// Done when every child is done.
    Together(Vec<Animation>),
    /// Runs children one after another.
    InOrder { steps: Vec<Animation>, current: usize },
}

impl Animation {
    pub fn set(
        node: NodeId,
        name: &str,
        value: impl Into<Value>,
        transition: Transition,
    ) -> Animation {
        Animation::SetProperty {
            node,
            name: name.into(),
            value: value.into(),
            transition,
            started: None,
        }
    }

    pub fn together(children: Vec<Animation>) -> Animation {
        Animation::Together(children)
    }

    pub fn in_order(steps: Vec<Animation>) -> Animation {
        Animation::InOrder { steps, current: 0 }
    }

    /// Advances the animation to the scene’s current time. Returns true once it has finished.
    pub fn done_animating(&mut self, scene: &mut Scene) -> Result<bool, PropertyError> {
        match self {
            Animation::SetProperty {
                node,
                name,
                value,
                transition,
                started,
            } => {
                let prop = match started {
                    Some(prop) => *prop,
                    None => {
                        let prop = scene.property(*node, &**name)?;
                        scene.set(prop, value.clone(), Some(*transition))?;
                        *started = Some(prop);
                        prop
                    }
                };
                Ok(scene.is_done_transitioning(prop, scene.now()))
            }
            Animation::Together(children) => {
                let mut done = true;
                for child in children {
                    done &= child.done_animating(scene)?;
                }
                Ok(done)
            }
            Animation::InOrder { steps, current } => {
                while let Some(step) = steps.get_mut(*current) {
                    if !step.done_animating(scene)? {
                        return Ok(false);
                    }
                    *current += 1;
                }
                Ok(true)
            }
        }
    }
}

/// Running top-level animations, one per context element.
#[derive(Debug, Default)]
pub(crate) struct Animator {
    active: Vec<(NodeId, Animation)>,
}

impl Animator {
    pub(crate) fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub(crate) fn contains(&self, context: NodeId) -> bool {
        self.active.iter().any(|(c, _)| *c == context)
    }

    pub(crate) fn cancel(&mut self, context: NodeId) -> bool {
        let len = self.active.len();
        self.active.retain(|(c, _)| *c != context);
        self.active.len() != len
    }
}

impl Scene {
    /// Registers an animation for a context element. It starts on the next work cycle.
    pub fn animate(&mut self, context: NodeId, animation: Animation) -> Result<(), Error> {
        if self.animator.contains(context) {
            return Err(Error::AlreadyAnimating(context));
        }
        self.animator.active.push((context, animation));
        Ok(())
    }

    pub fn is_animating(&self, context: NodeId) -> bool {
        self.animator.contains(context)
    }

    /// Stops an animation where it is. Properties keep their current transitions.
    pub fn cancel_animation(&mut self, context: NodeId) -> bool {
        self.animator.cancel(context)
    }

    /// Ticks every running animation, dropping the ones that finished or failed.
    /// Returns the number dropped.
    pub fn tick_animations(&mut self) -> usize {
        let active = std::mem::take(&mut self.animator.active);
        let before = active.len();
        let mut kept = Vec::with_capacity(before);
        for (context, mut animation) in active {
            match animation.done_animating(self) {
                Ok(true) => debug!(%context, "animation finished"),
                Ok(false) => kept.push((context, animation)),
                Err(err) => warn!(%context, %err, "animation failed"),
            }
        }
        let dropped = before - kept.len();
        kept.append(&mut self.animator.active);
        self.animator.active = kept;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::declaration::Declaration;
    use crate::Config;
    use std::time::Duration;

    fn scene() -> (Scene, Arc<ManualClock>, NodeId) {
        let clock = Arc::new(ManualClock::new());
        let mut scene = Scene::with_clock(Config::default(), clock.clone());
        let node = scene.create_element(
            "N",
            [
                Arc::new(Declaration::value("x", 0.)),
                Arc::new(Declaration::value("y", 0.)),
            ],
        );
        (scene, clock, node)
    }

    fn ms(n: u64) -> Transition {
        Transition::linear(Duration::from_millis(n))
    }

    #[test]
    fn steps_run_in_order() {
        let (mut scene, clock, node) = scene();
        let animation = Animation::in_order(vec![
            Animation::set(node, "x", 10., ms(100)),
            Animation::set(node, "y", 10., ms(100)),
        ]);
        scene.animate(node, animation).unwrap();

        scene.begin_cycle();
        assert_eq!(scene.tick_animations(), 0);
        assert_eq!(scene.number(node, "x").unwrap(), 10.);
        assert_eq!(scene.number(node, "y").unwrap(), 0.);

        clock.advance(Duration::from_millis(100));
        scene.begin_cycle();
        scene.tick_animations();
        assert_eq!(scene.number(node, "y").unwrap(), 10.);
        assert!(scene.is_animating(node));

        clock.advance(Duration::from_millis(100));
        scene.begin_cycle();
        assert_eq!(scene.tick_animations(), 1);
        assert!(!scene.is_animating(node));
    }

    #[test]
    fn together_waits_for_the_longest() {
        let (mut scene, clock, node) = scene();
        let animation = Animation::together(vec![
            Animation::set(node, "x", 10., ms(50)),
            Animation::set(node, "y", 10., ms(150)),
        ]);
        scene.animate(node, animation).unwrap();
        scene.begin_cycle();
        scene.tick_animations();

        clock.advance(Duration::from_millis(100));
        scene.begin_cycle();
        scene.tick_animations();
        assert!(scene.is_animating(node));

        clock.advance(Duration::from_millis(50));
        scene.begin_cycle();
        scene.tick_animations();
        assert!(!scene.is_animating(node));
    }

    #[test]
    fn one_animation_per_context() {
        let (mut scene, _clock, node) = scene();
        scene
            .animate(node, Animation::set(node, "x", 1., ms(10)))
            .unwrap();
        assert!(matches!(
            scene.animate(node, Animation::set(node, "y", 1., ms(10))),
            Err(Error::AlreadyAnimating(n)) if n == node
        ));
        assert!(scene.cancel_animation(node));
        assert!(scene.animate(node, Animation::set(node, "y", 1., ms(10))).is_ok());
    }

    #[test]
    fn failing_animations_are_dropped() {
        let (mut scene, _clock, node) = scene();
        scene
            .animate(node, Animation::set(node, "missing", 1., ms(10)))
            .unwrap();
        scene.begin_cycle();
        assert_eq!(scene.tick_animations(), 1);
        assert!(!scene.is_animating(node));
    }
}
