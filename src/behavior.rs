//! Behaviors: event-triggered actions attached to views.

use crate::events::Event;
use crate::expr::{Expr, Expression};
use crate::scene::{NodeId, Scene};
use crate::value::Value;
use core::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// A condition/action pair.
///
/// The condition is evaluated in the view’s context and must produce an event pattern; the
/// behavior fires when that pattern [matches](Event::matches) the dispatched event. If it
/// doesn’t, the behavior’s children are tried in order.
pub struct Behavior {
    pub condition: Arc<dyn Expression>,
    pub action: Arc<dyn Expression>,
    pub undoable: bool,
    pub children: Vec<Behavior>,
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("condition", &"..")
            .field("action", &"..")
            .field("undoable", &self.undoable)
            .field("children", &self.children)
            .finish()
    }
}

impl Behavior {
    /// A behavior with a fixed event pattern.
    pub fn on(pattern: Event, action: Arc<dyn Expression>) -> Behavior {
        Behavior {
            condition: Arc::new(Expr::Const(Value::Event(Box::new(pattern)))),
            action,
            undoable: false,
            children: Vec::new(),
        }
    }

    /// A behavior whose pattern is computed when an event is dispatched.
    pub fn when(condition: Arc<dyn Expression>, action: Arc<dyn Expression>) -> Behavior {
        Behavior {
            condition,
            action,
            undoable: false,
            children: Vec::new(),
        }
    }

    pub fn undoable(mut self) -> Behavior {
        self.undoable = true;
        self
    }

    pub fn with_children(mut self, children: Vec<Behavior>) -> Behavior {
        self.children = children;
        self
    }
}

impl Scene {
    /// Offers an event to a view’s behaviors. Returns true if one of them consumed it.
    ///
    /// Disabled and unattached views never react. An action that fails is rolled back, logged
    /// and counts as not consuming the event.
    pub fn react_to(&mut self, view: NodeId, event: &Event) -> bool {
        if !self.is_attached(view) || !self.is_enabled(view) {
            return false;
        }
        let behaviors = match self.view_data(view) {
            Some(data) => data.behaviors.clone(),
            None => return false,
        };
        behaviors
            .iter()
            .any(|behavior| self.try_behavior(view, behavior, event))
    }

    fn try_behavior(&mut self, view: NodeId, behavior: &Behavior, event: &Event) -> bool {
        let matched = match self.evaluate(view, &*behavior.condition, Some(event)) {
            Ok(Value::Event(pattern)) => pattern.matches(event),
            Ok(Value::Nil) => false,
            Ok(other) => {
                warn!(%view, found = ?other.ty(), "behavior condition is not an event");
                false
            }
            Err(err) => {
                warn!(%view, %err, "behavior condition failed");
                false
            }
        };

        if matched {
            trace!(%view, kind = ?event.kind, "behavior matched");
            return match self.perform(view, &*behavior.action, behavior.undoable, Some(event)) {
                Ok(_) => true,
                Err(err) => {
                    warn!(%view, kind = ?event.kind, %err, "behavior action failed");
                    false
                }
            };
        }

        behavior
            .children
            .iter()
            .any(|child| self.try_behavior(view, child, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use crate::error::PropertyError;
    use crate::events::{EventKind, KeyCode};
    use crate::expr::from_fn;
    use cgmath::Vector2;

    fn setter(name: &'static str, to: f64) -> Arc<dyn Expression> {
        from_fn(move |cx| {
            let this = cx.this();
            cx.set(this, name, to)?;
            Ok(Value::Nil)
        })
    }

    fn attached_view(scene: &mut Scene) -> NodeId {
        let window = scene.create_window(Vector2::new(100., 100.), None);
        let view = scene.create_view("V");
        scene.add_child(window, view).unwrap();
        scene
            .add_property(view, Arc::new(Declaration::value("x", 1.)))
            .unwrap();
        view
    }

    #[test]
    fn first_match_consumes() {
        let mut scene = Scene::default();
        let view = attached_view(&mut scene);
        scene
            .add_behavior(view, Behavior::on(Event::key_pressed(KeyCode::A), setter("x", 2.)))
            .unwrap();
        scene
            .add_behavior(view, Behavior::on(Event::new(EventKind::KeyPressed), setter("x", 3.)))
            .unwrap();

        assert!(scene.react_to(view, &Event::key_pressed(KeyCode::A)));
        assert_eq!(scene.number(view, "x").unwrap(), 2.);
        assert!(scene.react_to(view, &Event::key_pressed(KeyCode::B)));
        assert_eq!(scene.number(view, "x").unwrap(), 3.);
        assert!(!scene.react_to(view, &Event::key_typed('a')));
    }

    #[test]
    fn children_are_tried_when_the_parent_does_not_match() {
        let mut scene = Scene::default();
        let view = attached_view(&mut scene);
        let behavior = Behavior::on(Event::key_pressed(KeyCode::A), setter("x", 2.))
            .with_children(vec![Behavior::on(
                Event::key_pressed(KeyCode::B),
                setter("x", 3.),
            )]);
        scene.add_behavior(view, behavior).unwrap();
        assert!(scene.react_to(view, &Event::key_pressed(KeyCode::B)));
        assert_eq!(scene.number(view, "x").unwrap(), 3.);
    }

    #[test]
    fn unattached_and_disabled_views_ignore_events() {
        let mut scene = Scene::default();
        let orphan = scene.create_view("V");
        scene
            .add_behavior(orphan, Behavior::on(Event::new(EventKind::KeyTyped), setter("left", 2.)))
            .unwrap();
        assert!(!scene.react_to(orphan, &Event::key_typed('a')));

        let view = attached_view(&mut scene);
        scene
            .add_behavior(view, Behavior::on(Event::new(EventKind::KeyTyped), setter("x", 2.)))
            .unwrap();
        scene.set_named(view, "enabled", false, None).unwrap();
        assert!(!scene.react_to(view, &Event::key_typed('a')));
        assert_eq!(scene.number(view, "x").unwrap(), 1.);
    }

    #[test]
    fn failing_action_does_not_consume() {
        let mut scene = Scene::default();
        let view = attached_view(&mut scene);
        let failing = from_fn(|cx| {
            let this = cx.this();
            cx.set(this, "x", 9.)?;
            Err(PropertyError::expression("nope"))
        });
        scene
            .add_behavior(view, Behavior::on(Event::new(EventKind::KeyTyped), failing))
            .unwrap();
        assert!(!scene.react_to(view, &Event::key_typed('a')));
        assert_eq!(scene.number(view, "x").unwrap(), 1.);
    }

    #[test]
    fn undoable_behaviors_record_their_writes() {
        let mut scene = Scene::default();
        let view = attached_view(&mut scene);
        scene
            .add_behavior(
                view,
                Behavior::on(Event::key_pressed(KeyCode::Return), setter("x", 5.)).undoable(),
            )
            .unwrap();
        let depth = scene.undo_depth();
        assert!(scene.react_to(view, &Event::key_pressed(KeyCode::Return)));
        assert_eq!(scene.undo_depth(), depth + 1);
        assert!(scene.undo());
        assert_eq!(scene.number(view, "x").unwrap(), 1.);
        assert_eq!(scene.undo_depth(), depth);
    }

    #[test]
    fn conditions_can_read_properties() {
        let mut scene = Scene::default();
        let view = attached_view(&mut scene);
        let condition = from_fn(|cx| {
            let armed = cx.get_this("x")?.number()? > 0.;
            Ok(if armed {
                Value::Event(Box::new(Event::new(EventKind::KeyTyped)))
            } else {
                Value::Nil
            })
        });
        scene
            .add_behavior(view, Behavior::when(condition, setter("x", -1.)))
            .unwrap();
        assert!(scene.react_to(view, &Event::key_typed('a')));
        assert!(!scene.react_to(view, &Event::key_typed('a')));
    }
}
