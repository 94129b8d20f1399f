//! Events.
//!
//! An [`Event`] is an immutable record of one input occurrence. The same type doubles as an event
//! *pattern* in behavior conditions: any optional field left unset on either side acts as a
//! wildcard when two events are compared with [`Event::matches`].

use crate::scene::NodeId;
use cgmath::{Point2, Vector2};
use std::time::Duration;

/// List of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyPressed,
    KeyReleased,
    /// A character was typed; `character` holds it.
    KeyTyped,
    MousePressed,
    MouseReleased,
    MouseMoved,
    /// The pointer moved with a button held.
    MouseDragged,
    MouseWheel,
    /// The pointer entered a view. Synthesized by the dispatcher.
    Entered,
    /// The pointer left a view. Synthesized by the dispatcher.
    Exited,
    /// A picked view was dragged over a view. Synthesized by the dispatcher.
    DraggedIn,
    /// A picked view was dragged away from a view. Synthesized by the dispatcher.
    DraggedOut,
    FocusGained,
    FocusLost,
    WindowResized,
    WindowClosed,
}

impl EventKind {
    /// Negligible events may be replaced by a newer event of the same kind while still queued.
    pub fn is_negligible(self) -> bool {
        matches!(self, EventKind::MouseMoved | EventKind::MouseDragged)
    }

    /// Keyboard-class events go to the focused view.
    pub fn is_keyboard(self) -> bool {
        matches!(
            self,
            EventKind::KeyPressed | EventKind::KeyReleased | EventKind::KeyTyped
        )
    }

    /// Pointer-class events go to the deepest view under the cursor.
    pub fn is_pointer(self) -> bool {
        matches!(
            self,
            EventKind::MousePressed
                | EventKind::MouseReleased
                | EventKind::MouseMoved
                | EventKind::MouseDragged
                | EventKind::MouseWheel
        )
    }
}

/// How focus arrived at (or left) a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusDirection {
    /// Forward in tree order (tab).
    Next,
    /// Backward in tree order (shift-tab).
    Previous,
    /// The nearest focusable view above.
    Above,
    /// The nearest focusable view below.
    Below,
    /// A click.
    Mouse,
    /// A composite view focusing itself before delegating to one of its children. Doesn’t
    /// update the window’s last-focus record.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

/// Modifier key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyModifiers {
    /// Whether any shift key is pressed.
    pub shift: bool,

    /// Whether any control key is pressed.
    pub control: bool,

    /// Whether any option key or alt key is pressed.
    pub option: bool,

    /// Whether any command key or meta key is pressed.
    pub command: bool,
}

/// An input event, or an event pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,

    /// Target window; `None` means the first window of the scene.
    pub window: Option<NodeId>,

    /// Time since the producer started. Ignored by [`Event::matches`].
    pub timestamp: Duration,

    pub key: Option<KeyCode>,
    pub character: Option<char>,
    pub button: Option<MouseButton>,

    /// Pointer location in window coordinates.
    pub location: Option<Point2<f64>>,

    /// Scroll delta in points.
    pub delta: Option<Vector2<f64>>,

    pub modifiers: Option<KeyModifiers>,
    pub focus_direction: Option<FocusDirection>,

    /// New window size, for resize events.
    pub size: Option<Vector2<f64>>,
}

impl Event {
    /// Creates an event of the given kind with every optional field unset.
    pub fn new(kind: EventKind) -> Event {
        Event {
            kind,
            window: None,
            timestamp: Duration::from_secs(0),
            key: None,
            character: None,
            button: None,
            location: None,
            delta: None,
            modifiers: None,
            focus_direction: None,
            size: None,
        }
    }

    pub fn key_pressed(key: KeyCode) -> Event {
        Event {
            key: Some(key),
            ..Event::new(EventKind::KeyPressed)
        }
    }

    pub fn key_typed(character: char) -> Event {
        Event {
            character: Some(character),
            ..Event::new(EventKind::KeyTyped)
        }
    }

    pub fn mouse_pressed(location: Point2<f64>, button: MouseButton) -> Event {
        Event {
            location: Some(location),
            button: Some(button),
            ..Event::new(EventKind::MousePressed)
        }
    }

    pub fn mouse_released(location: Point2<f64>, button: MouseButton) -> Event {
        Event {
            location: Some(location),
            button: Some(button),
            ..Event::new(EventKind::MouseReleased)
        }
    }

    pub fn mouse_moved(location: Point2<f64>) -> Event {
        Event {
            location: Some(location),
            ..Event::new(EventKind::MouseMoved)
        }
    }

    pub fn mouse_dragged(location: Point2<f64>) -> Event {
        Event {
            location: Some(location),
            ..Event::new(EventKind::MouseDragged)
        }
    }

    pub fn resized(window: NodeId, size: Vector2<f64>) -> Event {
        Event {
            window: Some(window),
            size: Some(size),
            ..Event::new(EventKind::WindowResized)
        }
    }

    pub fn with_window(mut self, window: NodeId) -> Event {
        self.window = Some(window);
        self
    }

    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Event {
        self.modifiers = Some(modifiers);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Event {
        self.timestamp = timestamp;
        self
    }

    /// Structural equivalence: the kinds are equal and every field set on both sides is equal.
    pub fn matches(&self, other: &Event) -> bool {
        fn field<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        self.kind == other.kind
            && field(&self.window, &other.window)
            && field(&self.key, &other.key)
            && field(&self.character, &other.character)
            && field(&self.button, &other.button)
            && field(&self.location, &other.location)
            && field(&self.delta, &other.delta)
            && field(&self.modifiers, &other.modifiers)
            && field(&self.focus_direction, &other.focus_direction)
            && field(&self.size, &other.size)
    }

    /// Returns true if a queued `self` may be replaced by `newer`.
    pub(crate) fn coalesces_with(&self, newer: &Event) -> bool {
        self.kind.is_negligible() && self.kind == newer.kind && self.window == newer.window
    }
}

/// Keyboard layout-independent identifiers for keyboard keys.
///
/// Some obscure keys may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    N0,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    N8,
    N9,
    Return,
    Tab,
    Space,
    Delete,
    ForwardDelete,
    Escape,
    LeftArrow,
    RightArrow,
    UpArrow,
    DownArrow,
    Home,
    End,
    PageUp,
    PageDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_wildcards() {
        let pattern = Event::new(EventKind::KeyPressed);
        assert!(pattern.matches(&Event::key_pressed(KeyCode::A)));
        assert!(Event::key_pressed(KeyCode::A).matches(&pattern));
        assert!(!Event::key_pressed(KeyCode::B).matches(&Event::key_pressed(KeyCode::A)));
        assert!(!pattern.matches(&Event::key_typed('a')));
    }

    #[test]
    fn timestamps_are_ignored() {
        let a = Event::key_typed('x').with_timestamp(Duration::from_millis(1));
        let b = Event::key_typed('x').with_timestamp(Duration::from_millis(9));
        assert!(a.matches(&b));
    }

    #[test]
    fn only_negligible_events_coalesce() {
        let moved = Event::mouse_moved(Point2::new(1., 1.));
        assert!(moved.coalesces_with(&Event::mouse_moved(Point2::new(2., 2.))));
        assert!(!moved.coalesces_with(&Event::mouse_dragged(Point2::new(2., 2.))));
        let typed = Event::key_typed('a');
        assert!(!typed.coalesces_with(&Event::key_typed('b')));
    }
}
