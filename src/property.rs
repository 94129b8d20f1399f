//! Property slots.

use crate::declaration::Declaration;
use crate::error::PropertyError;
use crate::expr::Expression;
use crate::scene::{NodeId, PropertyId};
use crate::transition::Transition;
use crate::value::Value;
use core::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Evaluation state of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validity {
    /// A dependency changed; the next read recomputes.
    OutOfDate,
    /// Currently on the evaluation stack. Reading it again means there is a cycle.
    Evaluating,
    Valid,
    /// Holds its target value; the visible value is still moving towards it.
    Transitioning,
    /// The last evaluation failed. Stays failed until a dependency changes.
    Failed,
}

/// What defines a property’s value.
#[derive(Clone)]
pub(crate) enum Source {
    /// The declaration’s default expression.
    Default,
    /// An expression installed with `define`.
    Expr(Arc<dyn Expression>),
    /// A value written with `set`.
    Set(Value),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Default => write!(f, "Default"),
            Source::Expr(_) => write!(f, "Expr(..)"),
            Source::Set(value) => write!(f, "Set({:?})", value),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TransitionState {
    pub(crate) from: Value,
    pub(crate) start: Duration,
    pub(crate) transition: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// A dependency changed. Fired when the property is marked, before anything recomputes.
    OutOfDate,
    /// The value changed.
    Changed,
    /// The property started or stopped failing.
    ValidityChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Notice {
    pub property: PropertyId,
    pub kind: NoticeKind,
}

/// A property listener.
///
/// Listeners run synchronously on the worker thread and only see the notice, so they can’t
/// reenter the scene.
#[derive(Clone)]
pub struct Listener(pub(crate) Arc<dyn Fn(&Notice) + Send + Sync>);

impl Listener {
    pub fn new(f: impl Fn(&Notice) + Send + Sync + 'static) -> Listener {
        Listener(Arc::new(f))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Listener(..)")
    }
}

/// Identifies a listener for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug)]
pub(crate) struct PropertySlot {
    pub(crate) owner: NodeId,
    pub(crate) decl: Arc<Declaration>,
    /// The logical value. While transitioning this is the target.
    pub(crate) value: Value,
    pub(crate) validity: Validity,
    pub(crate) error: Option<PropertyError>,
    pub(crate) source: Source,
    pub(crate) transition: Option<TransitionState>,
    pub(crate) listeners: Vec<(ListenerId, Listener)>,
    /// Number of times the defining expression ran.
    pub(crate) evaluations: u64,
}

impl PropertySlot {
    pub(crate) fn new(owner: NodeId, decl: Arc<Declaration>) -> PropertySlot {
        PropertySlot {
            owner,
            decl,
            value: Value::Nil,
            validity: Validity::OutOfDate,
            error: None,
            source: Source::Default,
            transition: None,
            listeners: Vec::new(),
            evaluations: 0,
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.decl.name
    }

    /// Returns the listeners to notify, if any.
    pub(crate) fn listeners_for(&self) -> Option<Vec<Listener>> {
        if self.listeners.is_empty() {
            None
        } else {
            Some(self.listeners.iter().map(|(_, l)| l.clone()).collect())
        }
    }
}
