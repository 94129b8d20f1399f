//! Error types.

use crate::scene::{NodeId, PropertyId, PropertyPath};
use crate::value::ValueType;
use core::fmt;
use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single property read, write or evaluation.
///
/// These are cloneable because a property that failed to evaluate keeps its error until one of
/// its dependencies changes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("dependency cycle: {}", CycleChain(.chain))]
    Cycle { chain: Vec<PropertyPath> },

    #[error("{property}: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        property: PropertyPath,
        expected: ValueType,
        found: ValueType,
    },

    #[error("{element} has no property named {name:?}")]
    UnknownProperty { element: NodeId, name: Arc<str> },

    #[error("{0} no longer exists")]
    StaleElement(NodeId),

    #[error("{0} no longer exists")]
    StaleProperty(PropertyId),

    #[error("{0} is constant")]
    Constant(PropertyPath),

    #[error("{0} cannot be overridden")]
    NotOverridable(PropertyPath),

    #[error("cannot write {0} while evaluating a constraint")]
    ReadOnly(PropertyPath),

    #[error("expected an element, found {0:?}")]
    NotAnElement(ValueType),

    #[error("{message}")]
    Expression { message: String },
}

impl PropertyError {
    /// An error raised by user-supplied expression code.
    pub fn expression(message: impl Into<String>) -> Self {
        PropertyError::Expression {
            message: message.into(),
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, PropertyError::Cycle { .. })
    }
}

struct CycleChain<'a>(&'a [PropertyPath]);

impl fmt::Display for CycleChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", path)?;
        }
        Ok(())
    }
}

/// Violations of the view tree structure. Raised before any mutation happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("{child} already has a parent")]
    AlreadyParented { child: NodeId },

    #[error("cannot insert {child} into itself or its own descendant {parent}")]
    InsertIntoSelf { parent: NodeId, child: NodeId },

    #[error("{0} is not a view")]
    NotAView(NodeId),

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("{0} is already owned by another property")]
    AlreadyOwned(NodeId),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Property(#[from] PropertyError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("event queue is full ({capacity} events)")]
    QueueFull { capacity: usize },

    #[error("an animation is already running for {0}")]
    AlreadyAnimating(NodeId),

    #[error("{0} is not a window")]
    NotAWindow(NodeId),

    #[error("no view type named {0:?}")]
    UnknownType(Arc<str>),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("the worker thread is gone")]
    WorkerGone,

    #[error("failed to start the worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
