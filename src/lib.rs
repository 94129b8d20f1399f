//! A retained-mode view toolkit.
//!
//! A [`Scene`] holds elements with named, lazily evaluated properties. A property is either
//! written directly or defined by an [`Expression`]; reading it records what the expression read,
//! so writes only mark dependents out of date and nothing is recomputed until it’s read again.
//!
//! Views are elements that form a tree with geometry, paint layers and [`Behavior`]s. Windows sit
//! at the roots: they route events, track damage and repaint onto a [`Surface`]. The
//! [`Scheduler`] runs work cycles for a scene on a worker thread.
//!
//! ```
//! use tern::{Expr, Scene};
//!
//! let mut scene = Scene::default();
//! let parent = scene.create_view("Parent");
//! let child = scene.create_view("Child");
//! scene.add_child(parent, child).unwrap();
//!
//! let width = scene.property(parent, "width").unwrap();
//! scene.define(width, Expr::child(0, "width") + 10.).unwrap();
//! scene.set_named(child, "width", 20., None).unwrap();
//! assert_eq!(scene.number(parent, "width").unwrap(), 30.);
//! ```

mod arena;
pub mod animation;
pub mod backend;
pub mod behavior;
pub mod clock;
pub mod color;
pub mod config;
pub mod damage;
pub mod declaration;
pub mod error;
pub mod events;
pub mod expr;
mod graph;
pub mod host;
pub mod paint;
pub mod property;
pub mod queue;
pub mod rect;
pub mod registry;
pub mod scene;
pub mod scheduler;
pub mod transition;
mod undo;
pub mod value;
pub mod view;
pub mod window;

pub use animation::Animation;
pub use backend::{Canvas, PaintOp, RecordingSurface, Surface};
pub use behavior::Behavior;
pub use clock::{Clock, ManualClock, SystemClock};
pub use color::Color;
pub use config::Config;
pub use damage::{Damage, DamageAccumulator};
pub use declaration::{DeclFlags, Declaration};
pub use error::{Error, PropertyError, TreeError};
pub use events::{Event, EventKind, FocusDirection, KeyCode, KeyModifiers, MouseButton};
pub use expr::{from_fn, Expr, Expression, Target};
pub use host::{Host, RawEvent};
pub use paint::{BorderPaint, FillPaint, Paint};
pub use property::{Listener, ListenerId, Notice, NoticeKind, Validity};
pub use queue::EventQueue;
pub use rect::Rect;
pub use registry::{TypeRegistry, ViewTemplate, ViewType};
pub use scene::{Evaluator, NodeId, PropertyId, PropertyPath, Scene};
pub use scheduler::{CycleReport, PauseGuard, Phase, Scheduler, SchedulerHandle};
pub use transition::{Easing, Transition};
pub use value::{Value, ValueType};
pub use view::Layer;
