//! The scene: element and property storage, and the lazy evaluation engine.
//!
//! All state lives in arenas owned by [`Scene`]; elements, properties and views refer to each
//! other by handle. A scene is only ever touched by one thread at a time (the worker, or whoever
//! holds a pause guard), so every operation takes `&mut self`.

use crate::animation::Animator;
use crate::arena::{Arena, RawId};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::declaration::Declaration;
use crate::error::{Error, PropertyError, TreeError};
use crate::events::Event;
use crate::expr::{Expr, Expression};
use crate::graph::DependencyGraph;
use crate::property::{
    Listener, ListenerId, Notice, NoticeKind, PropertySlot, Source, TransitionState, Validity,
};
use crate::transition::Transition;
use crate::undo::{Change, UndoManager};
use crate::value::Value;
use crate::view::ViewData;
use core::fmt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Properties whose failure means the layout contract itself is broken.
const CORE_PROPERTIES: &[&str] = &["parent", "children", "left", "top", "width", "height", "hidden"];

/// Handle to an element.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) RawId);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NodeId({:?})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0.index)
    }
}

/// Handle to a property.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(pub(crate) RawId);

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PropertyId({:?})", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "property {:?}", self.0)
    }
}

/// Element and property name, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    pub element: NodeId,
    pub name: Arc<str>,
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.element, self.name)
    }
}

#[derive(Debug)]
pub(crate) struct ElementData {
    pub(crate) type_name: Arc<str>,
    pub(crate) properties: BTreeMap<Arc<str>, PropertyId>,
    /// The property slot that owns this element, if any.
    pub(crate) owner: Option<PropertyId>,
    pub(crate) view: Option<ViewData>,
}

/// The scene graph.
pub struct Scene {
    pub(crate) elements: Arena<ElementData>,
    properties: Arena<PropertySlot>,
    graph: DependencyGraph,
    /// Properties currently being evaluated, innermost last.
    eval_stack: Vec<PropertyId>,
    out_of_date: VecDeque<PropertyId>,
    transitioning: BTreeSet<PropertyId>,
    pub(crate) needs_paint: BTreeSet<NodeId>,
    /// Incremented once per work cycle.
    pub(crate) update_time: u64,
    now: Duration,
    clock: Arc<dyn Clock>,
    pub(crate) config: Config,
    pub(crate) undo: UndoManager,
    pub(crate) animator: Animator,
    pub(crate) windows: Vec<NodeId>,
    next_listener: u64,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scene")
            .field("elements", &self.elements.len())
            .field("properties", &self.properties.len())
            .field("out_of_date", &self.out_of_date.len())
            .field("transitioning", &self.transitioning.len())
            .field("needs_paint", &self.needs_paint.len())
            .field("update_time", &self.update_time)
            .field("now", &self.now)
            .field("windows", &self.windows)
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Scene::new(Config::default())
    }
}

impl Scene {
    pub fn new(config: Config) -> Scene {
        Scene::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Scene {
        let config = config.sanitized();
        let now = clock.now();
        Scene {
            elements: Arena::default(),
            properties: Arena::default(),
            graph: DependencyGraph::default(),
            eval_stack: Vec::new(),
            out_of_date: VecDeque::new(),
            transitioning: BTreeSet::new(),
            needs_paint: BTreeSet::new(),
            update_time: 0,
            now,
            undo: UndoManager::new(config.undo_limit),
            animator: Animator::default(),
            windows: Vec::new(),
            config,
            clock,
            next_listener: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The time sampled at the start of the current work cycle.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn update_time(&self) -> u64 {
        self.update_time
    }

    /// Samples the clock.
    pub fn sync_clock(&mut self) {
        self.now = self.clock.now();
    }

    /// Starts a new work cycle: samples the clock and re-arms per-cycle damage stamps.
    pub fn begin_cycle(&mut self) {
        self.update_time += 1;
        self.sync_clock();
    }

    // elements

    /// Creates an orphan element with properties for the given declarations.
    pub fn create_element(
        &mut self,
        type_name: &str,
        declarations: impl IntoIterator<Item = Arc<Declaration>>,
    ) -> NodeId {
        let node = NodeId(self.elements.insert(ElementData {
            type_name: type_name.into(),
            properties: BTreeMap::new(),
            owner: None,
            view: None,
        }));
        for decl in declarations {
            self.insert_property(node, decl);
        }
        node
    }

    fn insert_property(&mut self, node: NodeId, decl: Arc<Declaration>) -> PropertyId {
        let name = Arc::clone(&decl.name);
        let prop = PropertyId(self.properties.insert(PropertySlot::new(node, decl)));
        if let Some(element) = self.elements.get_mut(node.0) {
            if let Some(old) = element.properties.insert(name, prop) {
                self.drop_property(old);
            }
        }
        prop
    }

    /// Adds a property to an existing element, replacing any property of the same name.
    pub fn add_property(
        &mut self,
        node: NodeId,
        decl: impl Into<Arc<Declaration>>,
    ) -> Result<PropertyId, PropertyError> {
        if !self.elements.contains(node.0) {
            return Err(PropertyError::StaleElement(node));
        }
        Ok(self.insert_property(node, decl.into()))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.elements.contains(node.0)
    }

    pub fn type_name(&self, node: NodeId) -> Option<&str> {
        self.elements.get(node.0).map(|e| &*e.type_name)
    }

    pub(crate) fn element(&self, node: NodeId) -> Result<&ElementData, PropertyError> {
        self.elements
            .get(node.0)
            .ok_or(PropertyError::StaleElement(node))
    }

    pub(crate) fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData, PropertyError> {
        self.elements
            .get_mut(node.0)
            .ok_or(PropertyError::StaleElement(node))
    }

    /// Looks up a property by name.
    pub fn property(&self, node: NodeId, name: &str) -> Result<PropertyId, PropertyError> {
        self.element(node)?
            .properties
            .get(name)
            .copied()
            .ok_or_else(|| PropertyError::UnknownProperty {
                element: node,
                name: name.into(),
            })
    }

    pub(crate) fn find_property(&self, node: NodeId, name: &str) -> Option<PropertyId> {
        self.elements.get(node.0)?.properties.get(name).copied()
    }

    /// Names of an element’s properties, sorted.
    pub fn property_names(&self, node: NodeId) -> Vec<Arc<str>> {
        self.elements
            .get(node.0)
            .map(|e| e.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The element owning a property.
    pub fn property_owner(&self, prop: PropertyId) -> Option<NodeId> {
        self.properties.get(prop.0).map(|slot| slot.owner)
    }

    pub fn path(&self, prop: PropertyId) -> Option<PropertyPath> {
        self.properties.get(prop.0).map(|slot| PropertyPath {
            element: slot.owner,
            name: Arc::clone(slot.name()),
        })
    }

    fn path_or_stale(&self, prop: PropertyId) -> Result<PropertyPath, PropertyError> {
        self.path(prop).ok_or(PropertyError::StaleProperty(prop))
    }

    fn slot(&self, prop: PropertyId) -> Result<&PropertySlot, PropertyError> {
        self.properties
            .get(prop.0)
            .ok_or(PropertyError::StaleProperty(prop))
    }

    fn slot_mut(&mut self, prop: PropertyId) -> Result<&mut PropertySlot, PropertyError> {
        self.properties
            .get_mut(prop.0)
            .ok_or(PropertyError::StaleProperty(prop))
    }

    /// The element slot that owns `node`.
    pub fn owner(&self, node: NodeId) -> Option<PropertyId> {
        self.elements.get(node.0).and_then(|e| e.owner)
    }

    /// Stores an orphan element in an owner slot.
    ///
    /// An element previously held by the slot becomes an orphan.
    pub fn adopt(&mut self, owner: PropertyId, element: NodeId) -> Result<(), Error> {
        if self.element(element)?.owner.is_some() {
            return Err(TreeError::AlreadyOwned(element).into());
        }
        self.check_writable(owner)?;
        self.release_owned(owner);
        self.write(owner, Value::Element(element), None, true)?;
        self.element_mut(element)?.owner = Some(owner);
        Ok(())
    }

    /// Hands `old`’s owner slot and tree position over to `new`, which must be an orphan.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> Result<(), Error> {
        self.element(old)?;
        if self.element(new)?.owner.is_some() {
            return Err(TreeError::AlreadyOwned(new).into());
        }
        if self.parent(new).is_some() {
            return Err(TreeError::AlreadyParented { child: new }.into());
        }

        if let Some(owner) = self.element(old)?.owner {
            self.write(owner, Value::Element(new), None, true)?;
            self.element_mut(old)?.owner = None;
            self.element_mut(new)?.owner = Some(owner);
        }

        if let Some(parent) = self.parent(old) {
            let index = self
                .children(parent)
                .iter()
                .position(|c| *c == old)
                .ok_or(TreeError::NotAChild { parent, child: old })?;
            self.remove_child(parent, old)?;
            self.insert_child(parent, new, Some(index))?;
        }
        Ok(())
    }

    /// Orphans the element currently held by `owner`, if it owns one.
    fn release_owned(&mut self, owner: PropertyId) {
        let held = match self.properties.get(owner.0).map(|slot| &slot.value) {
            Some(Value::Element(node)) => *node,
            _ => return,
        };
        if let Some(element) = self.elements.get_mut(held.0) {
            if element.owner == Some(owner) {
                element.owner = None;
            }
        }
    }

    /// Frees an element, its properties and its view subtree.
    ///
    /// The removed views’ painted area is damaged so it gets erased.
    pub fn remove_element(&mut self, node: NodeId) -> Result<(), Error> {
        self.element(node)?;

        if self.is_view(node) {
            if let Some(parent) = self.parent(node) {
                self.remove_child(parent, node)?;
            }
            for child in self.children(node).to_vec() {
                self.remove_element(child)?;
            }
        }

        if let Some(owner) = self.element(node)?.owner {
            if let Ok(slot) = self.slot(owner) {
                if slot.value == Value::Element(node) {
                    self.write(owner, Value::Nil, None, false)?;
                }
            }
        }

        let props: Vec<_> = self.element(node)?.properties.values().copied().collect();
        for prop in props {
            self.release_owned(prop);
            self.invalidate_users(prop);
            self.drop_property(prop);
        }

        self.forget_view(node);
        self.animator.cancel(node);
        self.needs_paint.remove(&node);
        self.elements.remove(node.0);
        debug!(%node, "removed element");
        Ok(())
    }

    fn drop_property(&mut self, prop: PropertyId) {
        self.graph.remove(prop);
        self.transitioning.remove(&prop);
        self.properties.remove(prop.0);
    }

    // reading

    /// Returns the property’s logical value, recomputing it first if it’s out of date.
    ///
    /// When called while another property is evaluating, that property is recorded as a user of
    /// this one.
    pub fn get(&mut self, prop: PropertyId) -> Result<Value, PropertyError> {
        let slot = self.slot(prop)?;
        let validity = slot.validity;
        if let Some(&reader) = self.eval_stack.last() {
            if reader != prop || validity != Validity::Evaluating {
                self.graph.add_read(reader, prop);
            }
        }

        match validity {
            Validity::Valid | Validity::Transitioning => Ok(self.slot(prop)?.value.clone()),
            Validity::Failed => Err(self
                .slot(prop)?
                .error
                .clone()
                .unwrap_or_else(|| PropertyError::expression("failed"))),
            Validity::Evaluating => Err(self.cycle_error(prop)),
            Validity::OutOfDate => self.recompute(prop),
        }
    }

    pub fn get_named(&mut self, node: NodeId, name: &str) -> Result<Value, PropertyError> {
        let prop = self.property(node, name)?;
        self.get(prop)
    }

    pub fn number(&mut self, node: NodeId, name: &str) -> Result<f64, PropertyError> {
        self.get_named(node, name)?.number()
    }

    /// Returns what should be painted right now: the interpolated value while transitioning,
    /// the logical value otherwise.
    pub fn get_visible(&mut self, prop: PropertyId) -> Result<Value, PropertyError> {
        let now = self.now;
        self.get_visible_at(prop, now)
    }

    /// Like [`Scene::get_visible`], at an arbitrary time.
    pub fn get_visible_at(&mut self, prop: PropertyId, at: Duration) -> Result<Value, PropertyError> {
        let value = self.get(prop)?;
        match &self.slot(prop)?.transition {
            Some(state) => {
                let t = state.transition.progress(state.start, at);
                Ok(state.from.interpolate(&value, t))
            }
            None => Ok(value),
        }
    }

    pub(crate) fn visible_named(&mut self, node: NodeId, name: &str) -> Result<Value, PropertyError> {
        let prop = self.property(node, name)?;
        self.get_visible(prop)
    }

    pub fn validity(&self, prop: PropertyId) -> Option<Validity> {
        self.properties.get(prop.0).map(|slot| slot.validity)
    }

    /// The error from the property’s last failed evaluation.
    pub fn error(&self, prop: PropertyId) -> Option<PropertyError> {
        self.properties.get(prop.0).and_then(|slot| slot.error.clone())
    }

    /// How often the property’s defining expression has run.
    pub fn evaluations(&self, prop: PropertyId) -> u64 {
        self.properties.get(prop.0).map_or(0, |slot| slot.evaluations)
    }

    /// Properties that read `prop` during their last evaluation.
    pub fn users(&self, prop: PropertyId) -> Vec<PropertyId> {
        self.graph.users(prop).collect()
    }

    /// Properties `prop` read during its last evaluation.
    pub fn reads(&self, prop: PropertyId) -> Vec<PropertyId> {
        self.graph.reads(prop).collect()
    }

    fn cycle_error(&self, prop: PropertyId) -> PropertyError {
        let start = self
            .eval_stack
            .iter()
            .position(|p| *p == prop)
            .unwrap_or(0);
        let chain: Vec<_> = self.eval_stack[start..]
            .iter()
            .chain(Some(&prop))
            .filter_map(|p| self.path(*p))
            .collect();
        let err = PropertyError::Cycle { chain };
        debug!("{}", err);
        err
    }

    fn recompute(&mut self, prop: PropertyId) -> Result<Value, PropertyError> {
        self.graph.clear_reads(prop);
        let slot = self.slot_mut(prop)?;
        let expr = match &slot.source {
            Source::Set(value) => {
                let value = value.clone();
                slot.validity = if slot.transition.is_some() {
                    Validity::Transitioning
                } else {
                    Validity::Valid
                };
                return Ok(value);
            }
            Source::Expr(expr) => Arc::clone(expr),
            Source::Default => Arc::clone(&slot.decl.default),
        };
        let owner = slot.owner;
        let name = Arc::clone(slot.name());
        slot.validity = Validity::Evaluating;
        trace!(element = %owner, name = &*name, "recompute");

        self.eval_stack.push(prop);
        let result = expr.evaluate(&mut Evaluator::new(self, owner, None, false));
        self.eval_stack.pop();

        let result = result.and_then(|value| self.check_type(prop, value));
        self.store(prop, result)
    }

    fn check_type(&self, prop: PropertyId, value: Value) -> Result<Value, PropertyError> {
        let slot = self.slot(prop)?;
        if slot.decl.ty.accepts(value.ty()) {
            Ok(value)
        } else {
            Err(PropertyError::TypeMismatch {
                property: self.path_or_stale(prop)?,
                expected: slot.decl.ty,
                found: value.ty(),
            })
        }
    }

    fn store(
        &mut self,
        prop: PropertyId,
        result: Result<Value, PropertyError>,
    ) -> Result<Value, PropertyError> {
        let slot = self.slot_mut(prop)?;
        // a first evaluation is covered by the damage posted when the view was added
        let first = slot.evaluations == 0;
        slot.evaluations += 1;
        let was_failed = slot.error.is_some();
        let owner = slot.owner;

        match result {
            Ok(value) => {
                let changed = slot.value != value;
                slot.value = value.clone();
                slot.error = None;
                slot.validity = Validity::Valid;
                slot.transition = None;
                let affects_paint = slot.decl.affects_painting();
                self.transitioning.remove(&prop);
                if changed {
                    if affects_paint && !first {
                        self.needs_paint.insert(owner);
                    }
                    self.notify(prop, NoticeKind::Changed);
                }
                if was_failed {
                    self.notify(prop, NoticeKind::ValidityChanged);
                }
                Ok(value)
            }
            Err(err) => {
                slot.error = Some(err.clone());
                slot.validity = Validity::Failed;
                if !was_failed {
                    self.notify(prop, NoticeKind::ValidityChanged);
                }
                Err(err)
            }
        }
    }

    // writing

    fn check_writable(&self, prop: PropertyId) -> Result<(), PropertyError> {
        let slot = self.slot(prop)?;
        if !self.eval_stack.is_empty() {
            return Err(PropertyError::ReadOnly(self.path_or_stale(prop)?));
        }
        if slot.decl.is_constant() {
            return Err(PropertyError::Constant(self.path_or_stale(prop)?));
        }
        if !slot.decl.is_overridable() {
            return Err(PropertyError::NotOverridable(self.path_or_stale(prop)?));
        }
        Ok(())
    }

    /// Writes a value.
    ///
    /// Without a transition the write is immediate. With one, the property serves the new value
    /// as its logical value right away while its visible value moves from the current visible
    /// value to the new one over the transition’s duration. Either way, users are only marked
    /// out of date; nothing is recomputed until it’s read.
    pub fn set(
        &mut self,
        prop: PropertyId,
        value: impl Into<Value>,
        transition: Option<Transition>,
    ) -> Result<(), PropertyError> {
        self.check_writable(prop)?;
        self.write(prop, value.into(), transition, true)
    }

    pub fn set_named(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<Value>,
        transition: Option<Transition>,
    ) -> Result<(), PropertyError> {
        let prop = self.property(node, name)?;
        self.set(prop, value, transition)
    }

    /// Replaces the property’s defining expression.
    pub fn define(&mut self, prop: PropertyId, expr: impl Into<Expr>) -> Result<(), PropertyError> {
        self.check_writable(prop)?;
        let expr: Arc<dyn Expression> = Arc::new(expr.into());
        self.install(prop, Source::Expr(expr), true)
    }

    /// Drops any written value or expression, going back to the declaration’s default.
    pub fn reset(&mut self, prop: PropertyId) -> Result<(), PropertyError> {
        self.check_writable(prop)?;
        self.install(prop, Source::Default, true)
    }

    /// Writes without access checks. Used for tree bookkeeping.
    pub(crate) fn write_internal(&mut self, node: NodeId, name: &str, value: Value) {
        if let Some(prop) = self.find_property(node, name) {
            if let Err(err) = self.write(prop, value, None, false) {
                error!(%node, name, %err, "internal write failed");
            }
        }
    }

    pub(crate) fn install(
        &mut self,
        prop: PropertyId,
        source: Source,
        record: bool,
    ) -> Result<(), PropertyError> {
        let source = match source {
            Source::Set(value) => return self.write(prop, value, None, record),
            source => source,
        };
        let slot = self.slot_mut(prop)?;
        let before = std::mem::replace(&mut slot.source, source.clone());
        let undoable = slot.decl.is_undoable();
        slot.transition = None;
        self.transitioning.remove(&prop);
        if record {
            self.undo.record(Change {
                property: prop,
                before,
                after: source,
                undoable,
            });
        }
        self.graph.clear_reads(prop);
        if self.mark_out_of_date(prop) {
            self.invalidate_users(prop);
        }
        Ok(())
    }

    fn write(
        &mut self,
        prop: PropertyId,
        value: Value,
        transition: Option<Transition>,
        record: bool,
    ) -> Result<(), PropertyError> {
        let value = self.check_type(prop, value)?;
        let transition = transition.filter(|t| !t.duration.is_zero());
        let from = match transition {
            Some(_) => self.get_visible(prop).ok(),
            None => None,
        };
        let now = self.now;

        let slot = self.slot_mut(prop)?;
        let before = std::mem::replace(&mut slot.source, Source::Set(value.clone()));
        let undoable = slot.decl.is_undoable();
        let affects_paint = slot.decl.affects_painting();
        let owner = slot.owner;
        let was_failed = slot.error.take().is_some();
        let changed = slot.value != value
            || !matches!(slot.validity, Validity::Valid | Validity::Transitioning);
        slot.value = value.clone();

        match (transition, from) {
            (Some(transition), Some(from)) if from != value => {
                slot.transition = Some(TransitionState {
                    from,
                    start: now,
                    transition,
                });
                slot.validity = Validity::Transitioning;
                self.transitioning.insert(prop);
            }
            _ => {
                slot.transition = None;
                slot.validity = Validity::Valid;
                self.transitioning.remove(&prop);
            }
        }

        self.graph.clear_reads(prop);
        if record {
            self.undo.record(Change {
                property: prop,
                before,
                after: Source::Set(value),
                undoable,
            });
        }
        if changed {
            if affects_paint {
                self.needs_paint.insert(owner);
            }
            self.notify(prop, NoticeKind::Changed);
            self.invalidate_users(prop);
        }
        if was_failed {
            self.notify(prop, NoticeKind::ValidityChanged);
        }
        Ok(())
    }

    // invalidation

    /// Marks a property out of date from outside the dependency graph.
    pub fn invalidate(&mut self, prop: PropertyId) {
        if self.mark_out_of_date(prop) {
            self.invalidate_users(prop);
        }
    }

    /// Marks every transitive user of `prop` out of date.
    fn invalidate_users(&mut self, prop: PropertyId) {
        let mut pending: Vec<_> = self.graph.users(prop).collect();
        while let Some(user) = pending.pop() {
            if self.mark_out_of_date(user) {
                pending.extend(self.graph.users(user));
            }
        }
    }

    /// Returns true if the property was newly marked.
    fn mark_out_of_date(&mut self, prop: PropertyId) -> bool {
        let slot = match self.properties.get_mut(prop.0) {
            Some(slot) => slot,
            None => return false,
        };
        if matches!(slot.validity, Validity::OutOfDate | Validity::Evaluating)
            || matches!(slot.source, Source::Set(_))
        {
            return false;
        }
        slot.validity = Validity::OutOfDate;
        self.out_of_date.push_back(prop);
        self.notify(prop, NoticeKind::OutOfDate);
        true
    }

    /// Recomputes everything marked out of date, including whatever gets marked while doing so.
    ///
    /// Failures are contained and logged. Returns the number of properties settled.
    pub fn settle(&mut self) -> usize {
        let limit = self.config.settle_limit;
        let mut settled = 0;
        while let Some(prop) = self.out_of_date.pop_front() {
            if self.validity(prop) != Some(Validity::OutOfDate) {
                continue;
            }
            if settled == limit {
                error!(
                    limit,
                    pending = self.out_of_date.len() + 1,
                    "settle limit reached; abandoning the rest of this cycle"
                );
                self.out_of_date.push_front(prop);
                break;
            }
            settled += 1;
            if let Err(err) = self.get(prop) {
                self.report_failure(prop, &err);
            }
        }
        settled
    }

    fn report_failure(&self, prop: PropertyId, err: &PropertyError) {
        let path = match self.path(prop) {
            Some(path) => path,
            None => return,
        };
        if err.is_cycle() && CORE_PROPERTIES.contains(&&*path.name) {
            error!(property = %path, %err, "layout contract violated");
        } else {
            warn!(property = %path, %err, "property failed to settle");
        }
    }

    pub fn has_out_of_date(&self) -> bool {
        !self.out_of_date.is_empty()
    }

    // transitions

    pub fn is_transitioning(&self, prop: PropertyId) -> bool {
        self.transitioning.contains(&prop)
    }

    /// Whether a transition on `prop` would be complete at `at`. True if there is none.
    pub fn is_done_transitioning(&self, prop: PropertyId, at: Duration) -> bool {
        match self.properties.get(prop.0).and_then(|s| s.transition.as_ref()) {
            Some(state) => state.transition.is_done(state.start, at),
            None => true,
        }
    }

    /// Repaints transitioning properties’ owners and retires finished transitions.
    pub fn progress_transitions(&mut self) {
        let now = self.now;
        let props: Vec<_> = self.transitioning.iter().copied().collect();
        for prop in props {
            let done = self.is_done_transitioning(prop, now);
            let slot = match self.properties.get_mut(prop.0) {
                Some(slot) => slot,
                None => {
                    self.transitioning.remove(&prop);
                    continue;
                }
            };
            let owner = slot.owner;
            if done {
                slot.transition = None;
                if slot.validity == Validity::Transitioning {
                    slot.validity = Validity::Valid;
                }
                self.transitioning.remove(&prop);
                self.notify(prop, NoticeKind::Changed);
            }
            self.needs_paint.insert(owner);
        }
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitioning.is_empty()
    }

    // listeners

    pub fn listen(
        &mut self,
        prop: PropertyId,
        listener: Listener,
    ) -> Result<ListenerId, PropertyError> {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.slot_mut(prop)?.listeners.push((id, listener));
        Ok(id)
    }

    pub fn unlisten(&mut self, prop: PropertyId, id: ListenerId) -> bool {
        match self.properties.get_mut(prop.0) {
            Some(slot) => {
                let before = slot.listeners.len();
                slot.listeners.retain(|(l, _)| *l != id);
                slot.listeners.len() != before
            }
            None => false,
        }
    }

    fn notify(&self, prop: PropertyId, kind: NoticeKind) {
        if let Some(listeners) = self.properties.get(prop.0).and_then(|s| s.listeners_for()) {
            let notice = Notice {
                property: prop,
                kind,
            };
            for listener in listeners {
                (listener.0)(&notice);
            }
        }
    }

    // painting bookkeeping

    /// Schedules a view for damage posting at the end of the cycle.
    pub fn request_paint(&mut self, node: NodeId) {
        if self.contains(node) {
            self.needs_paint.insert(node);
        }
    }

    /// True if anything would make a work cycle do something.
    pub fn has_pending_work(&self) -> bool {
        !self.out_of_date.is_empty()
            || !self.needs_paint.is_empty()
            || self.has_timed_work()
    }

    /// True while transitions or animations are running.
    pub fn has_timed_work(&self) -> bool {
        !self.transitioning.is_empty() || !self.animator.is_empty()
    }

    // actions

    /// Evaluates an expression in the context of `context` without recording dependencies.
    pub fn evaluate(
        &mut self,
        context: NodeId,
        expr: &dyn Expression,
        event: Option<&Event>,
    ) -> Result<Value, PropertyError> {
        expr.evaluate(&mut Evaluator::new(self, context, event.cloned(), false))
    }

    /// Runs an action, which may write properties.
    ///
    /// Writes made by a failing action are rolled back. Writes made by a successful undoable
    /// action become an undo record, nested in the enclosing action’s record if there is one.
    pub fn perform(
        &mut self,
        context: NodeId,
        action: &dyn Expression,
        undoable: bool,
        event: Option<&Event>,
    ) -> Result<Value, PropertyError> {
        self.undo.begin(undoable);
        let result = action.evaluate(&mut Evaluator::new(self, context, event.cloned(), true));
        let record = self.undo.end();
        match result {
            Ok(value) => {
                self.undo.commit(record);
                Ok(value)
            }
            Err(err) => {
                self.rollback(record);
                Err(err)
            }
        }
    }
}

/// Evaluation context handed to expressions.
///
/// Reads go through the scene so that a property being computed registers as a user of whatever
/// it reads. Writes are only possible when evaluating an action.
pub struct Evaluator<'s> {
    scene: &'s mut Scene,
    this: NodeId,
    event: Option<Event>,
    writable: bool,
}

impl<'s> Evaluator<'s> {
    pub(crate) fn new(
        scene: &'s mut Scene,
        this: NodeId,
        event: Option<Event>,
        writable: bool,
    ) -> Evaluator<'s> {
        Evaluator {
            scene,
            this,
            event,
            writable,
        }
    }

    /// The context element.
    pub fn this(&self) -> NodeId {
        self.this
    }

    /// The event being dispatched, when evaluating a behavior.
    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub fn now(&self) -> Duration {
        self.scene.now
    }

    pub fn get(&mut self, node: NodeId, name: &str) -> Result<Value, PropertyError> {
        self.scene.get_named(node, name)
    }

    pub fn get_this(&mut self, name: &str) -> Result<Value, PropertyError> {
        let this = self.this;
        self.get(this, name)
    }

    pub fn number(&mut self, node: NodeId, name: &str) -> Result<f64, PropertyError> {
        self.get(node, name)?.number()
    }

    /// The parent view; `None` for roots and non-view elements.
    pub fn parent(&mut self, node: NodeId) -> Result<Option<NodeId>, PropertyError> {
        if self.scene.find_property(node, "parent").is_none() {
            self.scene.element(node)?;
            return Ok(None);
        }
        match self.get(node, "parent")? {
            Value::Nil => Ok(None),
            value => value.element().map(Some),
        }
    }

    /// The child views; empty for non-view elements.
    pub fn children(&mut self, node: NodeId) -> Result<Vec<NodeId>, PropertyError> {
        if self.scene.find_property(node, "children").is_none() {
            self.scene.element(node)?;
            return Ok(Vec::new());
        }
        self.get(node, "children")?.elements()
    }

    pub fn set(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), PropertyError> {
        self.set_over(node, name, value, None)
    }

    pub fn set_over(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<Value>,
        transition: Option<Transition>,
    ) -> Result<(), PropertyError> {
        let prop = self.scene.property(node, name)?;
        if !self.writable {
            return Err(PropertyError::ReadOnly(self.scene.path_or_stale(prop)?));
        }
        self.scene.set(prop, value, transition)
    }

    /// Full scene access, for actions only.
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        if self.writable {
            Some(&mut *self.scene)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::from_fn;
    use crate::value::ValueType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<Declaration> {
        Arc::new(Declaration::value("value", 0.))
    }

    #[test]
    fn endless_transitions_keep_the_cycle_running() {
        let mut scene = Scene::default();
        let node = scene.create_element("A", [counter()]);
        let prop = scene.property(node, "value").unwrap();
        let forever = Transition::linear(Duration::MAX);
        scene.set(prop, 1., Some(forever)).unwrap();

        scene.run_cycle(None);
        assert!(scene.is_transitioning(prop));
        assert!(scene.has_timed_work());
        assert_eq!(scene.get(prop).unwrap(), Value::Number(1.));
    }

    #[test]
    fn reads_are_lazy_and_cached() {
        let mut scene = Scene::default();
        let a = scene.create_element("A", [counter()]);
        let b = scene.create_element("B", [counter()]);
        let a_value = scene.property(a, "value").unwrap();
        let b_value = scene.property(b, "value").unwrap();
        scene.define(b_value, Expr::of(a, "value") * 2.).unwrap();

        assert_eq!(scene.get(b_value).unwrap(), Value::Number(0.));
        assert_eq!(scene.evaluations(b_value), 1);
        assert_eq!(scene.users(a_value), vec![b_value]);

        scene.set(a_value, 4., None).unwrap();
        assert_eq!(scene.validity(b_value), Some(Validity::OutOfDate));
        assert_eq!(scene.evaluations(b_value), 1, "writes must not recompute readers");

        assert_eq!(scene.get(b_value).unwrap(), Value::Number(8.));
        assert_eq!(scene.get(b_value).unwrap(), Value::Number(8.));
        assert_eq!(scene.evaluations(b_value), 2);
    }

    #[test]
    fn dependencies_follow_the_branch_taken() {
        let mut scene = Scene::default();
        let decls = [
            Arc::new(Declaration::value("flag", true)),
            Arc::new(Declaration::value("x", 1.)),
            Arc::new(Declaration::value("y", 2.)),
            counter(),
        ];
        let n = scene.create_element("N", decls);
        let value = scene.property(n, "value").unwrap();
        let y = scene.property(n, "y").unwrap();
        scene
            .define(
                value,
                Expr::if_else(Expr::this("flag"), Expr::this("x"), Expr::this("y")),
            )
            .unwrap();
        assert_eq!(scene.get(value).unwrap(), Value::Number(1.));
        assert!(!scene.users(y).contains(&value));

        scene.set_named(n, "flag", false, None).unwrap();
        assert_eq!(scene.get(value).unwrap(), Value::Number(2.));
        assert!(scene.users(y).contains(&value));
    }

    #[test]
    fn cycles_are_reported_with_their_chain() {
        let mut scene = Scene::default();
        let a = scene.create_element("A", [counter()]);
        let b = scene.create_element("B", [counter()]);
        let a_value = scene.property(a, "value").unwrap();
        let b_value = scene.property(b, "value").unwrap();
        scene.define(a_value, Expr::of(b, "value") + 1.).unwrap();
        scene.define(b_value, Expr::of(a, "value") + 1.).unwrap();

        match scene.get(a_value) {
            Err(PropertyError::Cycle { chain }) => {
                let names: Vec<_> = chain.iter().map(|p| p.element).collect();
                assert_eq!(names, vec![a, b, a]);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
        assert_eq!(scene.validity(a_value), Some(Validity::Failed));
        assert_eq!(scene.validity(b_value), Some(Validity::Failed));

        // breaking the cycle recovers both
        scene.set(b_value, 5., None).unwrap();
        assert_eq!(scene.get(a_value).unwrap(), Value::Number(6.));
    }

    #[test]
    fn writes_are_checked() {
        let mut scene = Scene::default();
        let decls = [
            Arc::new(Declaration::value("ratio", 2.5).constant()),
            Arc::new(Declaration::new("n", ValueType::Number, 0.)),
        ];
        let n = scene.create_element("N", decls);
        assert!(matches!(
            scene.set_named(n, "ratio", 3., None),
            Err(PropertyError::Constant(_))
        ));
        assert!(matches!(
            scene.set_named(n, "n", "three", None),
            Err(PropertyError::TypeMismatch { .. })
        ));
        assert!(matches!(
            scene.set_named(n, "nope", 1., None),
            Err(PropertyError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn constraints_cannot_write() {
        let mut scene = Scene::default();
        let n = scene.create_element("N", [counter(), Arc::new(Declaration::value("other", 0.))]);
        let value = scene.property(n, "value").unwrap();
        scene
            .define(
                value,
                from_fn(|cx| {
                    let this = cx.this();
                    cx.set(this, "other", 1.)?;
                    Ok(Value::Nil)
                }),
            )
            .unwrap();
        assert!(matches!(scene.get(value), Err(PropertyError::ReadOnly(_))));
    }

    #[test]
    fn listeners_hear_invalidation_and_changes() {
        let mut scene = Scene::default();
        let a = scene.create_element("A", [counter()]);
        let b = scene.create_element("B", [counter()]);
        let a_value = scene.property(a, "value").unwrap();
        let b_value = scene.property(b, "value").unwrap();
        scene.define(b_value, Expr::of(a, "value") + 1.).unwrap();
        scene.get(b_value).unwrap();

        let out_of_date = Arc::new(AtomicUsize::new(0));
        let changed = Arc::new(AtomicUsize::new(0));
        let (o, c) = (Arc::clone(&out_of_date), Arc::clone(&changed));
        scene
            .listen(
                b_value,
                Listener::new(move |notice| match notice.kind {
                    NoticeKind::OutOfDate => {
                        o.fetch_add(1, Ordering::SeqCst);
                    }
                    NoticeKind::Changed => {
                        c.fetch_add(1, Ordering::SeqCst);
                    }
                    NoticeKind::ValidityChanged => {}
                }),
            )
            .unwrap();

        scene.set(a_value, 1., None).unwrap();
        assert_eq!(out_of_date.load(Ordering::SeqCst), 1);
        assert_eq!(changed.load(Ordering::SeqCst), 0);
        assert_eq!(scene.settle(), 1);
        assert_eq!(changed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_action_is_rolled_back() {
        let mut scene = Scene::default();
        let n = scene.create_element("N", [counter()]);
        let value = scene.property(n, "value").unwrap();
        let action = from_fn(|cx| {
            let this = cx.this();
            cx.set(this, "value", 9.)?;
            Err(PropertyError::expression("boom"))
        });
        assert!(scene.perform(n, &*action, false, None).is_err());
        assert_eq!(scene.get(value).unwrap(), Value::Number(0.));
    }

    #[test]
    fn stale_handles_are_detected() {
        let mut scene = Scene::default();
        let n = scene.create_element("N", [counter()]);
        let value = scene.property(n, "value").unwrap();
        scene.remove_element(n).unwrap();
        assert!(matches!(scene.get(value), Err(PropertyError::StaleProperty(_))));
        assert!(matches!(
            scene.property(n, "value"),
            Err(PropertyError::StaleElement(_))
        ));
    }
}
