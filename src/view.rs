//! Views: elements with geometry, children, paint layers and behaviors.
//!
//! Geometry is ordinary properties. Every view has the following, all numbers unless noted:
//!
//! - `left`, `top`: frame origin in the parent’s content coordinates (default 0)
//! - `width`, `height`: content size; by default the furthest child edge plus `h_pad`/`v_pad`
//! - `scale`: content scale (default 1)
//! - `right`, `bottom`: `left + width * scale` and `top + height * scale`
//! - `h_pad`, `v_pad`, `scroll_x`, `scroll_y` (default 0)
//! - `hidden`, `enabled`, `clips`, `focusable`: booleans
//! - `parent` (element or nil) and `children` (list of elements), maintained by the tree
//!   operations and read-only otherwise
//!
//! The frame of a view is its `(0, 0, width * scale, height * scale)` rectangle; background and
//! foreground paints draw in it. Content paints and children live in the content coordinate
//! system, which is scaled by `scale` and offset by the scroll origin.

use crate::behavior::Behavior;
use crate::declaration::{DeclFlags, Declaration};
use crate::error::{Error, TreeError};
use crate::expr::Expr;
use crate::paint::Paint;
use crate::rect::{scaling, translation, Rect};
use crate::scene::{NodeId, Scene};
use crate::value::{Value, ValueType};
use crate::window::WindowData;
use cgmath::{Matrix3, SquareMatrix, Vector2};
use std::sync::{Arc, OnceLock};

/// Paint layers, in painting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Background,
    Content,
    Foreground,
}

#[derive(Debug, Default)]
pub(crate) struct ViewData {
    pub(crate) parent: Option<NodeId>,
    /// Authoritative; the `children` property mirrors it.
    pub(crate) children: Vec<NodeId>,
    pub(crate) background: Vec<Arc<dyn Paint>>,
    pub(crate) content: Vec<Arc<dyn Paint>>,
    pub(crate) foreground: Vec<Arc<dyn Paint>>,
    pub(crate) behaviors: Vec<Arc<Behavior>>,
    /// Painted last and unclipped by ancestors.
    pub(crate) hoisted: bool,
    /// Update time of the last `post_damage`.
    pub(crate) last_damaged: Option<u64>,
    /// Window-space bounds as of the last `post_damage`.
    pub(crate) painted: Rect,
    pub(crate) window: Option<Box<WindowData>>,
}

impl ViewData {
    pub(crate) fn layer(&self, layer: Layer) -> &Vec<Arc<dyn Paint>> {
        match layer {
            Layer::Background => &self.background,
            Layer::Content => &self.content,
            Layer::Foreground => &self.foreground,
        }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut Vec<Arc<dyn Paint>> {
        match layer {
            Layer::Background => &mut self.background,
            Layer::Content => &mut self.content,
            Layer::Foreground => &mut self.foreground,
        }
    }
}

/// The declarations every view starts out with.
pub fn view_declarations() -> &'static [Arc<Declaration>] {
    static DECLARATIONS: OnceLock<Vec<Arc<Declaration>>> = OnceLock::new();
    DECLARATIONS.get_or_init(|| {
        let geometry = |name: &str, default: Expr| {
            Arc::new(Declaration::new(name, ValueType::Number, default).affects_paint())
        };
        let internal = DeclFlags::INTERNAL | DeclFlags::AFFECTS_PAINT;
        vec![
            geometry("left", Expr::from(0.)),
            geometry("top", Expr::from(0.)),
            geometry("scale", Expr::from(1.)),
            geometry("h_pad", Expr::from(0.)),
            geometry("v_pad", Expr::from(0.)),
            geometry("scroll_x", Expr::from(0.)),
            geometry("scroll_y", Expr::from(0.)),
            geometry(
                "width",
                Expr::max_of_children("right") + Expr::this("h_pad"),
            ),
            geometry(
                "height",
                Expr::max_of_children("bottom") + Expr::this("v_pad"),
            ),
            geometry(
                "right",
                Expr::this("left") + Expr::this("width") * Expr::this("scale"),
            ),
            geometry(
                "bottom",
                Expr::this("top") + Expr::this("height") * Expr::this("scale"),
            ),
            Arc::new(Declaration::value("hidden", false).affects_paint()),
            Arc::new(Declaration::value("enabled", true)),
            Arc::new(Declaration::value("clips", false).affects_paint()),
            Arc::new(Declaration::value("focusable", false)),
            Arc::new(
                Declaration::new("parent", ValueType::Element, Value::Nil).with_flags(internal),
            ),
            Arc::new(
                Declaration::new("children", ValueType::List, Value::element_list(None))
                    .with_flags(internal),
            ),
        ]
    })
}

impl Scene {
    /// Creates an orphan view.
    pub fn create_view(&mut self, type_name: &str) -> NodeId {
        let node = self.create_element(type_name, view_declarations().iter().cloned());
        if let Some(element) = self.elements.get_mut(node.0) {
            element.view = Some(ViewData::default());
        }
        node
    }

    pub fn is_view(&self, node: NodeId) -> bool {
        self.view_data(node).is_some()
    }

    pub(crate) fn view_data(&self, node: NodeId) -> Option<&ViewData> {
        self.elements.get(node.0)?.view.as_ref()
    }

    pub(crate) fn view_data_mut(&mut self, node: NodeId) -> Option<&mut ViewData> {
        self.elements.get_mut(node.0)?.view.as_mut()
    }

    fn expect_view(&self, node: NodeId) -> Result<&ViewData, TreeError> {
        self.view_data(node).ok_or(TreeError::NotAView(node))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.view_data(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.view_data(node).map_or(&[][..], |v| v.children.as_slice())
    }

    /// The view itself and its ancestors, innermost first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(node).filter(|n| self.is_view(*n));
        while let Some(view) = current {
            out.push(view);
            current = self.parent(view);
        }
        out
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(view) = current {
            if view == ancestor {
                return true;
            }
            current = self.parent(view);
        }
        false
    }

    /// The window at the root of the view’s tree.
    pub fn window_of(&self, node: NodeId) -> Option<NodeId> {
        let root = *self.ancestors(node).last()?;
        self.view_data(root)?.window.as_ref().map(|_| root)
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.window_of(node).is_some()
    }

    /// Inserts an orphan view at `index` (or at the end).
    ///
    /// Fails without touching either tree if the child already has a parent or if it is the
    /// parent or one of its ancestors.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: Option<usize>,
    ) -> Result<(), Error> {
        let len = self.expect_view(parent)?.children.len();
        let child_view = self.expect_view(child)?;
        if child_view.parent.is_some() {
            return Err(TreeError::AlreadyParented { child }.into());
        }
        if child_view.window.is_some() || self.is_ancestor_of(child, parent) {
            return Err(TreeError::InsertIntoSelf { parent, child }.into());
        }
        let index = index.unwrap_or(len);
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len }.into());
        }

        if let Some(view) = self.view_data_mut(parent) {
            view.children.insert(index, child);
        }
        if let Some(view) = self.view_data_mut(child) {
            view.parent = Some(parent);
        }
        self.sync_tree_properties(parent);
        self.sync_tree_properties(child);
        self.request_paint(child);
        Ok(())
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.insert_child(parent, child, None)
    }

    /// Detaches a child, damaging the area it covered.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.expect_view(parent)?;
        if self.expect_view(child)?.parent != Some(parent) {
            return Err(TreeError::NotAChild { parent, child }.into());
        }

        self.erase(child);
        if let Some(window) = self.window_of(parent) {
            self.forget_subtree_in_window(window, child);
        }
        if let Some(view) = self.view_data_mut(parent) {
            view.children.retain(|c| *c != child);
        }
        if let Some(view) = self.view_data_mut(child) {
            view.parent = None;
        }
        self.sync_tree_properties(parent);
        self.sync_tree_properties(child);
        Ok(())
    }

    /// Detaches a view from its parent, if it has one.
    pub fn detach(&mut self, child: NodeId) -> Result<(), Error> {
        match self.parent(child) {
            Some(parent) => self.remove_child(parent, child),
            None => Ok(()),
        }
    }

    /// Replaces the children of `parent`.
    ///
    /// Every new child must be a current child or an orphan. Current children not in the list are
    /// detached.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<(), Error> {
        self.expect_view(parent)?;
        for (i, child) in children.iter().enumerate() {
            let view = self.expect_view(*child)?;
            if view.parent.is_some() && view.parent != Some(parent) {
                return Err(TreeError::AlreadyParented { child: *child }.into());
            }
            if view.window.is_some()
                || self.is_ancestor_of(*child, parent)
                || children[..i].contains(child)
            {
                return Err(TreeError::InsertIntoSelf {
                    parent,
                    child: *child,
                }
                .into());
            }
        }

        let removed: Vec<_> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|c| !children.contains(c))
            .collect();
        for child in removed {
            self.remove_child(parent, child)?;
        }

        for child in &children {
            if let Some(view) = self.view_data_mut(*child) {
                view.parent = Some(parent);
            }
            self.sync_tree_properties(*child);
        }
        if let Some(view) = self.view_data_mut(parent) {
            view.children = children;
        }
        self.sync_tree_properties(parent);
        self.request_paint(parent);
        Ok(())
    }

    fn sync_tree_properties(&mut self, node: NodeId) {
        let (parent, children) = match self.view_data(node) {
            Some(view) => (
                view.parent.map_or(Value::Nil, Value::Element),
                Value::element_list(view.children.iter().copied()),
            ),
            None => return,
        };
        self.write_internal(node, "parent", parent);
        self.write_internal(node, "children", children);
    }

    /// Drops window references to a view that is being freed.
    pub(crate) fn forget_view(&mut self, node: NodeId) {
        if let Some(window) = self.window_of(node) {
            self.forget_subtree_in_window(window, node);
        }
        self.windows.retain(|w| *w != node);
    }

    pub fn add_paint(&mut self, node: NodeId, layer: Layer, paint: Arc<dyn Paint>) -> Result<(), Error> {
        self.view_data_mut(node)
            .ok_or(TreeError::NotAView(node))?
            .layer_mut(layer)
            .push(paint);
        self.request_paint(node);
        Ok(())
    }

    pub fn clear_paints(&mut self, node: NodeId, layer: Layer) -> Result<(), Error> {
        self.view_data_mut(node)
            .ok_or(TreeError::NotAView(node))?
            .layer_mut(layer)
            .clear();
        self.request_paint(node);
        Ok(())
    }

    pub fn add_behavior(&mut self, node: NodeId, behavior: Behavior) -> Result<(), Error> {
        self.view_data_mut(node)
            .ok_or(TreeError::NotAView(node))?
            .behaviors
            .push(Arc::new(behavior));
        Ok(())
    }

    // geometry

    pub(crate) fn visible_number(&mut self, node: NodeId, name: &str) -> Option<f64> {
        self.visible_named(node, name).ok()?.as_number()
    }

    pub(crate) fn visible_flag(&mut self, node: NodeId, name: &str) -> bool {
        self.visible_named(node, name)
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    /// True if neither the view nor any ancestor is hidden.
    pub fn is_shown(&mut self, node: NodeId) -> bool {
        self.ancestors(node)
            .into_iter()
            .all(|view| !self.visible_flag(view, "hidden"))
    }

    pub fn is_enabled(&mut self, node: NodeId) -> bool {
        self.get_named(node, "enabled")
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    pub fn is_hoisted(&self, node: NodeId) -> bool {
        self.view_data(node).map_or(false, |v| v.hoisted)
    }

    pub(crate) fn clips(&mut self, node: NodeId) -> bool {
        self.visible_flag(node, "clips")
    }

    /// Visible content size (`width`, `height`).
    pub fn content_size(&mut self, node: NodeId) -> Option<Vector2<f64>> {
        Some(Vector2::new(
            self.visible_number(node, "width")?,
            self.visible_number(node, "height")?,
        ))
    }

    /// Visible frame size: the content size times `scale`.
    pub fn frame_size(&mut self, node: NodeId) -> Option<Vector2<f64>> {
        let scale = self.visible_number(node, "scale")?;
        Some(self.content_size(node)? * scale)
    }

    /// Maps frame coordinates to window coordinates. `None` if the view isn’t attached to a
    /// window or its geometry can’t be evaluated.
    pub fn global_transform(&mut self, node: NodeId) -> Option<Matrix3<f64>> {
        match self.parent(node) {
            None => {
                self.view_data(node)?.window.as_ref()?;
                Some(Matrix3::identity())
            }
            Some(parent) => {
                let content = self.content_transform(parent)?;
                let left = self.visible_number(node, "left")?;
                let top = self.visible_number(node, "top")?;
                Some(content * translation(left, top))
            }
        }
    }

    /// Maps content coordinates to frame coordinates.
    pub(crate) fn content_to_frame(&mut self, node: NodeId) -> Option<Matrix3<f64>> {
        let scale = self.visible_number(node, "scale")?;
        let scroll_x = self.visible_number(node, "scroll_x")?;
        let scroll_y = self.visible_number(node, "scroll_y")?;
        Some(scaling(scale) * translation(-scroll_x, -scroll_y))
    }

    /// Maps content coordinates to window coordinates.
    pub fn content_transform(&mut self, node: NodeId) -> Option<Matrix3<f64>> {
        Some(self.global_transform(node)? * self.content_to_frame(node)?)
    }

    /// The view’s frame in window coordinates.
    pub fn frame_in_window(&mut self, node: NodeId) -> Option<Rect> {
        let size = self.frame_size(node)?;
        let transform = self.global_transform(node)?;
        Some(Rect::new((0., 0.).into(), size).transform(&transform))
    }

    /// The window-space rectangle the view’s content is clipped to; `None` means unclipped.
    pub fn visible_clip(&mut self, node: NodeId) -> Option<Rect> {
        let own = if self.clips(node) || self.parent(node).is_none() {
            Some(self.frame_in_window(node).unwrap_or_default())
        } else {
            None
        };
        let inherited = match self.parent(node) {
            Some(parent) if !self.is_hoisted(node) => self.visible_clip(parent),
            _ => None,
        };
        match (own, inherited) {
            (Some(own), Some(inherited)) => Some(own.intersect(inherited).unwrap_or_default()),
            (own, inherited) => own.or(inherited),
        }
    }

    /// The window-space area the view’s own paints cover, clipped by its ancestors.
    ///
    /// Empty if the view is hidden or its transform is unavailable. Children are not included.
    pub fn compute_painted_boundaries(&mut self, node: NodeId) -> Rect {
        if !self.is_shown(node) {
            return Rect::zero();
        }
        let transform = match self.global_transform(node) {
            Some(transform) => transform,
            None => return Rect::zero(),
        };
        let (frame_size, content_size, content_to_frame) = match (
            self.frame_size(node),
            self.content_size(node),
            self.content_to_frame(node),
        ) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Rect::zero(),
        };
        let (frame_paints, content_paints): (Vec<_>, Vec<_>) = match self.view_data(node) {
            Some(view) => (
                view.layer(Layer::Background)
                    .iter()
                    .chain(view.layer(Layer::Foreground))
                    .cloned()
                    .collect(),
                view.layer(Layer::Content).clone(),
            ),
            None => return Rect::zero(),
        };

        let mut local = Rect::zero();
        for paint in &frame_paints {
            local = local.union(paint.bounds(frame_size));
        }
        for paint in &content_paints {
            local = local.union(paint.bounds(content_size).transform(&content_to_frame));
        }

        let bounds = local.transform(&transform);
        match self.parent(node) {
            Some(parent) if !self.is_hoisted(node) => match self.visible_clip(parent) {
                Some(clip) => bounds.intersect(clip).unwrap_or_default(),
                None => bounds,
            },
            _ => bounds,
        }
    }

    /// Damages the union of the view’s previous and current painted area, then does the same for
    /// every child. Does nothing if the view was already damaged this cycle.
    pub fn post_damage(&mut self, node: NodeId) {
        let stamp = self.update_time;
        match self.view_data_mut(node) {
            Some(view) if view.last_damaged != Some(stamp) => view.last_damaged = Some(stamp),
            _ => return,
        }

        let bounds = self.compute_painted_boundaries(node);
        let old = match self.view_data_mut(node) {
            Some(view) => std::mem::replace(&mut view.painted, bounds),
            None => return,
        };
        if let Some(window) = self.window_of(node) {
            self.damage_window(window, old.union(bounds));
        }

        for child in self.children(node).to_vec() {
            self.post_damage(child);
        }
    }

    /// Damages the area painted by a subtree that is about to leave its window.
    fn erase(&mut self, node: NodeId) {
        let window = match self.window_of(node) {
            Some(window) => window,
            None => return,
        };
        let mut pending = vec![node];
        while let Some(view) = pending.pop() {
            let painted = match self.view_data_mut(view) {
                Some(data) => {
                    data.last_damaged = None;
                    std::mem::take(&mut data.painted)
                }
                None => continue,
            };
            self.damage_window(window, painted);
            pending.extend(self.children(view).iter().copied());
        }
    }

    /// Window-space bounds recorded by the last `post_damage`.
    pub fn painted_bounds(&self, node: NodeId) -> Rect {
        self.view_data(node).map_or(Rect::zero(), |v| v.painted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn width_follows_children() {
        let mut scene = Scene::default();
        let a = scene.create_view("A");
        let b = scene.create_view("B");
        scene.add_child(a, b).unwrap();
        let a_width = scene.property(a, "width").unwrap();
        let b_width = scene.property(b, "width").unwrap();
        scene.define(a_width, Expr::child(0, "width") + 10.).unwrap();

        scene.set(b_width, 20., None).unwrap();
        assert_eq!(scene.get(a_width).unwrap(), Value::Number(30.));
        let evaluations = scene.evaluations(a_width);

        scene.set(b_width, 40., None).unwrap();
        assert_eq!(scene.evaluations(a_width), evaluations);
        assert_eq!(scene.get(a_width).unwrap(), Value::Number(50.));
        assert_eq!(scene.evaluations(a_width), evaluations + 1);
    }

    #[test]
    fn default_size_wraps_children() {
        let mut scene = Scene::default();
        let parent = scene.create_view("P");
        let child = scene.create_view("C");
        scene.add_child(parent, child).unwrap();
        scene.set_named(child, "left", 5., None).unwrap();
        scene.set_named(child, "width", 10., None).unwrap();
        scene.set_named(child, "scale", 2., None).unwrap();
        scene.set_named(parent, "h_pad", 1., None).unwrap();
        assert_eq!(scene.number(parent, "width").unwrap(), 26.);
    }

    #[test]
    fn insertion_requires_an_orphan() {
        let mut scene = Scene::default();
        let a = scene.create_view("A");
        let b = scene.create_view("B");
        let c = scene.create_view("C");
        scene.add_child(a, c).unwrap();

        assert!(matches!(
            scene.add_child(b, c),
            Err(Error::Tree(TreeError::AlreadyParented { .. }))
        ));
        assert_eq!(scene.children(a), &[c]);
        assert!(scene.children(b).is_empty());
        assert_eq!(scene.parent(c), Some(a));

        assert!(matches!(
            scene.add_child(c, a),
            Err(Error::Tree(TreeError::InsertIntoSelf { .. }))
        ));
        assert!(matches!(
            scene.add_child(a, a),
            Err(Error::Tree(TreeError::InsertIntoSelf { .. }))
        ));
    }

    #[test]
    fn parent_is_read_only() {
        let mut scene = Scene::default();
        let a = scene.create_view("A");
        let b = scene.create_view("B");
        assert!(scene.set_named(b, "parent", a, None).is_err());
        scene.add_child(a, b).unwrap();
        assert_eq!(scene.get_named(b, "parent").unwrap(), Value::Element(a));
    }

    #[test]
    fn set_children_reorders_and_detaches() {
        let mut scene = Scene::default();
        let p = scene.create_view("P");
        let a = scene.create_view("A");
        let b = scene.create_view("B");
        let c = scene.create_view("C");
        scene.add_child(p, a).unwrap();
        scene.add_child(p, b).unwrap();
        scene.set_children(p, vec![c, a]).unwrap();
        assert_eq!(scene.children(p), &[c, a]);
        assert_eq!(scene.parent(b), None);
        assert_eq!(scene.parent(c), Some(p));
    }
}
