//! Windows: root views that own a surface, damage, focus and pointer state.

use crate::backend::{Canvas, Surface};
use crate::damage::{Damage, DamageAccumulator};
use crate::error::Error;
use crate::events::{Event, EventKind, FocusDirection, KeyCode};
use crate::rect::Rect;
use crate::scene::{NodeId, Scene};
use crate::view::Layer;
use cgmath::{Point2, Vector2};
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) struct WindowData {
    pub(crate) damage: DamageAccumulator,
    /// Hoisted views, painted in this order after the rest of the tree.
    pub(crate) hoisted: Vec<NodeId>,
    pub(crate) focus: Option<NodeId>,
    /// Last view focused by navigation or the mouse.
    pub(crate) last_focus: Option<NodeId>,
    pub(crate) surface: Option<Arc<Mutex<dyn Surface>>>,
    pub(crate) cursor: Option<Point2<f64>>,
    /// Views under the cursor as of the last pointer event, innermost first.
    pub(crate) under_cursor: Vec<NodeId>,
    /// The view being dragged, if any.
    pub(crate) picked: Option<NodeId>,
}

impl fmt::Debug for WindowData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WindowData")
            .field("damage", &self.damage)
            .field("hoisted", &self.hoisted)
            .field("focus", &self.focus)
            .field("last_focus", &self.last_focus)
            .field("surface", &self.surface.as_ref().map(|_| ".."))
            .field("cursor", &self.cursor)
            .field("under_cursor", &self.under_cursor)
            .field("picked", &self.picked)
            .finish()
    }
}

impl Scene {
    /// Creates a window of the given size. Without a surface the window still tracks damage but
    /// repaints draw nowhere.
    pub fn create_window(
        &mut self,
        size: Vector2<f64>,
        surface: Option<Arc<Mutex<dyn Surface>>>,
    ) -> NodeId {
        let window = self.create_view("Window");
        let damage = DamageAccumulator::new(self.config.cluster_merge_ratio, self.config.max_clusters);
        if let Some(view) = self.view_data_mut(window) {
            view.window = Some(Box::new(WindowData {
                damage,
                hoisted: Vec::new(),
                focus: None,
                last_focus: None,
                surface,
                cursor: None,
                under_cursor: Vec::new(),
                picked: None,
            }));
        }
        self.windows.push(window);
        self.write_internal(window, "width", size.x.into());
        self.write_internal(window, "height", size.y.into());
        self.damage_window(window, Rect::new((0., 0.).into(), size));
        self.request_paint(window);
        debug!(%window, width = size.x, height = size.y, "created window");
        window
    }

    pub fn is_window(&self, node: NodeId) -> bool {
        self.window_data(node).is_some()
    }

    pub fn windows(&self) -> &[NodeId] {
        &self.windows
    }

    fn window_data(&self, window: NodeId) -> Option<&WindowData> {
        self.view_data(window)?.window.as_deref()
    }

    fn window_data_mut(&mut self, window: NodeId) -> Option<&mut WindowData> {
        self.view_data_mut(window)?.window.as_deref_mut()
    }

    fn expect_window(&mut self, window: NodeId) -> Result<&mut WindowData, Error> {
        self.window_data_mut(window).ok_or(Error::NotAWindow(window))
    }

    /// Resizes a window and its surface, damaging the whole new area.
    pub fn resize_window(&mut self, window: NodeId, size: Vector2<f64>) -> Result<(), Error> {
        let surface = self.expect_window(window)?.surface.clone();
        if let Some(surface) = surface {
            surface.lock().resize(size);
        }
        self.write_internal(window, "width", size.x.into());
        self.write_internal(window, "height", size.y.into());
        self.damage_window(window, Rect::new((0., 0.).into(), size));
        self.request_paint(window);
        Ok(())
    }

    pub(crate) fn damage_window(&mut self, window: NodeId, rect: Rect) {
        if let Some(data) = self.window_data_mut(window) {
            data.damage.add(rect);
        }
    }

    /// Window-space damage accumulated since the last repaint.
    pub fn pending_damage(&self, window: NodeId) -> Option<Rect> {
        Some(self.window_data(window)?.damage.bounds()).filter(|r| !r.is_empty())
    }

    /// Clears every window reference into a subtree that is leaving the window.
    pub(crate) fn forget_subtree_in_window(&mut self, window: NodeId, subtree: NodeId) {
        let data = match self.window_data(window) {
            Some(data) => data,
            None => return,
        };
        let inside = |node: &NodeId| self.is_ancestor_of(subtree, *node);
        let focus = data.focus.filter(|n| !inside(n));
        let last_focus = data.last_focus.filter(|n| !inside(n));
        let picked = data.picked.filter(|n| !inside(n));
        let hoisted: Vec<_> = data.hoisted.iter().copied().filter(|n| !inside(n)).collect();
        let under_cursor: Vec<_> = data
            .under_cursor
            .iter()
            .copied()
            .filter(|n| !inside(n))
            .collect();
        let unhoisted: Vec<_> = data.hoisted.iter().copied().filter(inside).collect();

        if let Some(data) = self.window_data_mut(window) {
            data.focus = focus;
            data.last_focus = last_focus;
            data.picked = picked;
            data.hoisted = hoisted;
            data.under_cursor = under_cursor;
        }
        for view in unhoisted {
            if let Some(view) = self.view_data_mut(view) {
                view.hoisted = false;
            }
        }
    }

    // hoisting and picking

    /// Paints a view after the rest of its window, outside its ancestors’ clips.
    pub fn hoist(&mut self, view: NodeId) -> Result<(), Error> {
        let window = self.window_of(view).ok_or(Error::NotAWindow(view))?;
        if view == window || self.is_hoisted(view) {
            return Ok(());
        }
        self.expect_window(window)?.hoisted.push(view);
        if let Some(data) = self.view_data_mut(view) {
            data.hoisted = true;
        }
        self.request_paint(view);
        Ok(())
    }

    pub fn unhoist(&mut self, view: NodeId) -> Result<(), Error> {
        if !self.is_hoisted(view) {
            return Ok(());
        }
        if let Some(window) = self.window_of(view) {
            self.expect_window(window)?.hoisted.retain(|v| *v != view);
        }
        if let Some(data) = self.view_data_mut(view) {
            data.hoisted = false;
        }
        self.request_paint(view);
        Ok(())
    }

    /// Marks a view as being dragged. While picked, the view and its subtree are ignored when
    /// working out what’s under the cursor, and crossings produce drag events.
    pub fn pick(&mut self, view: NodeId) -> Result<(), Error> {
        let window = self.window_of(view).ok_or(Error::NotAWindow(view))?;
        self.expect_window(window)?.picked = Some(view);
        Ok(())
    }

    pub fn unpick(&mut self, window: NodeId) -> Result<(), Error> {
        self.expect_window(window)?.picked = None;
        Ok(())
    }

    pub fn picked(&self, window: NodeId) -> Option<NodeId> {
        self.window_data(window)?.picked
    }

    pub fn cursor(&self, window: NodeId) -> Option<Point2<f64>> {
        self.window_data(window)?.cursor
    }

    // hit testing

    /// The topmost view under a window-space point. Hoisted views are tested first.
    pub fn view_at(&mut self, window: NodeId, point: Point2<f64>) -> Option<NodeId> {
        self.view_at_excluding(window, point, None)
    }

    fn view_at_excluding(
        &mut self,
        window: NodeId,
        point: Point2<f64>,
        exclude: Option<NodeId>,
    ) -> Option<NodeId> {
        let hoisted = self.window_data(window)?.hoisted.clone();
        for view in hoisted.into_iter().rev() {
            if Some(view) == exclude || !self.is_shown(view) {
                continue;
            }
            if let Some(hit) = self.hit_test(view, point, exclude) {
                return Some(hit);
            }
        }
        self.hit_test(window, point, exclude)
    }

    fn hit_test(&mut self, view: NodeId, point: Point2<f64>, exclude: Option<NodeId>) -> Option<NodeId> {
        if Some(view) == exclude || self.visible_flag(view, "hidden") {
            return None;
        }
        let frame = self.frame_in_window(view)?;
        let inside = frame.contains(point);
        if !inside && (self.clips(view) || self.parent(view).is_none()) {
            return None;
        }
        for child in self.children(view).to_vec().into_iter().rev() {
            if self.is_hoisted(child) {
                continue;
            }
            if let Some(hit) = self.hit_test(child, point, exclude) {
                return Some(hit);
            }
        }
        Some(view).filter(|_| inside)
    }

    // painting

    /// Repaints a window’s damaged clusters onto its surface and presents them.
    ///
    /// Returns the damage that was repainted, or `None` if there was none. The surface stays
    /// locked for the whole repaint.
    pub fn paint_window(&mut self, window: NodeId) -> Option<Damage> {
        let data = self.window_data_mut(window)?;
        let damage = data.damage.take()?;
        let surface = match data.surface.clone() {
            Some(surface) => surface,
            None => return Some(damage),
        };
        let hoisted = data.hoisted.clone();

        let mut surface = surface.lock();
        for cluster in &damage.clusters {
            {
                let canvas = surface.canvas();
                canvas.save();
                canvas.clip(*cluster);
                self.paint_view(window, canvas, *cluster);
                for view in &hoisted {
                    if self.is_shown(*view) {
                        self.paint_view(*view, canvas, *cluster);
                    }
                }
                canvas.restore();
            }
            surface.present(*cluster);
        }
        trace!(%window, clusters = damage.clusters.len(), "painted window");
        Some(damage)
    }

    fn paint_view(&mut self, node: NodeId, canvas: &mut dyn Canvas, cluster: Rect) {
        if self.visible_flag(node, "hidden") {
            return;
        }
        let (transform, frame_size, content_size, content_to_frame) = match (
            self.global_transform(node),
            self.frame_size(node),
            self.content_size(node),
            self.content_to_frame(node),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => return,
        };
        let (background, content, foreground, children, painted) = match self.view_data(node) {
            Some(view) => (
                view.layer(Layer::Background).clone(),
                view.layer(Layer::Content).clone(),
                view.layer(Layer::Foreground).clone(),
                view.children.clone(),
                view.painted,
            ),
            None => return,
        };
        let own = painted.intersects(cluster);

        if own {
            canvas.set_transform(transform);
            for paint in &background {
                paint.paint(canvas, frame_size);
            }
            canvas.set_transform(transform * content_to_frame);
            for paint in &content {
                paint.paint(canvas, content_size);
            }
        }

        let clips = self.clips(node);
        if clips {
            canvas.save();
            canvas.clip(Rect::new((0., 0.).into(), frame_size).transform(&transform));
        }
        for child in children {
            if !self.is_hoisted(child) {
                self.paint_view(child, canvas, cluster);
            }
        }
        if clips {
            canvas.restore();
        }

        if own && !foreground.is_empty() {
            canvas.set_transform(transform);
            for paint in &foreground {
                paint.paint(canvas, frame_size);
            }
        }
    }

    // dispatch

    /// Routes an input event to its target view and bubbles it up until a behavior consumes it.
    ///
    /// Events without a window go to the first window. Returns true if the event was consumed.
    pub fn dispatch_event(&mut self, event: &Event) -> bool {
        let window = match event.window.or_else(|| self.windows.first().copied()) {
            Some(window) if self.is_window(window) => window,
            _ => {
                debug!(kind = ?event.kind, "dropped event without a window");
                return false;
            }
        };
        let mut event = event.clone();
        event.window = Some(window);

        let consumed = self.route_event(window, &event);
        // the event may have changed the tree under a still cursor
        self.update_adjacency(window);
        consumed
    }

    fn route_event(&mut self, window: NodeId, event: &Event) -> bool {
        match event.kind {
            kind if kind.is_keyboard() => {
                let target = self.focus(window).unwrap_or(window);
                let consumed = self.bubble(target, event);
                if !consumed && kind == EventKind::KeyPressed && event.key == Some(KeyCode::Tab) {
                    let backwards = event.modifiers.map_or(false, |m| m.shift);
                    return if backwards {
                        self.focus_previous(window)
                    } else {
                        self.focus_next(window)
                    };
                }
                consumed
            }
            kind if kind.is_pointer() => {
                let location = match event.location {
                    Some(location) => location,
                    None => return self.bubble(window, event),
                };
                if let Some(data) = self.window_data_mut(window) {
                    data.cursor = Some(location);
                }
                let target = self.view_at(window, location).unwrap_or(window);
                if kind == EventKind::MousePressed && self.accepts_focus(target) {
                    self.focus_view(target, FocusDirection::Mouse);
                }
                self.bubble(target, event)
            }
            EventKind::WindowResized => {
                if let Some(size) = event.size {
                    if let Err(err) = self.resize_window(window, size) {
                        debug!(%err, "resize failed");
                    }
                }
                self.bubble(window, event)
            }
            _ => self.bubble(window, event),
        }
    }

    /// Offers an event to a view and then to each ancestor in turn.
    fn bubble(&mut self, target: NodeId, event: &Event) -> bool {
        self.ancestors(target)
            .into_iter()
            .any(|view| self.react_to(view, event))
    }

    /// Sends enter and exit events for the views the cursor crossed since the last update.
    fn update_adjacency(&mut self, window: NodeId) {
        let (cursor, picked) = match self.window_data(window) {
            Some(data) => (data.cursor, data.picked),
            None => return,
        };
        let under = match cursor {
            Some(point) => match self.view_at_excluding(window, point, picked) {
                Some(hit) => self.ancestors(hit),
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        let previous = match self.window_data_mut(window) {
            Some(data) => std::mem::replace(&mut data.under_cursor, under.clone()),
            None => return,
        };

        let (exit, enter) = match picked {
            Some(_) => (EventKind::DraggedOut, EventKind::DraggedIn),
            None => (EventKind::Exited, EventKind::Entered),
        };
        for view in previous.iter().filter(|v| !under.contains(v)) {
            if self.contains(*view) {
                let event = Event {
                    window: Some(window),
                    location: cursor,
                    ..Event::new(exit)
                };
                self.react_to(*view, &event);
            }
        }
        for view in under.iter().rev().filter(|v| !previous.contains(v)) {
            let event = Event {
                window: Some(window),
                location: cursor,
                ..Event::new(enter)
            };
            self.react_to(*view, &event);
        }
    }

    /// Views under the cursor of a window, innermost first.
    pub fn views_under_cursor(&self, window: NodeId) -> &[NodeId] {
        self.window_data(window)
            .map_or(&[][..], |data| data.under_cursor.as_slice())
    }

    // focus

    pub fn focus(&self, window: NodeId) -> Option<NodeId> {
        self.window_data(window)?.focus
    }

    pub fn last_focus(&self, window: NodeId) -> Option<NodeId> {
        self.window_data(window)?.last_focus
    }

    fn accepts_focus(&mut self, view: NodeId) -> bool {
        self.visible_flag(view, "focusable") && self.is_enabled(view) && self.is_shown(view)
    }

    /// Moves keyboard focus to a view, sending `FocusLost` to the old focus and `FocusGained` to
    /// the new one. Returns false if the view isn’t in a window.
    ///
    /// Focus changes made with [`FocusDirection::Internal`] don’t update the last focus.
    pub fn focus_view(&mut self, view: NodeId, direction: FocusDirection) -> bool {
        let window = match self.window_of(view) {
            Some(window) => window,
            None => return false,
        };
        let old = match self.window_data_mut(window) {
            Some(data) => {
                if data.focus == Some(view) {
                    return true;
                }
                if direction != FocusDirection::Internal {
                    data.last_focus = Some(view);
                }
                data.focus.replace(view)
            }
            None => return false,
        };
        trace!(%view, ?direction, "focus");

        let mut lost = Event::new(EventKind::FocusLost).with_window(window);
        lost.focus_direction = Some(direction);
        let mut gained = Event::new(EventKind::FocusGained).with_window(window);
        gained.focus_direction = Some(direction);
        if let Some(old) = old {
            self.react_to(old, &lost);
            self.request_paint(old);
        }
        self.react_to(view, &gained);
        self.request_paint(view);
        true
    }

    /// Clears the window’s focus.
    pub fn unfocus(&mut self, window: NodeId) {
        let old = match self.window_data_mut(window) {
            Some(data) => data.focus.take(),
            None => return,
        };
        if let Some(old) = old {
            let mut lost = Event::new(EventKind::FocusLost).with_window(window);
            lost.focus_direction = Some(FocusDirection::Internal);
            self.react_to(old, &lost);
            self.request_paint(old);
        }
    }

    /// Focusable views of a window in depth-first order, skipping hidden subtrees.
    pub fn focus_order(&mut self, window: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![window];
        while let Some(view) = pending.pop() {
            if self.visible_flag(view, "hidden") {
                continue;
            }
            if self.visible_flag(view, "focusable") && self.is_enabled(view) {
                out.push(view);
            }
            pending.extend(self.children(view).iter().rev().copied());
        }
        out
    }

    fn focus_step(&mut self, window: NodeId, forward: bool) -> bool {
        let order = self.focus_order(window);
        if order.is_empty() {
            return false;
        }
        let current = self
            .focus(window)
            .and_then(|f| order.iter().position(|v| *v == f));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % order.len(),
            (Some(i), false) => (i + order.len() - 1) % order.len(),
            (None, true) => 0,
            (None, false) => order.len() - 1,
        };
        let direction = if forward {
            FocusDirection::Next
        } else {
            FocusDirection::Previous
        };
        self.focus_view(order[next], direction)
    }

    /// Moves focus to the next focusable view, wrapping around.
    pub fn focus_next(&mut self, window: NodeId) -> bool {
        self.focus_step(window, true)
    }

    pub fn focus_previous(&mut self, window: NodeId) -> bool {
        self.focus_step(window, false)
    }

    fn focus_vertical(&mut self, window: NodeId, above: bool) -> bool {
        let current = match self.focus(window).and_then(|f| self.frame_in_window(f)) {
            Some(frame) => frame.center().y,
            None => return false,
        };
        let mut best: Option<(NodeId, f64)> = None;
        for view in self.focus_order(window) {
            let y = match self.frame_in_window(view) {
                Some(frame) => frame.center().y,
                None => continue,
            };
            let distance = if above { current - y } else { y - current };
            if distance > 0. && best.map_or(true, |(_, d)| distance < d) {
                best = Some((view, distance));
            }
        }
        let direction = if above {
            FocusDirection::Above
        } else {
            FocusDirection::Below
        };
        match best {
            Some((view, _)) => self.focus_view(view, direction),
            None => false,
        }
    }

    /// Moves focus to the nearest focusable view above the current one.
    pub fn focus_above(&mut self, window: NodeId) -> bool {
        self.focus_vertical(window, true)
    }

    pub fn focus_below(&mut self, window: NodeId) -> bool {
        self.focus_vertical(window, false)
    }
}
