use crate::events::{Event, EventKind, KeyCode, KeyModifiers, MouseButton};
use crate::scheduler::SchedulerHandle;
use crate::scene::NodeId;
use cgmath::{Point2, Vector2};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use tracing::{debug, warn};

/// Input as delivered by a native windowing backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    KeyDown {
        window: NodeId,
        key: Option<KeyCode>,
        modifiers: KeyModifiers,
        /// The character the key produced, if any.
        character: Option<char>,
    },
    KeyUp {
        window: NodeId,
        key: Option<KeyCode>,
        modifiers: KeyModifiers,
    },
    PointerDown {
        window: NodeId,
        location: Point2<f64>,
        button: MouseButton,
    },
    PointerUp {
        window: NodeId,
        location: Point2<f64>,
        button: MouseButton,
    },
    PointerMove {
        window: NodeId,
        location: Point2<f64>,
    },
    Scroll {
        window: NodeId,
        location: Point2<f64>,
        delta: Vector2<f64>,
    },
    Resize {
        window: NodeId,
        size: Vector2<f64>,
    },
    Close {
        window: NodeId,
    },
}

/// Connects a native backend to a scheduler.
///
/// The backend sends [`RawEvent`]s into the channel returned by [`Host::new`] from whatever
/// thread it likes; the host turns them into [`Event`]s and posts them to the worker. Resizes are
/// applied synchronously, with the worker paused, so the backend can present a correctly sized
/// frame before returning from its resize callback.
#[derive(Debug)]
pub struct Host {
    scheduler: SchedulerHandle,
    event_recv: Receiver<RawEvent>,
    /// Buttons currently held, for telling drags from moves.
    buttons: Vec<MouseButton>,
}

impl Host {
    /// Creates a new host and the sender the backend should deliver raw events to.
    pub fn new(scheduler: SchedulerHandle) -> (Host, Sender<RawEvent>) {
        let (event_sender, event_recv) = channel::unbounded();
        let host = Host {
            scheduler,
            event_recv,
            buttons: Vec::new(),
        };
        (host, event_sender)
    }

    /// Handles every raw event received so far. Returns false once every sender is gone.
    pub fn poll(&mut self) -> bool {
        loop {
            match self.event_recv.try_recv() {
                Ok(event) => self.recv_raw_event(event),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Handles raw events until every sender is gone.
    pub fn run(&mut self) {
        while let Ok(event) = self.event_recv.recv() {
            self.recv_raw_event(event);
        }
        debug!("event senders disconnected");
    }

    fn recv_raw_event(&mut self, event: RawEvent) {
        match event {
            RawEvent::Resize { window, size } => self.resize(window, size),
            event => {
                for event in self.translate(event) {
                    // overflow is already logged by the scheduler
                    let _ = self.scheduler.post_event(event);
                }
            }
        }
    }

    /// Turns a raw event into the events it stands for.
    pub fn translate(&mut self, event: RawEvent) -> Vec<Event> {
        match event {
            RawEvent::KeyDown {
                window,
                key,
                modifiers,
                character,
            } => {
                let mut events = Vec::with_capacity(2);
                if key.is_some() {
                    events.push(Event {
                        key,
                        character,
                        ..Event::new(EventKind::KeyPressed)
                    });
                }
                if let Some(character) = character {
                    events.push(Event::key_typed(character));
                }
                events
                    .into_iter()
                    .map(|e| e.with_window(window).with_modifiers(modifiers))
                    .collect()
            }
            RawEvent::KeyUp {
                window,
                key,
                modifiers,
            } => vec![Event {
                key,
                ..Event::new(EventKind::KeyReleased)
            }
            .with_window(window)
            .with_modifiers(modifiers)],
            RawEvent::PointerDown {
                window,
                location,
                button,
            } => {
                if !self.buttons.contains(&button) {
                    self.buttons.push(button);
                }
                vec![Event::mouse_pressed(location, button).with_window(window)]
            }
            RawEvent::PointerUp {
                window,
                location,
                button,
            } => {
                self.buttons.retain(|b| *b != button);
                vec![Event::mouse_released(location, button).with_window(window)]
            }
            RawEvent::PointerMove { window, location } => {
                let event = match self.buttons.first() {
                    Some(button) => Event {
                        button: Some(*button),
                        ..Event::mouse_dragged(location)
                    },
                    None => Event::mouse_moved(location),
                };
                vec![event.with_window(window)]
            }
            RawEvent::Scroll {
                window,
                location,
                delta,
            } => vec![Event {
                location: Some(location),
                delta: Some(delta),
                ..Event::new(EventKind::MouseWheel)
            }
            .with_window(window)],
            RawEvent::Resize { window, size } => vec![Event::resized(window, size)],
            RawEvent::Close { window } => {
                vec![Event::new(EventKind::WindowClosed).with_window(window)]
            }
        }
    }

    /// Resizes a window with the worker paused, then repaints it straight away.
    fn resize(&mut self, window: NodeId, size: Vector2<f64>) {
        let mut scene = self.scheduler.pause();
        if let Err(err) = scene.resize_window(window, size) {
            warn!(%window, %err, "resize failed");
            return;
        }
        let event = Event::resized(window, size);
        scene.run_cycle(Some(event));
    }
}
