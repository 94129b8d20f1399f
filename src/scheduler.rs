//! The work cycle and the worker thread that runs it.
//!
//! A [`Scheduler`] owns a [`Scene`] and one worker thread. Producers talk to it through a
//! [`SchedulerHandle`], which only ever touches the inbox: the bounded event queue plus the sets
//! of properties and views that need work. The worker drains the inbox one event at a time and
//! runs a full cycle for each: dispatch, settle, animate, post damage, repaint.

use crate::error::Error;
use crate::events::Event;
use crate::queue::EventQueue;
use crate::rect::Rect;
use crate::scene::{NodeId, PropertyId, Scene};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, debug_span, error, trace, warn};

/// What the worker is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    HasWork,
    Draining,
    Settling,
    Painting,
}

/// What one work cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub event_dispatched: bool,
    pub consumed: bool,
    /// Properties recomputed by the settle passes.
    pub settled: usize,
    /// Windows repainted and the bounds of their damage.
    pub painted: Vec<(NodeId, Rect)>,
}

impl Scene {
    /// Runs one work cycle.
    pub fn run_cycle(&mut self, event: Option<Event>) -> CycleReport {
        self.run_cycle_observed(event, &mut |_| ())
    }

    /// Runs one work cycle, reporting each phase as it is entered.
    ///
    /// Damage is only posted once every cascading recomputation has settled, so paint always
    /// sees a consistent state.
    pub fn run_cycle_observed(
        &mut self,
        event: Option<Event>,
        observe: &mut dyn FnMut(Phase),
    ) -> CycleReport {
        self.begin_cycle();
        let _span = debug_span!("cycle", update_time = self.update_time()).entered();
        let mut report = CycleReport::default();

        if let Some(event) = event {
            observe(Phase::Draining);
            report.event_dispatched = true;
            report.consumed = self.dispatch_event(&event);
        }

        observe(Phase::Settling);
        self.progress_transitions();
        report.settled = self.settle();
        self.tick_animations();
        report.settled += self.settle();

        observe(Phase::Painting);
        let needs_paint = std::mem::take(&mut self.needs_paint);
        for node in needs_paint {
            self.post_damage(node);
        }
        for window in self.windows.clone() {
            if let Some(damage) = self.paint_window(window) {
                report.painted.push((window, damage.bounds));
            }
        }

        trace!(settled = report.settled, painted = report.painted.len(), "cycle done");
        report
    }
}

#[derive(Debug)]
struct Inbox {
    queue: EventQueue,
    invalidated: Vec<PropertyId>,
    needs_paint: Vec<NodeId>,
    /// The scene has out-of-date properties or unposted damage.
    scene_work: bool,
    /// The scene has running transitions or animations.
    timed_work: bool,
    pause_requests: usize,
    paused: bool,
    shutdown: bool,
    running: bool,
    phase: Phase,
    cycles: u64,
}

impl Inbox {
    fn has_work(&self) -> bool {
        !self.queue.is_empty()
            || !self.invalidated.is_empty()
            || !self.needs_paint.is_empty()
            || self.scene_work
    }
}

#[derive(Debug)]
struct Shared {
    inbox: Mutex<Inbox>,
    /// Wakes the worker.
    wake: Condvar,
    /// Signals pause, idle and exit transitions of the worker.
    state: Condvar,
    scene: Mutex<Scene>,
    frame_interval: Duration,
}

/// Producer-side access to a running scheduler. Cheap to clone and safe to send across threads.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    fn inbox(&self) -> MutexGuard<'_, Inbox> {
        self.shared.inbox.lock()
    }

    /// Queues an event for the worker.
    ///
    /// Fails if the queue is full (after coalescing) or the worker has shut down.
    pub fn post_event(&self, event: Event) -> Result<(), Error> {
        let mut inbox = self.inbox();
        if inbox.shutdown {
            return Err(Error::WorkerGone);
        }
        if let Err(err) = inbox.queue.push(event) {
            warn!(%err, "dropped event");
            return Err(err);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Marks a property out of date on the next cycle.
    pub fn invalidate(&self, prop: PropertyId) {
        self.inbox().invalidated.push(prop);
        self.shared.wake.notify_one();
    }

    /// Schedules a view for repaint on the next cycle.
    pub fn request_paint(&self, node: NodeId) {
        self.inbox().needs_paint.push(node);
        self.shared.wake.notify_one();
    }

    pub fn phase(&self) -> Phase {
        self.inbox().phase
    }

    /// Number of work cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.inbox().cycles
    }

    pub fn pending_events(&self) -> usize {
        self.inbox().queue.len()
    }

    /// Stops the worker between cycles and hands out the scene until the guard is dropped.
    pub fn pause(&self) -> PauseGuard<'_> {
        {
            let mut inbox = self.inbox();
            inbox.pause_requests += 1;
            self.shared.wake.notify_all();
            while inbox.running && !inbox.paused {
                self.shared.state.wait(&mut inbox);
            }
        }
        PauseGuard {
            handle: self,
            scene: self.shared.scene.lock(),
        }
    }

    /// Blocks until the worker has no work left, or until `timeout` passes. Returns false on
    /// timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inbox = self.inbox();
        loop {
            let idle = inbox.phase == Phase::Idle && !inbox.has_work() && !inbox.timed_work;
            if idle || !inbox.running {
                return idle;
            }
            if self.shared.state.wait_until(&mut inbox, deadline).timed_out() {
                return false;
            }
        }
    }
}

/// Exclusive access to a paused scheduler’s scene.
pub struct PauseGuard<'a> {
    handle: &'a SchedulerHandle,
    scene: MutexGuard<'a, Scene>,
}

impl Deref for PauseGuard<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        &self.scene
    }
}

impl DerefMut for PauseGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        let scene_work = self.scene.has_pending_work();
        let timed_work = self.scene.has_timed_work();
        let mut inbox = self.handle.inbox();
        inbox.pause_requests -= 1;
        inbox.scene_work |= scene_work;
        inbox.timed_work = timed_work;
        self.handle.shared.wake.notify_all();
    }
}

/// Owns the scene and the worker thread.
#[derive(Debug)]
pub struct Scheduler {
    handle: SchedulerHandle,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Moves the scene onto a new worker thread.
    pub fn new(scene: Scene) -> Result<Scheduler, Error> {
        let config = scene.config().clone();
        let inbox = Inbox {
            queue: EventQueue::with_capacity(config.queue_capacity),
            invalidated: Vec::new(),
            needs_paint: Vec::new(),
            scene_work: scene.has_pending_work(),
            timed_work: scene.has_timed_work(),
            pause_requests: 0,
            paused: false,
            shutdown: false,
            running: true,
            phase: Phase::Idle,
            cycles: 0,
        };
        let shared = Arc::new(Shared {
            inbox: Mutex::new(inbox),
            wake: Condvar::new(),
            state: Condvar::new(),
            scene: Mutex::new(scene),
            frame_interval: config.frame_interval(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("tern-worker".into())
            .spawn(move || {
                run_worker(&worker_shared);
                let mut inbox = worker_shared.inbox.lock();
                inbox.running = false;
                inbox.phase = Phase::Idle;
                worker_shared.state.notify_all();
            })?;
        debug!("started worker");

        Ok(Scheduler {
            handle: SchedulerHandle { shared },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stops the worker after its current cycle and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        {
            let mut inbox = self.handle.inbox();
            inbox.shutdown = true;
            self.handle.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Work taken out of the inbox for one cycle.
struct Batch {
    event: Option<Event>,
    invalidated: Vec<PropertyId>,
    needs_paint: Vec<NodeId>,
}

/// Waits for work, honoring pause requests. `None` means shut down.
fn next_batch(shared: &Shared) -> Option<Batch> {
    let mut inbox = shared.inbox.lock();
    loop {
        if inbox.shutdown {
            return None;
        }
        if inbox.pause_requests > 0 {
            if !inbox.paused {
                inbox.paused = true;
                trace!("paused");
                shared.state.notify_all();
            }
            shared.wake.wait(&mut inbox);
            continue;
        }
        inbox.paused = false;

        if inbox.has_work() {
            break;
        }
        if inbox.timed_work {
            inbox.phase = Phase::HasWork;
            if shared
                .wake
                .wait_for(&mut inbox, shared.frame_interval)
                .timed_out()
            {
                break;
            }
            continue;
        }
        inbox.phase = Phase::Idle;
        shared.state.notify_all();
        shared.wake.wait(&mut inbox);
    }

    inbox.phase = Phase::HasWork;
    inbox.scene_work = false;
    Some(Batch {
        event: inbox.queue.pop(),
        invalidated: std::mem::take(&mut inbox.invalidated),
        needs_paint: std::mem::take(&mut inbox.needs_paint),
    })
}

fn run_worker(shared: &Shared) {
    while let Some(batch) = next_batch(shared) {
        let mut scene = shared.scene.lock();
        for prop in batch.invalidated {
            scene.invalidate(prop);
        }
        for node in batch.needs_paint {
            scene.request_paint(node);
        }

        let report = scene.run_cycle_observed(batch.event, &mut |phase| {
            shared.inbox.lock().phase = phase;
        });
        trace!(?report, "worker cycle");

        let scene_work = scene.has_pending_work();
        let timed_work = scene.has_timed_work();
        drop(scene);

        let mut inbox = shared.inbox.lock();
        inbox.scene_work |= scene_work;
        inbox.timed_work = timed_work;
        inbox.cycles += 1;
    }
    debug!("worker stopped");
}
