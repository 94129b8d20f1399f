//! The bounded event queue.

use crate::error::Error;
use crate::events::Event;

/// A fixed-capacity circular buffer of pending events.
///
/// Not synchronized by itself; the scheduler keeps it behind its inbox lock.
#[derive(Debug)]
pub struct EventQueue {
    slots: Box<[Option<Event>]>,
    head: usize,
    len: usize,
}

impl EventQueue {
    /// # Panics
    /// - if `capacity` is zero
    pub fn with_capacity(capacity: usize) -> EventQueue {
        assert!(capacity > 0, "event queue capacity must be nonzero");
        EventQueue {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot_index(&self, offset: usize) -> usize {
        (self.head + offset) % self.slots.len()
    }

    /// Appends an event.
    ///
    /// A negligible event equivalent in kind to the most recently queued one replaces it instead of
    /// taking a new slot.
    pub fn push(&mut self, event: Event) -> Result<(), Error> {
        if self.len > 0 {
            let tail = self.slot_index(self.len - 1);
            if let Some(last) = &mut self.slots[tail] {
                if last.coalesces_with(&event) {
                    *last = event;
                    return Ok(());
                }
            }
        }

        if self.len == self.slots.len() {
            return Err(Error::QueueFull {
                capacity: self.slots.len(),
            });
        }

        let index = self.slot_index(self.len);
        self.slots[index] = Some(event);
        self.len += 1;
        Ok(())
    }

    /// Removes the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        if self.len == 0 {
            return None;
        }
        let event = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        event
    }

    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, KeyCode};
    use cgmath::Point2;

    #[test]
    fn fifo_across_wraparound() {
        let mut queue = EventQueue::with_capacity(3);
        for c in "abc".chars() {
            queue.push(Event::key_typed(c)).unwrap();
        }
        assert_eq!(queue.pop().unwrap().character, Some('a'));
        queue.push(Event::key_typed('d')).unwrap();
        let rest: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|e| e.character.unwrap())
            .collect();
        assert_eq!(rest, vec!['b', 'c', 'd']);
    }

    #[test]
    fn full_queue_rejects() {
        let mut queue = EventQueue::with_capacity(2);
        queue.push(Event::key_pressed(KeyCode::A)).unwrap();
        queue.push(Event::key_pressed(KeyCode::B)).unwrap();
        match queue.push(Event::key_pressed(KeyCode::C)) {
            Err(Error::QueueFull { capacity }) => assert_eq!(capacity, 2),
            other => panic!("expected QueueFull, got {:?}", other),
        }
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn moves_coalesce_into_one_entry() {
        let mut queue = EventQueue::with_capacity(4);
        for i in 0..100 {
            queue
                .push(Event::mouse_moved(Point2::new(i as f64, 0.)))
                .unwrap();
            assert_eq!(queue.len(), 1, "at most one pending move");
        }
        let last = queue.pop().unwrap();
        assert_eq!(last.location, Some(Point2::new(99., 0.)));
    }

    #[test]
    fn moves_after_other_events_append() {
        let mut queue = EventQueue::with_capacity(4);
        queue.push(Event::mouse_moved(Point2::new(0., 0.))).unwrap();
        queue.push(Event::key_typed('a')).unwrap();
        queue.push(Event::mouse_moved(Point2::new(1., 0.))).unwrap();
        queue.push(Event::mouse_moved(Point2::new(2., 0.))).unwrap();
        assert_eq!(queue.len(), 3);
    }
}
