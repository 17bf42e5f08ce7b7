// Copyright 2023 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Millisecond-granularity single-shot timers. The platform implements
//! [`Scheduler`]; when a deadline fires it posts the returned [`EventId`]
//! back through the driver event queue, and the owning actor recovers its
//! typed event with [`Timer::triggered`].

use std::{collections::HashMap, time::Duration};

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(pub u64);

/// Platform timer services. `schedule` arms a single-shot deadline and
/// returns a unique id used to cancel it. A canceled id never fires.
pub trait Scheduler {
    fn schedule(&mut self, from_now: Duration) -> EventId;
    fn cancel(&mut self, id: EventId);
}

/// Maps scheduled deadlines to typed events. An event is delivered at most
/// once: `triggered` removes it.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_after(&mut self, from_now: Duration, event: E) -> EventId {
        let event_id = self.scheduler.schedule(from_now);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        self.events.remove(&event_id);
        self.scheduler.cancel(event_id);
    }

    pub fn cancel_all(&mut self) {
        for event_id in self.events.keys() {
            self.scheduler.cancel(*event_id);
        }
        self.events.clear();
    }

    #[cfg(test)]
    pub fn scheduled_count(&self) -> usize {
        self.events.len()
    }
}
