//! Deterministic [`Scheduler`] implementation for tests.
//!
//! Nothing happens on its own: scheduled timers and spawned actor futures
//! are parked until the test decides to fire or settle them, at which point
//! the resulting [`RuntimeEvent`] is handed back for the test to deliver to
//! the interpreter. This makes timer and actor interleavings fully scripted
//! without a runtime.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::event::RuntimeEvent;
use crate::machine::{MachineTypes, NodeId};
use crate::scheduler::{Scheduler, TaskHandle, TimerHandle};

struct Inner<T: MachineTypes> {
    timers: BTreeMap<u64, (Duration, RuntimeEvent<T>)>,
    tasks: BTreeMap<u64, BoxFuture<'static, RuntimeEvent<T>>>,
    next_id: u64,
}

/// A hand-cranked scheduler. Cloning shares the pending queues, so a test
/// keeps one clone while the interpreter owns the other.
pub struct ManualScheduler<T: MachineTypes> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: MachineTypes> Clone for ManualScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: MachineTypes> Default for ManualScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MachineTypes> ManualScheduler<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                timers: BTreeMap::new(),
                tasks: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Number of timers currently pending.
    pub fn timer_count(&self) -> usize {
        self.inner.lock().unwrap().timers.len()
    }

    /// Number of actor futures currently pending.
    pub fn task_count(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    /// The delay of the pending timer owned by `node`, if one is armed.
    pub fn scheduled_delay(&self, node: NodeId) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        inner
            .timers
            .values()
            .find(|(_, event)| event.node() == node)
            .map(|(delay, _)| *delay)
    }

    /// Expire the pending timer owned by `node`, returning the event to
    /// deliver.
    pub fn fire(&self, node: NodeId) -> Option<RuntimeEvent<T>> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner
            .timers
            .iter()
            .find(|(_, (_, event))| event.node() == node)
            .map(|(&id, _)| id)?;
        inner.timers.remove(&id).map(|(_, event)| event)
    }

    /// Expire the oldest pending timer.
    pub fn fire_next(&self) -> Option<RuntimeEvent<T>> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.timers.keys().next().copied()?;
        inner.timers.remove(&id).map(|(_, event)| event)
    }

    /// Run the oldest pending actor future to completion, returning its
    /// settlement.
    pub fn settle_next(&self) -> Option<RuntimeEvent<T>> {
        let future = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.tasks.keys().next().copied()?;
            inner.tasks.remove(&id)?
        };
        Some(futures::executor::block_on(future))
    }

    /// Run every pending actor future to completion, in spawn order.
    pub fn settle_all(&self) -> Vec<RuntimeEvent<T>> {
        let mut settlements = Vec::new();
        while let Some(event) = self.settle_next() {
            settlements.push(event);
        }
        settlements
    }
}

impl<T: MachineTypes> Scheduler<T> for ManualScheduler<T> {
    fn schedule(&mut self, delay: Duration, event: RuntimeEvent<T>) -> TimerHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.timers.insert(id, (delay, event));
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.inner.lock().unwrap().timers.remove(&handle.0);
    }

    fn spawn(&mut self, settlement: BoxFuture<'static, RuntimeEvent<T>>) -> TaskHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.tasks.insert(id, settlement);
        TaskHandle(id)
    }

    fn abort(&mut self, handle: TaskHandle) {
        self.inner.lock().unwrap().tasks.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    #[derive(Debug, Clone, PartialEq)]
    struct Noop;

    impl Event for Noop {
        fn event_type(&self) -> &'static str {
            "NOOP"
        }
    }

    struct Types;

    impl MachineTypes for Types {
        type Context = ();
        type Event = Noop;
        type Output = ();
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let scheduler: ManualScheduler<Types> = ManualScheduler::new();
        let mut driver = scheduler.clone();
        let handle = driver.schedule(
            Duration::from_millis(10),
            RuntimeEvent::TimerFired {
                node: NodeId(3),
                generation: 1,
            },
        );
        assert_eq!(scheduler.timer_count(), 1);
        driver.cancel(handle);
        assert!(scheduler.fire(NodeId(3)).is_none());
    }

    #[test]
    fn tasks_settle_in_spawn_order() {
        let scheduler: ManualScheduler<Types> = ManualScheduler::new();
        let mut driver = scheduler.clone();
        for generation in 1..=3 {
            driver.spawn(Box::pin(async move {
                RuntimeEvent::ActorDone {
                    node: NodeId(1),
                    generation,
                    output: (),
                }
            }));
        }
        let generations: Vec<u64> = scheduler
            .settle_all()
            .iter()
            .map(RuntimeEvent::generation)
            .collect();
        assert_eq!(generations, vec![1, 2, 3]);
    }
}
