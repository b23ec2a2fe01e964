//! The scheduler adapter: the interpreter's one seam to wall-clock time
//! and background execution.
//!
//! The interpreter never sleeps and never awaits. It asks the scheduler to
//! deliver a [`RuntimeEvent`] after a delay (delayed transitions) or when a
//! boxed future settles (invoked actors); the scheduler delivers into
//! whatever queue feeds the interpreter. [`TokioScheduler`] is the
//! production implementation; `test_utils::ManualScheduler` gives tests
//! full control over when timers fire and actors settle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::event::RuntimeEvent;
use crate::machine::MachineTypes;

/// Opaque handle for a scheduled delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub(crate) u64);

/// Opaque handle for a spawned background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub(crate) u64);

/// Timer and task services required by an interpreter.
pub trait Scheduler<T: MachineTypes>: Send + 'static {
    /// Deliver `event` after `delay`. Best effort after cancellation: a
    /// delivery that was already in flight is discarded downstream by the
    /// generation check.
    fn schedule(&mut self, delay: Duration, event: RuntimeEvent<T>) -> TimerHandle;

    /// Cancel a scheduled delivery if it has not fired yet.
    fn cancel(&mut self, handle: TimerHandle);

    /// Run `settlement` in the background and deliver its output.
    fn spawn(&mut self, settlement: BoxFuture<'static, RuntimeEvent<T>>) -> TaskHandle;

    /// Cooperatively abort a background task.
    fn abort(&mut self, handle: TaskHandle);
}

/// Tokio-backed scheduler: delays are sleep tasks, actors are spawned
/// futures, both delivering through an injected sink (normally the hosted
/// runtime's mailbox sender).
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler<T: MachineTypes> {
    sink: Arc<dyn Fn(RuntimeEvent<T>) + Send + Sync>,
    timers: HashMap<u64, tokio::task::JoinHandle<()>>,
    tasks: HashMap<u64, tokio::task::JoinHandle<()>>,
    next_id: u64,
}

impl<T: MachineTypes> TokioScheduler<T> {
    pub fn new(sink: impl Fn(RuntimeEvent<T>) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            timers: HashMap::new(),
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        // Keep the maps from accumulating finished handles.
        self.timers.retain(|_, h| !h.is_finished());
        self.tasks.retain(|_, h| !h.is_finished());
        self.next_id
    }
}

impl<T: MachineTypes> Scheduler<T> for TokioScheduler<T> {
    fn schedule(&mut self, delay: Duration, event: RuntimeEvent<T>) -> TimerHandle {
        let id = self.next_id();
        let sink = Arc::clone(&self.sink);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink(event);
        });
        self.timers.insert(id, handle);
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.timers.remove(&handle.0) {
            task.abort();
        }
    }

    fn spawn(&mut self, settlement: BoxFuture<'static, RuntimeEvent<T>>) -> TaskHandle {
        let id = self.next_id();
        let sink = Arc::clone(&self.sink);
        let handle = tokio::spawn(async move {
            let event = settlement.await;
            sink(event);
        });
        self.tasks.insert(id, handle);
        TaskHandle(id)
    }

    fn abort(&mut self, handle: TaskHandle) {
        if let Some(task) = self.tasks.remove(&handle.0) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::machine::NodeId;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Tick;

    impl Event for Tick {
        fn event_type(&self) -> &'static str {
            "TICK"
        }
    }

    struct Types;

    impl MachineTypes for Types {
        type Context = ();
        type Event = Tick;
        type Output = ();
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_events_arrive_after_the_delay() {
        let delivered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&delivered);
        let mut scheduler: TokioScheduler<Types> = TokioScheduler::new(move |event| {
            sink_log.lock().unwrap().push(event.generation());
        });

        scheduler.schedule(
            Duration::from_millis(500),
            RuntimeEvent::TimerFired {
                node: NodeId(1),
                generation: 42,
            },
        );

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(delivered.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*delivered.lock().unwrap(), vec![42]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_deliver() {
        let delivered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&delivered);
        let mut scheduler: TokioScheduler<Types> = TokioScheduler::new(move |event| {
            sink_log.lock().unwrap().push(event.generation());
        });

        let handle = scheduler.schedule(
            Duration::from_millis(100),
            RuntimeEvent::TimerFired {
                node: NodeId(1),
                generation: 1,
            },
        );
        scheduler.cancel(handle);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(delivered.lock().unwrap().is_empty());
    }
}
