//! The synchronous statechart interpreter.
//!
//! One interpreter runs one machine instance. All processing is
//! run-to-completion: an external event, timer expiry or actor settlement
//! is taken from an internal FIFO queue, the resulting transitions are
//! applied, eventless transitions settle, and only then is the next queued
//! item considered. Asynchronous work never touches the machine directly —
//! the [`Scheduler`] delivers timers and actor settlements back through the
//! same queue, tagged with generations so anything cancelled in the
//! meantime is discarded.
//!
//! The interpreter itself never blocks and never spawns; pair it with
//! [`TokioScheduler`] inside the hosted runtime for production use, or with
//! `test_utils::ManualScheduler` for fully deterministic tests.
//!
//! [`TokioScheduler`]: crate::scheduler::TokioScheduler

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::actor::ActorHost;
use crate::context::ContextStore;
use crate::error::{ActorFailure, DefinitionError, InterpreterError};
use crate::event::{Cause, Event, RuntimeEvent};
use crate::machine::{MachineDef, MachineTypes, NodeId, NodeKind};
use crate::registry::{ActionArgs, Registry};
use crate::resolver::{self, Microstep, Selected};
use crate::scheduler::Scheduler;
use crate::snapshot::{self, Snapshot, Status};
use crate::timers::TimerRegistry;

/// Iteration cap for one settling pass. A machine whose eventless
/// transitions fire this many times in a single step is considered
/// unstable and faults.
const SETTLE_LIMIT: usize = 32;

enum Queued<T: MachineTypes> {
    External(T::Event),
    Runtime(RuntimeEvent<T>),
}

type ObserverFn<T> = Box<dyn Fn(&Snapshot<<T as MachineTypes>::Context>) + Send>;

/// A running (or startable) machine instance.
///
/// The interpreter is synchronous and single-threaded by construction;
/// concurrency lives entirely in the scheduler. Sending an event processes
/// it — and everything it causes — before returning.
pub struct Interpreter<T: MachineTypes, S: Scheduler<T>> {
    def: Arc<MachineDef>,
    registry: Registry<T>,
    scheduler: S,
    store: ContextStore<T>,
    /// Active configuration, sorted by id (document order).
    config: Vec<NodeId>,
    status: Status,
    timers: TimerRegistry,
    actors: ActorHost,
    queue: VecDeque<Queued<T>>,
    observers: Vec<ObserverFn<T>>,
    last_error: Option<String>,
}

impl<T: MachineTypes, S: Scheduler<T>> Interpreter<T, S> {
    /// Build an interpreter for `def`, resolving every guard, action and
    /// actor name against `registry`. An unbound name fails here, before
    /// anything runs.
    pub fn new(
        def: Arc<MachineDef>,
        registry: Registry<T>,
        context: T::Context,
        scheduler: S,
    ) -> Result<Self, DefinitionError> {
        registry.validate(&def)?;
        Ok(Self {
            def,
            registry,
            scheduler,
            store: ContextStore::new(context),
            config: Vec::new(),
            status: Status::Idle,
            timers: TimerRegistry::new(),
            actors: ActorHost::new(),
            queue: VecDeque::new(),
            observers: Vec::new(),
            last_error: None,
        })
    }

    pub fn machine(&self) -> &MachineDef {
        &self.def
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The current extended state.
    pub fn context(&self) -> &T::Context {
        self.store.get()
    }

    /// The most recent unconsumed actor failure, if any.
    pub fn last_failure(&self) -> Option<&ActorFailure> {
        self.store.last_failure()
    }

    /// An owned view of the machine at this instant.
    pub fn snapshot(&self) -> Snapshot<T::Context> {
        Snapshot::new(
            self.status,
            snapshot::state_value(&self.def, &self.config),
            self.store.get().clone(),
            self.last_error.clone(),
            self.config.clone(),
        )
    }

    /// Register an observer called with a fresh snapshot after every
    /// run-to-completion step.
    pub fn subscribe(&mut self, observer: impl Fn(&Snapshot<T::Context>) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Enter the initial configuration and settle. May only be called once.
    pub fn start(&mut self) -> Result<(), InterpreterError> {
        if self.status != Status::Idle {
            return Err(InterpreterError::AlreadyStarted);
        }
        let def = Arc::clone(&self.def);
        tracing::debug!(machine = def.id(), "starting interpreter");
        self.status = Status::Running;

        let mut raised = Vec::new();
        let step = Microstep {
            entry: resolver::initial_configuration(&def),
            ..Microstep::default()
        };
        if let Err(error) = self.apply_microstep(&def, &step, Cause::Internal, &mut raised) {
            tracing::error!(machine = def.id(), %error, "initial entry aborted");
            self.last_error = Some(error.to_string());
        }
        self.settle(&def, &mut raised);
        self.enqueue_raised(raised);
        self.publish();
        self.drain();
        Ok(())
    }

    /// Queue an external event and process it, and everything it causes,
    /// to completion.
    pub fn send(&mut self, event: T::Event) -> Result<(), InterpreterError> {
        if self.status != Status::Running {
            return Err(InterpreterError::NotRunning);
        }
        self.queue.push_back(Queued::External(event));
        self.drain();
        Ok(())
    }

    /// Deliver a marshaled timer expiry or actor settlement. Occurrences
    /// arriving after the machine stopped are discarded silently; stale
    /// generations are discarded inside the step.
    pub fn deliver(&mut self, occurrence: RuntimeEvent<T>) {
        if self.status != Status::Running {
            tracing::trace!(
                machine = self.def.id(),
                ?occurrence,
                "discarding occurrence for non-running machine"
            );
            return;
        }
        self.queue.push_back(Queued::Runtime(occurrence));
        self.drain();
    }

    /// Cancel all timers and live actors and mark the machine stopped.
    /// Idempotent; does nothing once the machine is done or faulted.
    pub fn stop(&mut self) {
        if matches!(self.status, Status::Stopped | Status::Done | Status::Faulted) {
            return;
        }
        self.teardown();
        self.status = Status::Stopped;
        tracing::debug!(machine = self.def.id(), "interpreter stopped");
        self.publish();
    }

    fn drain(&mut self) {
        while self.status == Status::Running {
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            self.step(item);
        }
    }

    /// One run-to-completion step: apply the queued item, settle, hand any
    /// self-raised events to the queue, publish.
    fn step(&mut self, queued: Queued<T>) {
        let def = Arc::clone(&self.def);
        let mut raised: Vec<T::Event> = Vec::new();
        match queued {
            Queued::External(event) => {
                let cause = Cause::Event(&event);
                let selections = {
                    let registry = &self.registry;
                    let context = self.store.get();
                    let mut eval =
                        |name: &'static str| eval_guard(registry, context, cause, name);
                    resolver::select_for_event(&def, &self.config, event.event_type(), &mut eval)
                };
                if selections.is_empty() {
                    tracing::trace!(
                        machine = def.id(),
                        event = event.event_type(),
                        "event matched no transition"
                    );
                }
                self.apply_selections(&def, selections, cause, &mut raised);
            }
            Queued::Runtime(occurrence) => self.apply_runtime(&def, occurrence, &mut raised),
        }
        self.settle(&def, &mut raised);
        self.enqueue_raised(raised);
        debug_assert!(
            self.status != Status::Running || def.is_complete_configuration(&self.config)
        );
        self.publish();
    }

    fn apply_runtime(
        &mut self,
        def: &MachineDef,
        occurrence: RuntimeEvent<T>,
        raised: &mut Vec<T::Event>,
    ) {
        match occurrence {
            RuntimeEvent::TimerFired { node, generation } => {
                if !self.timers.matches(node, generation) {
                    tracing::trace!(machine = def.id(), node = def.path(node), "stale timer");
                    return;
                }
                self.timers.fired(node);
                let Some(after) = &def.node(node).after else {
                    return;
                };
                let cause = Cause::Timer;
                let candidate = self.pick(&after.transition, cause);
                if let Some(candidate) = candidate {
                    self.apply_selections(
                        def,
                        vec![Selected {
                            source: node,
                            candidate,
                        }],
                        cause,
                        raised,
                    );
                }
            }
            RuntimeEvent::ActorDone {
                node,
                generation,
                output,
            } => {
                if !self.actors.matches(node, generation) {
                    tracing::trace!(
                        machine = def.id(),
                        node = def.path(node),
                        generation,
                        "stale actor settlement"
                    );
                    return;
                }
                self.actors.settled(node);
                self.store.clear_failure();
                self.last_error = None;
                let Some(invoke) = &def.node(node).invoke else {
                    return;
                };
                let cause = Cause::Done(&output);
                let candidate = self.pick(&invoke.on_done, cause);
                if let Some(candidate) = candidate {
                    self.apply_selections(
                        def,
                        vec![Selected {
                            source: node,
                            candidate,
                        }],
                        cause,
                        raised,
                    );
                }
            }
            RuntimeEvent::ActorFailed {
                node,
                generation,
                error,
            } => {
                if !self.actors.matches(node, generation) {
                    tracing::trace!(
                        machine = def.id(),
                        node = def.path(node),
                        generation,
                        "stale actor failure"
                    );
                    return;
                }
                self.actors.settled(node);
                tracing::warn!(machine = def.id(), node = def.path(node), %error, "actor failed");
                self.last_error = Some(error.to_string());
                self.store.record_failure(error.clone());
                let Some(invoke) = &def.node(node).invoke else {
                    return;
                };
                let cause = Cause::Failed(&error);
                let candidate = self.pick(&invoke.on_error, cause);
                if let Some(candidate) = candidate {
                    self.apply_selections(
                        def,
                        vec![Selected {
                            source: node,
                            candidate,
                        }],
                        cause,
                        raised,
                    );
                }
            }
        }
    }

    fn pick(
        &self,
        transition: &crate::machine::TransitionDef,
        cause: Cause<'_, T>,
    ) -> Option<crate::machine::Candidate> {
        let registry = &self.registry;
        let context = self.store.get();
        let mut eval = |name: &'static str| eval_guard(registry, context, cause, name);
        resolver::pick_candidate(transition, &mut eval).cloned()
    }

    /// Apply the selections of one trigger in order. A selection whose
    /// source was exited by an earlier one in the same step is skipped.
    fn apply_selections(
        &mut self,
        def: &MachineDef,
        selections: Vec<Selected>,
        cause: Cause<'_, T>,
        raised: &mut Vec<T::Event>,
    ) {
        for selected in selections {
            if self.config.binary_search(&selected.source).is_err() {
                continue;
            }
            let step = resolver::plan(def, &self.config, selected.source, &selected.candidate);
            if let Err(error) = self.apply_microstep(def, &step, cause, raised) {
                tracing::error!(machine = def.id(), %error, "step aborted");
                self.last_error = Some(error.to_string());
                return;
            }
        }
    }

    /// Execute one microstep.
    ///
    /// Structural changes (configuration membership, timer and actor
    /// lifecycle) always complete so that the configuration stays
    /// well-formed; a panicking action aborts only the remaining action
    /// executions of the step.
    fn apply_microstep(
        &mut self,
        def: &MachineDef,
        step: &Microstep,
        cause: Cause<'_, T>,
        raised: &mut Vec<T::Event>,
    ) -> Result<(), InterpreterError> {
        let mut failure: Option<InterpreterError> = None;

        for &node in &step.exit {
            if failure.is_none() {
                if let Err(error) = self.run_actions(&def.node(node).exit, cause, raised) {
                    failure = Some(error);
                }
            }
            if let Some(handle) = self.timers.cancel(node) {
                self.scheduler.cancel(handle);
            }
            if let Some(task) = self.actors.stop(node) {
                self.scheduler.abort(task);
            }
            if let Ok(i) = self.config.binary_search(&node) {
                self.config.remove(i);
            }
        }

        if failure.is_none() {
            if let Err(error) = self.run_actions(&step.actions, cause, raised) {
                failure = Some(error);
            }
        }

        for &node in &step.entry {
            if let Err(i) = self.config.binary_search(&node) {
                self.config.insert(i, node);
            }
            if failure.is_none() {
                if let Err(error) = self.run_actions(&def.node(node).entry, cause, raised) {
                    failure = Some(error);
                }
            }
            if let Some(after) = &def.node(node).after {
                let generation = self.timers.begin();
                let handle = self
                    .scheduler
                    .schedule(after.delay, RuntimeEvent::TimerFired { node, generation });
                self.timers.commit(node, generation, handle);
            }
            if let Some(invoke) = &def.node(node).invoke {
                if let Err(error) = self.start_actor(def, node, invoke.src) {
                    failure.get_or_insert(error);
                }
            }
        }

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn run_actions(
        &mut self,
        names: &[&'static str],
        cause: Cause<'_, T>,
        raised: &mut Vec<T::Event>,
    ) -> Result<(), InterpreterError> {
        for &name in names {
            // Validated at construction; a miss here means a definition
            // swap, which validate() forbids.
            let Some(action) = self.registry.lookup_action(name).cloned() else {
                continue;
            };
            let outcome = {
                let mut args = ActionArgs::new(self.store.get_mut(), cause, raised);
                panic::catch_unwind(AssertUnwindSafe(|| action(&mut args)))
            };
            if let Err(payload) = outcome {
                return Err(InterpreterError::ActionFailed {
                    action: name,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
        Ok(())
    }

    fn start_actor(
        &mut self,
        def: &MachineDef,
        node: NodeId,
        src: &'static str,
    ) -> Result<(), InterpreterError> {
        let Some(actor) = self.registry.lookup_actor(src).cloned() else {
            return Ok(());
        };
        let generation = self
            .actors
            .begin(node)
            .map_err(|()| InterpreterError::ActorAlreadyRunning(def.path(node)))?;
        tracing::debug!(
            machine = def.id(),
            node = def.path(node),
            actor = src,
            generation,
            "starting actor"
        );
        let future = actor(self.store.get());
        let settlement: BoxFuture<'static, RuntimeEvent<T>> = Box::pin(async move {
            match future.await {
                Ok(output) => RuntimeEvent::ActorDone {
                    node,
                    generation,
                    output,
                },
                Err(error) => RuntimeEvent::ActorFailed {
                    node,
                    generation,
                    error,
                },
            }
        });
        let task = self.scheduler.spawn(settlement);
        self.actors.commit(node, generation, task);
        Ok(())
    }

    /// Fire eventless and region-completion transitions until the
    /// configuration is stable, then check for top-level completion.
    fn settle(&mut self, def: &MachineDef, raised: &mut Vec<T::Event>) {
        for _ in 0..SETTLE_LIMIT {
            if self.status != Status::Running {
                return;
            }
            if self.reached_done(def) {
                self.teardown();
                self.status = Status::Done;
                tracing::debug!(machine = def.id(), "machine reached a top-level final state");
                return;
            }
            let cause = Cause::Internal;
            let selected = {
                let registry = &self.registry;
                let context = self.store.get();
                let mut eval = |name: &'static str| eval_guard(registry, context, cause, name);
                resolver::select_always(def, &self.config, &mut eval)
                    .or_else(|| resolver::select_region_done(def, &self.config, &mut eval))
            };
            let Some(selected) = selected else {
                return;
            };
            let step = resolver::plan(def, &self.config, selected.source, &selected.candidate);
            if let Err(error) = self.apply_microstep(def, &step, cause, raised) {
                tracing::error!(machine = def.id(), %error, "settling aborted");
                self.last_error = Some(error.to_string());
                return;
            }
        }
        let error = InterpreterError::SettlingLoop {
            limit: SETTLE_LIMIT,
        };
        tracing::error!(machine = def.id(), %error, "machine is unstable");
        self.last_error = Some(error.to_string());
        self.teardown();
        self.status = Status::Faulted;
    }

    fn reached_done(&self, def: &MachineDef) -> bool {
        def.children(def.root())
            .iter()
            .any(|&c| def.kind(c) == NodeKind::Final && self.config.binary_search(&c).is_ok())
    }

    fn teardown(&mut self) {
        for handle in self.timers.cancel_all() {
            self.scheduler.cancel(handle);
        }
        for task in self.actors.stop_all() {
            self.scheduler.abort(task);
        }
        self.queue.clear();
    }

    fn enqueue_raised(&mut self, raised: Vec<T::Event>) {
        for event in raised {
            self.queue.push_back(Queued::External(event));
        }
    }

    fn publish(&self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in &self.observers {
            observer(&snapshot);
        }
    }
}

fn eval_guard<T: MachineTypes>(
    registry: &Registry<T>,
    context: &T::Context,
    cause: Cause<'_, T>,
    name: &'static str,
) -> bool {
    let Some(guard) = registry.lookup_guard(name) else {
        return false;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| guard(context, cause))) {
        Ok(pass) => pass,
        Err(payload) => {
            tracing::warn!(
                guard = name,
                message = panic_message(payload.as_ref()),
                "guard panicked; treated as unsatisfied"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
