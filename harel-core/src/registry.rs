//! Named guard/action/actor implementations, resolved at construction.
//!
//! A [`MachineDef`] references behavior by name only; the [`Registry`] maps
//! those names to implementations and is checked against the definition
//! when an interpreter is built, so a missing binding fails fast instead of
//! surfacing mid-run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{ActorFailure, DefinitionError};
use crate::event::Cause;
use crate::machine::{MachineDef, MachineTypes};

/// Arguments handed to an action implementation.
pub struct ActionArgs<'a, T: MachineTypes> {
    /// The machine's extended state, mutable in place.
    pub context: &'a mut T::Context,
    /// What triggered the step this action runs in.
    pub cause: Cause<'a, T>,
    raised: &'a mut Vec<T::Event>,
}

impl<'a, T: MachineTypes> ActionArgs<'a, T> {
    pub(crate) fn new(
        context: &'a mut T::Context,
        cause: Cause<'a, T>,
        raised: &'a mut Vec<T::Event>,
    ) -> Self {
        Self {
            context,
            cause,
            raised,
        }
    }

    /// Self-send an event, processed as its own run-to-completion step
    /// after the current one finishes. This is the only sanctioned way for
    /// an action to cause further processing.
    pub fn raise(&mut self, event: T::Event) {
        self.raised.push(event);
    }
}

/// A pure predicate over context and cause.
pub type GuardFn<T> =
    Arc<dyn Fn(&<T as MachineTypes>::Context, Cause<'_, T>) -> bool + Send + Sync>;

/// A context-mutating operation executed during entry, exit or transition.
pub type ActionFn<T> = Arc<dyn Fn(&mut ActionArgs<'_, T>) + Send + Sync>;

/// An asynchronous unit of work started from a context snapshot.
pub type ActorFn<T> = Arc<
    dyn Fn(
            &<T as MachineTypes>::Context,
        )
            -> BoxFuture<'static, Result<<T as MachineTypes>::Output, ActorFailure>>
        + Send
        + Sync,
>;

/// The resolved implementation table for one machine definition.
pub struct Registry<T: MachineTypes> {
    guards: HashMap<&'static str, GuardFn<T>>,
    actions: HashMap<&'static str, ActionFn<T>>,
    actors: HashMap<&'static str, ActorFn<T>>,
}

impl<T: MachineTypes> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MachineTypes> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            guards: self.guards.clone(),
            actions: self.actions.clone(),
            actors: self.actors.clone(),
        }
    }
}

impl<T: MachineTypes> Registry<T> {
    pub fn new() -> Self {
        Self {
            guards: HashMap::new(),
            actions: HashMap::new(),
            actors: HashMap::new(),
        }
    }

    /// Bind a guard predicate. Guards must not mutate anything; a panicking
    /// guard is treated as unsatisfied.
    pub fn guard<F>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(&T::Context, Cause<'_, T>) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name, Arc::new(f));
        self
    }

    /// Bind an action.
    pub fn action<F>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut ActionArgs<'_, T>) + Send + Sync + 'static,
    {
        self.actions.insert(name, Arc::new(f));
        self
    }

    /// Bind an actor: a function from a context snapshot to a future that
    /// settles with the actor's output or a recoverable failure.
    pub fn actor<F, Fut>(mut self, name: &'static str, f: F) -> Self
    where
        F: Fn(&T::Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T::Output, ActorFailure>> + Send + 'static,
    {
        self.actors.insert(name, Arc::new(move |ctx| f(ctx).boxed()));
        self
    }

    pub(crate) fn lookup_guard(&self, name: &str) -> Option<&GuardFn<T>> {
        self.guards.get(name)
    }

    pub(crate) fn lookup_action(&self, name: &str) -> Option<&ActionFn<T>> {
        self.actions.get(name)
    }

    pub(crate) fn lookup_actor(&self, name: &str) -> Option<&ActorFn<T>> {
        self.actors.get(name)
    }

    /// Check that every name the definition references is bound.
    pub(crate) fn validate(&self, def: &MachineDef) -> Result<(), DefinitionError> {
        for name in def.guard_names() {
            if !self.guards.contains_key(name) {
                return Err(DefinitionError::UnboundName {
                    kind: "guard",
                    name,
                });
            }
        }
        for name in def.action_names() {
            if !self.actions.contains_key(name) {
                return Err(DefinitionError::UnboundName {
                    kind: "action",
                    name,
                });
            }
        }
        for name in def.actor_names() {
            if !self.actors.contains_key(name) {
                return Err(DefinitionError::UnboundName {
                    kind: "actor",
                    name,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::machine::MachineBuilder;

    #[derive(Debug, Clone, PartialEq)]
    enum Ev {
        Go,
    }

    impl Event for Ev {
        fn event_type(&self) -> &'static str {
            match self {
                Ev::Go => "GO",
            }
        }
    }

    struct Types;

    impl MachineTypes for Types {
        type Context = u32;
        type Event = Ev;
        type Output = ();
    }

    #[test]
    fn validate_reports_the_missing_binding() {
        let mut b = MachineBuilder::new("m");
        let root = b.root();
        let a = b.state(root, "a");
        let c = b.state(root, "b");
        b.initial(root, a);
        b.on(a, "GO").guard("ready").target(c).action("bump");
        let def = b.build().unwrap();

        let registry: Registry<Types> =
            Registry::new().guard("ready", |ctx: &u32, _: Cause<'_, Types>| *ctx > 0);
        assert_eq!(
            registry.validate(&def).unwrap_err(),
            DefinitionError::UnboundName {
                kind: "action",
                name: "bump",
            }
        );

        let registry =
            registry.action("bump", |args: &mut ActionArgs<'_, Types>| *args.context += 1);
        assert!(registry.validate(&def).is_ok());
    }

    #[test]
    fn raise_buffers_events_for_the_next_step() {
        let mut context = 0u32;
        let mut raised = Vec::new();
        let mut args: ActionArgs<'_, Types> =
            ActionArgs::new(&mut context, Cause::Internal, &mut raised);
        args.raise(Ev::Go);
        assert_eq!(raised, vec![Ev::Go]);
    }
}
