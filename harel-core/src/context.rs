//! The context store: extended state plus the most recent actor failure.

use crate::error::ActorFailure;
use crate::machine::MachineTypes;

/// Owns the machine's extended state. Mutated exclusively inside the
/// interpreter's run-to-completion loop; snapshots are owned clones.
#[derive(Debug)]
pub struct ContextStore<T: MachineTypes> {
    context: T::Context,
    last_failure: Option<ActorFailure>,
}

impl<T: MachineTypes> ContextStore<T> {
    pub fn new(context: T::Context) -> Self {
        Self {
            context,
            last_failure: None,
        }
    }

    pub fn get(&self) -> &T::Context {
        &self.context
    }

    pub fn get_mut(&mut self) -> &mut T::Context {
        &mut self.context
    }

    /// The most recent actor failure, if no successful settlement has
    /// happened since.
    pub fn last_failure(&self) -> Option<&ActorFailure> {
        self.last_failure.as_ref()
    }

    pub(crate) fn record_failure(&mut self, failure: ActorFailure) {
        self.last_failure = Some(failure);
    }

    pub(crate) fn clear_failure(&mut self) {
        self.last_failure = None;
    }
}
