//! Error types for definition construction and interpreter execution.

use thiserror::Error;

/// Structural problems detected while building a [`MachineDef`] or resolving
/// its named guards/actions/actors against a [`Registry`].
///
/// These are fail-fast errors: a definition that produces one is malformed
/// and must not be interpreted.
///
/// [`MachineDef`]: crate::machine::MachineDef
/// [`Registry`]: crate::registry::Registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("compound state `{0}` has children but no initial child")]
    MissingInitial(String),

    #[error("initial child of `{parent}` is not one of its direct children")]
    InitialNotChild { parent: String },

    #[error("parallel state `{0}` needs at least two regions")]
    ParallelNeedsRegions(String),

    #[error("parallel state `{0}` cannot designate an initial child")]
    ParallelWithInitial(String),

    #[error("duplicate child state name `{name}` under `{parent}`")]
    DuplicateState { parent: String, name: String },

    #[error("transition from `{from}` to `{target}` crosses parallel regions")]
    CrossRegionTarget { from: String, target: String },

    #[error("final state `{0}` cannot declare children, transitions or invocations")]
    FinalWithBehavior(String),

    #[error("state `{0}` declares more than one invocation")]
    DuplicateInvoke(String),

    #[error("state `{0}` routes an invocation result but never declares the invocation")]
    InvokeWithoutSource(String),

    #[error("state `{0}` declares more than one delayed transition")]
    DuplicateAfter(String),

    #[error("state `{0}` declares a done-transition but has no child regions")]
    DoneWithoutChildren(String),

    #[error("no {kind} named `{name}` was provided to the registry")]
    UnboundName {
        kind: &'static str,
        name: &'static str,
    },
}

/// A recoverable failure produced by an invoked actor.
///
/// Actor failures are part of the modeled domain ("email already exists",
/// "save failed") and are routed through a node's `on_error` transition
/// rather than escaping the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActorFailure(pub String);

impl ActorFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for ActorFailure {
    fn from(message: &str) -> Self {
        Self(message.to_owned())
    }
}

impl From<String> for ActorFailure {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Run-time faults surfaced by [`Interpreter`] operations.
///
/// [`Interpreter`]: crate::interpreter::Interpreter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpreterError {
    /// `send` or `deliver` was called on an interpreter that is not running.
    #[error("interpreter is not running")]
    NotRunning,

    /// `start` was called more than once.
    #[error("interpreter has already been started")]
    AlreadyStarted,

    /// An action panicked. The remainder of the step's action sequence is
    /// aborted; configuration and context changes already committed in the
    /// step remain in place.
    #[error("action `{action}` panicked: {message}")]
    ActionFailed {
        action: &'static str,
        message: String,
    },

    /// Eventless transitions kept firing past the iteration cap. The
    /// machine definition contains a cycle of always-transitions and the
    /// interpreter is considered unstable.
    #[error("eventless transitions did not settle within {limit} passes")]
    SettlingLoop { limit: usize },

    /// An invocation was started for a state that already owns a live one.
    #[error("state `{0}` already has a live invocation")]
    ActorAlreadyRunning(String),
}
