// Copyright 2026 the harel authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # harel
//!
//! A Harel statechart interpreter, inspired by `XState`: hierarchical and
//! parallel states, guarded transitions, entry/exit actions, delayed
//! transitions, eventless transitions and invoked asynchronous actors,
//! with strict run-to-completion semantics.
//!
//! Machines are plain data built with [`MachineBuilder`]; behavior is bound
//! by name through a [`Registry`] and validated fail-fast. Run a machine
//! synchronously with [`Interpreter`], or host it on tokio with
//! [`spawn_machine`] and talk to it through a cloneable [`Handle`].
//!
//! ```
//! use harel_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq, Default)]
//! struct Ctx {
//!     presses: u32,
//! }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Press;
//!
//! impl Event for Press {
//!     fn event_type(&self) -> &'static str {
//!         "PRESS"
//!     }
//! }
//!
//! struct Toggle;
//!
//! impl MachineTypes for Toggle {
//!     type Context = Ctx;
//!     type Event = Press;
//!     type Output = ();
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = MachineBuilder::new("toggle");
//! let root = builder.root();
//! let off = builder.state(root, "off");
//! let on = builder.state(root, "on");
//! builder.initial(root, off);
//! builder.on(off, "PRESS").target(on).action("count");
//! builder.on(on, "PRESS").target(off);
//! let def = Arc::new(builder.build()?);
//!
//! let registry: Registry<Toggle> =
//!     Registry::new().action("count", |args: &mut ActionArgs<'_, Toggle>| {
//!         args.context.presses += 1;
//!     });
//!
//! let scheduler = ManualScheduler::new();
//! let mut machine = Interpreter::new(def, registry, Ctx::default(), scheduler)?;
//! machine.start()?;
//! machine.send(Press)?;
//! assert_eq!(machine.snapshot().value.leaf(), Some("on"));
//! assert_eq!(machine.context().presses, 1);
//! # Ok(())
//! # }
//! ```

mod actor;
mod context;
pub mod error;
pub mod event;
pub mod interpreter;
pub mod machine;
pub mod registry;
mod resolver;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
pub mod test_utils;
mod timers;

pub use error::{ActorFailure, DefinitionError, InterpreterError};
pub use event::{Cause, Event, RuntimeEvent};
pub use interpreter::Interpreter;
pub use machine::{MachineBuilder, MachineDef, MachineTypes, NodeId, NodeKind, TransitionBuilder};
pub use registry::{ActionArgs, Registry};
pub use runtime::{Handle, spawn_machine};
pub use scheduler::{Scheduler, TokioScheduler};
pub use snapshot::{Snapshot, StateValue, Status};
pub use test_utils::ManualScheduler;

pub mod prelude {
    //! The types almost every machine definition needs.
    pub use crate::error::{ActorFailure, DefinitionError, InterpreterError};
    pub use crate::event::{Cause, Event, RuntimeEvent};
    pub use crate::interpreter::Interpreter;
    pub use crate::machine::{MachineBuilder, MachineDef, MachineTypes, NodeId, NodeKind};
    pub use crate::registry::{ActionArgs, Registry};
    pub use crate::runtime::{Handle, spawn_machine};
    pub use crate::scheduler::{Scheduler, TokioScheduler};
    pub use crate::snapshot::{Snapshot, StateValue, Status};
    pub use crate::test_utils::ManualScheduler;
}
