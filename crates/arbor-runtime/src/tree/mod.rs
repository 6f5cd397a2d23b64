//! The controller tree.
//!
//! ```text
//! Controller ──owns──▶ State (current) ──owns──▶ EventProcessor ×3 channels
//!                           │
//!                           └──owns──▶ child Controller ──▶ ...
//! ```
//!
//! Ownership runs strictly downwards. Upward references (processor to
//! state, state to controller, child controller to enclosing state) are
//! weak and only used to route events and reach resources.

mod controller;
mod processor;
mod state;

pub use controller::{controller_fn, Controller, ControllerContext, ControllerFn, ControllerHandle};
pub(crate) use controller::ControllerNode;
pub use processor::{processor_fn, Channel, EventContext, EventProcessor, ProcessorFn};
pub use state::{state_fn, State, StateContext, StateFn};
