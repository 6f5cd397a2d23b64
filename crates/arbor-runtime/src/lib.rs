//! Hierarchical controller execution engine.
//!
//! An [`Application`] runs a tree of controllers. Each controller is a
//! state machine; its current state owns event processors and child
//! controllers. Events flow in three directions:
//!
//! - **view**: from outside into a controller's current state
//! - **parent**: broadcast from a state to its immediate child controllers
//! - **child**: raised by a controller to its parent, bubbling upwards until
//!   some state handles it
//!
//! Transitions destroy the current state and everything it owns, releasing
//! any exclusive services it locked.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  arbor-types    : ids, names, Params, ErrorCode              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  arbor-service  : Service, ServiceRegistry, ServiceCache     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  arbor-runtime  : Application, Controller, State, events ◄──│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use arbor_runtime::{
//!     controller_fn, processor_fn, startup_fn, state_fn, Application, Controller,
//! };
//! use arbor_service::ServiceRegistry;
//! use arbor_types::Params;
//! use std::sync::Arc;
//!
//! fn contacts() -> impl Controller {
//!     controller_fn(|ctx| {
//!         ctx.add_initial_state(
//!             "listing",
//!             state_fn(|s| {
//!                 s.set_output("count", 2)?;
//!                 s.add_view_event_processor(
//!                     "edit",
//!                     processor_fn(|e| {
//!                         let id = e.param_str("id")?.to_string();
//!                         e.do_transition("editing", Params::new().with("id", id)?)
//!                     }),
//!                 )
//!             }),
//!             Params::new(),
//!         )?;
//!         ctx.add_state(
//!             "editing",
//!             state_fn(|s| {
//!                 let id = s.param_str("id")?.to_string();
//!                 s.set_output("editing", id)
//!             }),
//!         )
//!     })
//! }
//!
//! let app = Application::builder(startup_fn(|ctx| {
//!     ctx.set_root_controller("contacts", contacts(), Params::new())?;
//!     Ok(())
//! }))
//! .registry(Arc::new(ServiceRegistry::new()))
//! .build();
//!
//! app.start()?;
//! let root = app.root_controller()?;
//! root.fire_view_event("edit", Params::new().with("id", "7")?)?;
//! assert_eq!(root.current_state_name()?, "editing");
//! assert_eq!(root.output("editing")?, "7");
//! # Ok::<(), arbor_runtime::EngineError>(())
//! ```
//!
//! # Modules
//!
//! - [`config`]: TOML and environment configuration
//! - [`resource`]: resource loaders and property files
//!
//! # Logging
//!
//! The engine logs through `tracing`: application lifecycle at `info`,
//! controller and state lifecycle at `debug`, event delivery at `trace`.
//! Install a subscriber to see it.

pub mod config;
mod engine;
pub mod resource;
mod tree;

pub use engine::{
    startup_fn, Application, ApplicationBuilder, ApplicationListener, EngineError,
    ExecutionContext, Startup, StartupContext, StartupFn,
};
pub use resource::{PropertyLocator, PropertySet, Resource, ResourceLoader};
pub use tree::{
    controller_fn, processor_fn, state_fn, Channel, Controller, ControllerContext, ControllerFn,
    ControllerHandle, EventContext, EventProcessor, ProcessorFn, State, StateContext, StateFn,
};
