//! Application lifecycle, controller registry and engine errors.

mod application;
mod context;
mod error;
mod listener;

pub use application::{startup_fn, Application, ApplicationBuilder, Startup, StartupContext, StartupFn};
pub use context::ExecutionContext;
pub use error::EngineError;
pub use listener::ApplicationListener;
