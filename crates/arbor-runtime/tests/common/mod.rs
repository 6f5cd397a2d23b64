//! Shared fixtures for arbor-runtime integration tests.

#![allow(dead_code)]

use arbor_runtime::{
    controller_fn, state_fn, Application, Controller, EngineError, Startup, StartupContext,
};
use arbor_service::ServiceRegistry;
use arbor_types::Params;
use parking_lot::Mutex;
use std::sync::Arc;

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Ordered record of what handlers saw.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Controller with a single state that does nothing on entry.
pub fn idle_controller() -> impl Controller {
    controller_fn(|ctx| ctx.add_initial_state("idle", state_fn(|_| Ok(())), Params::new()))
}

/// Builds an application on a private registry with `root` as its root
/// controller, created fresh on every start.
pub fn app_with_root<F, C>(registry: &Arc<ServiceRegistry>, make_root: F) -> Application
where
    F: Fn() -> C + Send + Sync + 'static,
    C: Controller,
{
    Application::builder(RootStartup(make_root))
        .registry(Arc::clone(registry))
        .build()
}

struct RootStartup<F>(F);

impl<F, C> Startup for RootStartup<F>
where
    F: Fn() -> C + Send + Sync + 'static,
    C: Controller,
{
    fn on_start(&self, ctx: &StartupContext<'_>) -> Result<(), EngineError> {
        ctx.set_root_controller("r", (self.0)(), Params::new())?;
        Ok(())
    }
}

pub fn registry() -> Arc<ServiceRegistry> {
    Arc::new(ServiceRegistry::new())
}
