//! Applications.
//!
//! An [`Application`] is the top of the tree: it owns exactly one root
//! controller while running, the [`ExecutionContext`] shared by every
//! controller under it, and the root of the service lock chain.
//!
//! # Lifecycle
//!
//! | Call | Inactive app | Active app |
//! |------|--------------|------------|
//! | `start` | starting → startup hook → active | stop, then start |
//! | `restart` | [`EngineError::ApplicationNotRunning`] | stop, then start |
//! | `stop` | no-op | stopping → destroy root → inactive |
//! | `destroy` | destroying | stopping → destroying → destroy root → inactive |
//!
//! Dropping an active application stops it.

use super::context::ExecutionContext;
use super::listener::ApplicationListener;
use crate::config::RuntimeConfig;
use crate::resource::{DirectoryLoader, ResourceLoader};
use crate::tree::{Controller, ControllerHandle, ControllerNode};
use crate::EngineError;
use arbor_service::{ServiceCache, ServiceRegistry};
use arbor_types::{validate_name, ApplicationId, ControllerId, Params};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application startup hook.
pub trait Startup: Send + Sync + 'static {
    /// Runs on every start. Must set the root controller through
    /// [`StartupContext::set_root_controller`].
    ///
    /// # Errors
    ///
    /// Errors abort the start. A root controller already created by the
    /// hook is destroyed.
    fn on_start(&self, ctx: &StartupContext<'_>) -> Result<(), EngineError>;
}

/// [`Startup`] built from a closure. See [`startup_fn`].
pub struct StartupFn<F>(F);

impl<F> Startup for StartupFn<F>
where
    F: Fn(&StartupContext<'_>) -> Result<(), EngineError> + Send + Sync + 'static,
{
    fn on_start(&self, ctx: &StartupContext<'_>) -> Result<(), EngineError> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as a [`Startup`] hook.
pub fn startup_fn<F>(f: F) -> StartupFn<F>
where
    F: Fn(&StartupContext<'_>) -> Result<(), EngineError> + Send + Sync + 'static,
{
    StartupFn(f)
}

/// What the [`Startup`] hook sees.
pub struct StartupContext<'a> {
    app: &'a Application,
    root: Mutex<Option<Arc<ControllerNode>>>,
}

impl<'a> StartupContext<'a> {
    /// Returns the application id.
    #[must_use]
    pub fn app_id(&self) -> ApplicationId {
        self.app.id
    }

    /// Returns an application parameter.
    ///
    /// # Errors
    ///
    /// Fails if the parameter is missing.
    pub fn param(&self, name: &str) -> Result<&'a Value, EngineError> {
        Ok(self.app.params.get(name)?)
    }

    /// Returns all application parameters.
    #[must_use]
    pub fn params(&self) -> &'a Params {
        &self.app.params
    }

    /// Creates and starts the root controller.
    ///
    /// The root is recorded before it starts, so a failed start still
    /// tears it down.
    ///
    /// # Errors
    ///
    /// Fails if a root controller was already set during this start, or
    /// the controller's startup fails.
    pub fn set_root_controller<C: Controller>(
        &self,
        name: &str,
        controller: C,
        params: Params,
    ) -> Result<ControllerHandle, EngineError> {
        let name = validate_name(name, "controller")?;
        let node = {
            let mut root = self.root.lock();
            if root.is_some() {
                return Err(EngineError::RootControllerAlreadySet);
            }
            let node = ControllerNode::new(
                name.clone(),
                name,
                Arc::new(controller),
                None,
                Arc::clone(&self.app.context),
                ServiceCache::child(&self.app.cache),
                params,
            );
            *root = Some(Arc::clone(&node));
            node
        };
        node.start()?;
        Ok(node.handle())
    }
}

impl fmt::Debug for StartupContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupContext")
            .field("app", &self.app.id)
            .field("root_set", &self.root.lock().is_some())
            .finish()
    }
}

#[derive(Default)]
struct Lifecycle {
    active: bool,
    root: Option<Arc<ControllerNode>>,
}

/// A running (or runnable) controller tree.
///
/// # Example
///
/// ```
/// use arbor_runtime::{controller_fn, startup_fn, state_fn, Application};
/// use arbor_service::ServiceRegistry;
/// use arbor_types::Params;
/// use std::sync::Arc;
///
/// let app = Application::builder(startup_fn(|ctx| {
///     ctx.set_root_controller(
///         "main",
///         controller_fn(|c| {
///             c.add_initial_state("idle", state_fn(|_| Ok(())), Params::new())
///         }),
///         Params::new(),
///     )?;
///     Ok(())
/// }))
/// .registry(Arc::new(ServiceRegistry::new()))
/// .build();
///
/// app.start()?;
/// let root = app.controller_on_path("main")?.expect("root registered");
/// assert_eq!(root.current_state_name()?, "idle");
/// app.stop();
/// # Ok::<(), arbor_runtime::EngineError>(())
/// ```
pub struct Application {
    id: ApplicationId,
    context: Arc<ExecutionContext>,
    registry: Arc<ServiceRegistry>,
    cache: Arc<ServiceCache>,
    startup: Arc<dyn Startup>,
    params: Params,
    lifecycle: Mutex<Lifecycle>,
}

impl Application {
    /// Returns a builder for an application with the given startup hook.
    pub fn builder<S: Startup>(startup: S) -> ApplicationBuilder {
        ApplicationBuilder {
            startup: Arc::new(startup),
            params: Params::new(),
            registry: None,
            config: RuntimeConfig::default(),
            resources: None,
        }
    }

    /// Creates an application with default settings and the process-wide
    /// service registry.
    pub fn new<S: Startup>(startup: S) -> Self {
        Self::builder(startup).build()
    }

    /// Returns the application id. Service locks are held under it.
    #[must_use]
    pub fn id(&self) -> ApplicationId {
        self.id
    }

    /// Returns `true` between a successful start and the next stop.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lifecycle.lock().active
    }

    /// Returns the service registry this application locks against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Returns the execution context shared by all controllers.
    #[must_use]
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Starts the application, stopping it first if it is running.
    ///
    /// # Errors
    ///
    /// Fails if the startup hook fails or does not set a root controller.
    /// The application is left inactive.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.is_active() {
            self.stop();
        }

        info!(app = %self.id, "Starting application");
        self.context.notify_application_starting();

        let ctx = StartupContext {
            app: self,
            root: Mutex::new(None),
        };
        let result = self.startup.on_start(&ctx);
        let root = ctx.root.into_inner();

        match (result, root) {
            (Err(e), root) => {
                if let Some(root) = root {
                    root.destroy();
                }
                warn!(app = %self.id, error = %e, "Application failed to start");
                Err(e)
            }
            (Ok(()), None) => {
                warn!(app = %self.id, "Startup hook set no root controller");
                Err(EngineError::NoRootController)
            }
            (Ok(()), Some(root)) => {
                {
                    let mut lifecycle = self.lifecycle.lock();
                    lifecycle.root = Some(root);
                    lifecycle.active = true;
                }
                self.registry.application_started(&self.id);
                info!(app = %self.id, "Application started");
                Ok(())
            }
        }
    }

    /// Stops and starts a running application.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::ApplicationNotRunning`] if the application
    /// is not active, otherwise as [`start`](Self::start).
    pub fn restart(&self) -> Result<(), EngineError> {
        if !self.is_active() {
            return Err(EngineError::ApplicationNotRunning);
        }
        self.start()
    }

    /// Stops the application, destroying the whole controller tree.
    ///
    /// Does nothing if the application is not active.
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        info!(app = %self.id, "Stopping application");
        self.context.notify_application_stopping();
        self.shutdown();
    }

    /// Destroys the application.
    ///
    /// A running application is stopped first. Listeners hear
    /// `application_stopping` (if running) and then `application_destroying`.
    pub fn destroy(&self) {
        let active = self.is_active();
        if active {
            self.context.notify_application_stopping();
        }
        info!(app = %self.id, "Destroying application");
        self.context.notify_application_destroying();
        if active {
            self.shutdown();
        }
    }

    fn shutdown(&self) {
        let root = self.lifecycle.lock().root.clone();
        if let Some(root) = root {
            root.destroy();
        }
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.active = false;
            lifecycle.root = None;
        }
        self.cache.release_locks();

        let released = self.registry.application_stopped(&self.id);
        if released > 0 {
            warn!(app = %self.id, released, "Released service locks left held after stop");
        }
        debug!(app = %self.id, "Application stopped");
    }

    fn assert_active(&self) -> Result<(), EngineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::ApplicationNotRunning)
        }
    }

    /// Returns the root controller.
    ///
    /// # Errors
    ///
    /// Fails if the application is not running.
    pub fn root_controller(&self) -> Result<ControllerHandle, EngineError> {
        let lifecycle = self.lifecycle.lock();
        match (&lifecycle.root, lifecycle.active) {
            (Some(root), true) => Ok(root.handle()),
            _ => Err(EngineError::ApplicationNotRunning),
        }
    }

    /// Returns the active controller at a dotted path.
    ///
    /// # Errors
    ///
    /// Fails if the application is not running. An unknown path is
    /// `Ok(None)`.
    pub fn controller_on_path(&self, path: &str) -> Result<Option<ControllerHandle>, EngineError> {
        self.assert_active()?;
        Ok(self.context.controller_on_path(path))
    }

    /// Returns the active controller with the given instance id.
    ///
    /// # Errors
    ///
    /// Fails if the application is not running. An unknown id is
    /// `Ok(None)`.
    pub fn controller_by_id(&self, id: ControllerId) -> Result<Option<ControllerHandle>, EngineError> {
        self.assert_active()?;
        Ok(self.context.controller_by_id(id))
    }

    /// Returns an application parameter.
    ///
    /// # Errors
    ///
    /// Fails if the parameter is missing.
    pub fn param(&self, name: &str) -> Result<&Value, EngineError> {
        Ok(self.params.get(name)?)
    }

    /// Returns all application parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Adds a lifecycle listener. Adding the same listener twice has no
    /// effect.
    pub fn add_listener(&self, listener: Arc<dyn ApplicationListener>) {
        self.context.add_listener(listener);
    }

    /// Removes a lifecycle listener.
    pub fn remove_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        self.context.remove_listener(listener);
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    startup: Arc<dyn Startup>,
    params: Params,
    registry: Option<Arc<ServiceRegistry>>,
    config: RuntimeConfig,
    resources: Option<Arc<dyn ResourceLoader>>,
}

impl ApplicationBuilder {
    /// Sets the application parameters.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the service registry. Defaults to
    /// [`ServiceRegistry::global`].
    #[must_use]
    pub fn registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the application-wide resource loader.
    ///
    /// Defaults to a [`DirectoryLoader`] over `resources.base_dir` when the
    /// configuration names one.
    #[must_use]
    pub fn resources(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.resources = Some(loader);
        self
    }

    /// Builds the application. It is not started.
    #[must_use]
    pub fn build(self) -> Application {
        let id = ApplicationId::new();
        let registry = self.registry.unwrap_or_else(ServiceRegistry::global);
        let resources = self.resources.or_else(|| {
            self.config
                .resources
                .base_dir
                .as_ref()
                .map(|dir| Arc::new(DirectoryLoader::new(dir.clone())) as Arc<dyn ResourceLoader>)
        });
        let context = Arc::new(ExecutionContext::new(
            id,
            resources,
            self.config.resources.cache_properties,
        ));
        let cache = ServiceCache::root(
            Arc::clone(&registry),
            id,
            self.config.locking.poll_interval(),
        );
        Application {
            id,
            context,
            registry,
            cache,
            startup: self.startup,
            params: self.params,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("params", &self.params)
            .field("config", &self.config)
            .finish()
    }
}
