//! Integration tests for application lifecycle, listeners, lookups and
//! resources.

mod common;

use arbor_runtime::config::{ConfigLoader, RuntimeConfig};
use arbor_runtime::resource::MemoryLoader;
use arbor_runtime::{
    controller_fn, startup_fn, state_fn, Application, ApplicationListener, Controller,
    ControllerContext, ControllerHandle, EngineError, ResourceLoader,
};
use arbor_types::{ApplicationId, Params};
use common::{app_with_root, idle_controller, init_tracing, registry, Log};
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

struct Recorder(Log);

impl ApplicationListener for Recorder {
    fn application_starting(&self, _app: &ApplicationId) {
        self.0.push("app:starting");
    }

    fn controller_starting(&self, controller: &ControllerHandle) {
        self.0.push(format!("starting:{}", controller.name()));
    }

    fn controller_updated(&self, controller: &ControllerHandle) {
        self.0.push(format!("updated:{}", controller.name()));
    }

    fn controller_stopping(&self, controller: &ControllerHandle) {
        self.0.push(format!("stopping:{}", controller.name()));
    }

    fn application_stopping(&self, _app: &ApplicationId) {
        self.0.push("app:stopping");
    }

    fn application_destroying(&self, _app: &ApplicationId) {
        self.0.push("app:destroying");
    }
}

/// Root `r` in state `main` owning one idle child `c`.
fn parent_and_child() -> impl Controller {
    controller_fn(|ctx| {
        ctx.add_initial_state(
            "main",
            state_fn(|s| {
                s.add_child_controller("c", idle_controller(), Params::new())?;
                Ok(())
            }),
            Params::new(),
        )
    })
}

fn recorded_app() -> (Application, Log) {
    let log = Log::new();
    let app = app_with_root(&registry(), parent_and_child);
    app.add_listener(Arc::new(Recorder(log.clone())));
    (app, log)
}

// =============================================================================
// Lifecycle notifications
// =============================================================================

#[test]
fn start_and_stop_notify_in_order() {
    init_tracing();
    let (app, log) = recorded_app();

    app.start().unwrap();
    assert_eq!(
        log.entries(),
        vec![
            "app:starting",
            "starting:r",
            "starting:c",
            "updated:c",
            "updated:r",
        ]
    );

    log.clear();
    app.stop();
    assert_eq!(log.entries(), vec!["app:stopping", "stopping:r", "stopping:c"]);
}

#[test]
fn stop_is_a_noop_when_not_running() {
    init_tracing();
    let (app, log) = recorded_app();
    app.stop();
    assert!(log.entries().is_empty());
}

#[test]
fn destroy_running_application() {
    init_tracing();
    let (app, log) = recorded_app();
    app.start().unwrap();
    log.clear();

    app.destroy();

    assert_eq!(
        log.entries(),
        vec!["app:stopping", "app:destroying", "stopping:r", "stopping:c"]
    );
    assert!(!app.is_active());
}

#[test]
fn destroy_stopped_application() {
    init_tracing();
    let (app, log) = recorded_app();
    app.destroy();
    assert_eq!(log.entries(), vec!["app:destroying"]);
}

#[test]
fn listeners_are_notified_in_registration_order() {
    init_tracing();
    let app = app_with_root(&registry(), idle_controller);
    let log = Log::new();

    struct Tagged(&'static str, Log);
    impl ApplicationListener for Tagged {
        fn application_starting(&self, _app: &ApplicationId) {
            self.1.push(self.0);
        }
    }

    let first: Arc<dyn ApplicationListener> = Arc::new(Tagged("first", log.clone()));
    let second: Arc<dyn ApplicationListener> = Arc::new(Tagged("second", log.clone()));
    app.add_listener(Arc::clone(&first));
    app.add_listener(Arc::clone(&second));
    app.add_listener(Arc::clone(&first));

    app.start().unwrap();
    assert_eq!(log.entries(), vec!["first", "second"]);

    log.clear();
    app.remove_listener(&first);
    app.restart().unwrap();
    assert_eq!(log.entries(), vec!["second"]);
}

#[test]
fn output_writes_notify_updates() {
    init_tracing();
    let log = Log::new();
    let app = app_with_root(&registry(), || {
        controller_fn(|ctx| {
            ctx.add_initial_state(
                "main",
                state_fn(|s| {
                    s.set_output("a", 1)?;
                    s.set_output("b", 2)
                }),
                Params::new(),
            )
        })
    });
    app.add_listener(Arc::new(Recorder(log.clone())));
    app.start().unwrap();

    let updates = log
        .entries()
        .into_iter()
        .filter(|e| e == "updated:r")
        .count();
    // two outputs plus entering the initial state
    assert_eq!(updates, 3);
}

// =============================================================================
// Restart and lookups
// =============================================================================

#[test]
fn restart_builds_a_fresh_tree() {
    init_tracing();
    let app = app_with_root(&registry(), parent_and_child);
    app.start().unwrap();
    let old_child = app.controller_on_path("r.c").unwrap().expect("child");

    app.restart().unwrap();
    let new_child = app.controller_on_path("r.c").unwrap().expect("child");

    assert!(!old_child.is_active());
    assert!(new_child.is_active());
    assert_ne!(old_child.id(), new_child.id());
    assert!(app.controller_by_id(old_child.id()).unwrap().is_none());
    assert_eq!(app.controller_by_id(new_child.id()).unwrap(), Some(new_child));
}

#[test]
fn lookups_fail_when_not_running() {
    init_tracing();
    let app = app_with_root(&registry(), parent_and_child);
    assert_eq!(
        app.controller_on_path("r").unwrap_err(),
        EngineError::ApplicationNotRunning
    );
    assert_eq!(app.restart().unwrap_err(), EngineError::ApplicationNotRunning);

    app.start().unwrap();
    app.stop();
    assert!(app.controller_on_path("r").is_err());
    assert!(app.root_controller().is_err());
}

#[test]
fn startup_reads_application_params() {
    init_tracing();
    let app = Application::builder(startup_fn(|ctx| {
        let title = ctx.param("title")?.as_str().unwrap_or_default().to_string();
        ctx.set_root_controller(
            &title,
            idle_controller(),
            Params::new(),
        )?;
        Ok(())
    }))
    .registry(registry())
    .params(Params::new().with("title", "contacts").unwrap())
    .build();

    app.start().unwrap();
    assert_eq!(app.root_controller().unwrap().name(), "contacts");
    assert!(app.controller_on_path("contacts").unwrap().is_some());
}

// =============================================================================
// Resources
// =============================================================================

struct OwnResources;

impl Controller for OwnResources {
    fn on_start(&self, ctx: &ControllerContext) -> Result<(), EngineError> {
        ctx.add_initial_state("idle", state_fn(|_| Ok(())), Params::new())
    }

    fn resources(&self) -> Option<Arc<dyn ResourceLoader>> {
        Some(Arc::new(
            MemoryLoader::new().with_file("labels.properties", "title = Own\n"),
        ))
    }
}

#[test]
fn controllers_read_application_resources() {
    init_tracing();
    let loader = MemoryLoader::new()
        .with_file("labels.properties", "title = Contacts\nempty.list: No contacts\n")
        .with_file("list.html", "<ul></ul>");
    let app = Application::builder(startup_fn(|ctx| {
        ctx.set_root_controller("r", idle_controller(), Params::new())?;
        Ok(())
    }))
    .registry(registry())
    .resources(Arc::new(loader))
    .build();
    app.start().unwrap();
    let root = app.root_controller().unwrap();

    assert_eq!(root.property("labels.properties:title").unwrap(), "Contacts");
    assert_eq!(
        root.property("labels.properties:empty.list").unwrap(),
        "No contacts"
    );
    assert_eq!(root.resource("list.html").unwrap().as_str(), Some("<ul></ul>"));
    assert!(matches!(
        root.property("labels.properties:missing"),
        Err(EngineError::PropertyNotFound { .. })
    ));
    assert!(matches!(
        root.resource("nope.html"),
        Err(EngineError::ResourceNotFound { .. })
    ));
}

#[test]
fn controller_loader_overrides_application_loader() {
    init_tracing();
    let app = Application::builder(startup_fn(|ctx| {
        ctx.set_root_controller("r", OwnResources, Params::new())?;
        Ok(())
    }))
    .registry(registry())
    .resources(Arc::new(
        MemoryLoader::new().with_file("labels.properties", "title = App\n"),
    ))
    .build();
    app.start().unwrap();

    let root = app.root_controller().unwrap();
    assert_eq!(root.property("labels.properties:title").unwrap(), "Own");
}

#[test]
fn directory_resources_from_config() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), "hello").unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[resources]\nbase_dir = {:?}\n\n[locking]\npoll_interval_ms = 20\n",
            dir.path().to_string_lossy()
        ),
    )
    .unwrap();

    let config: RuntimeConfig = ConfigLoader::new()
        .skip_global_config()
        .skip_env_vars()
        .with_file(&config_path)
        .load()
        .unwrap();
    assert_eq!(config.locking.poll_interval_ms, 20);

    let app = Application::builder(startup_fn(|ctx| {
        ctx.set_root_controller("r", idle_controller(), Params::new())?;
        Ok(())
    }))
    .registry(registry())
    .config(config)
    .build();
    app.start().unwrap();

    let root = app.root_controller().unwrap();
    assert_eq!(root.resource("greeting.txt").unwrap().as_str(), Some("hello"));
    assert!(matches!(
        root.resource("../escape.txt"),
        Err(EngineError::ResourceUnreadable { .. })
    ));
}

#[test]
fn resources_unavailable_after_destroy() {
    init_tracing();
    let app = Application::builder(startup_fn(|ctx| {
        ctx.set_root_controller("r", idle_controller(), Params::new())?;
        Ok(())
    }))
    .registry(registry())
    .resources(Arc::new(MemoryLoader::new().with_file("a.txt", "a")))
    .build();
    app.start().unwrap();
    let root = app.root_controller().unwrap();
    app.stop();

    assert!(matches!(
        root.resource("a.txt"),
        Err(EngineError::Inactive { .. })
    ));
}
