//! Resources and properties available to controllers.
//!
//! Every controller resolves resource files through one
//! [`ResourceLoader`]: its own ([`Controller::resources`]) if it has one,
//! otherwise the application-wide loader. Property files are parsed into
//! [`PropertySet`]s and, unless disabled in
//! [`ResourcesConfig`](crate::config::ResourcesConfig), kept per controller
//! so a file is parsed once per controller lifetime.
//!
//! [`Controller::resources`]: crate::Controller::resources

mod loader;
mod properties;

pub use loader::{DirectoryLoader, MemoryLoader, Resource, ResourceLoader};
pub use properties::{PropertyLocator, PropertySet};

use crate::EngineError;
use arbor_types::validate_name;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-controller resource access with a property set cache.
pub(crate) struct ResourceAccessor {
    loader: Option<Arc<dyn ResourceLoader>>,
    cache_properties: bool,
    properties: Mutex<HashMap<String, Arc<PropertySet>>>,
}

impl ResourceAccessor {
    pub(crate) fn new(loader: Option<Arc<dyn ResourceLoader>>, cache_properties: bool) -> Self {
        Self {
            loader,
            cache_properties,
            properties: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn resource(&self, file: &str) -> Result<Resource, EngineError> {
        let file = validate_name(file, "resource")?;
        let Some(loader) = self.loader.as_ref() else {
            return Err(EngineError::ResourceNotFound { file });
        };
        match loader.load(&file) {
            Ok(Some(bytes)) => Ok(Resource::new(file, bytes)),
            Ok(None) => Err(EngineError::ResourceNotFound { file }),
            Err(e) => Err(EngineError::ResourceUnreadable {
                file,
                message: e.to_string(),
            }),
        }
    }

    pub(crate) fn properties(&self, file: &str) -> Result<Arc<PropertySet>, EngineError> {
        let file = validate_name(file, "property file")?;
        if let Some(cached) = self.properties.lock().get(&file) {
            return Ok(Arc::clone(cached));
        }

        let resource = self.resource(&file)?;
        let text = String::from_utf8_lossy(resource.as_bytes());
        let set = Arc::new(PropertySet::parse(file.clone(), &text));
        if self.cache_properties {
            self.properties.lock().insert(file, Arc::clone(&set));
        }
        Ok(set)
    }

    pub(crate) fn property(&self, locator: &str) -> Result<String, EngineError> {
        let locator = PropertyLocator::parse(locator)?;
        let set = self.properties(&locator.file)?;
        set.get(&locator.property)
            .map(str::to_string)
            .ok_or(EngineError::PropertyNotFound {
                file: locator.file,
                property: locator.property,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        inner: MemoryLoader,
        loads: AtomicUsize,
    }

    impl ResourceLoader for CountingLoader {
        fn load(&self, file_name: &str) -> io::Result<Option<Vec<u8>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(file_name)
        }
    }

    struct BrokenLoader;

    impl ResourceLoader for BrokenLoader {
        fn load(&self, _file_name: &str) -> io::Result<Option<Vec<u8>>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    fn counting() -> Arc<CountingLoader> {
        Arc::new(CountingLoader {
            inner: MemoryLoader::new()
                .with_file("labels.properties", "title = Contacts\n")
                .with_file("list.html", "<ul></ul>"),
            loads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn resource_lookup() {
        let accessor = ResourceAccessor::new(Some(counting()), true);
        let resource = accessor.resource("list.html").unwrap();
        assert_eq!(resource.as_str(), Some("<ul></ul>"));

        assert_eq!(
            accessor.resource("missing.html").unwrap_err(),
            EngineError::ResourceNotFound {
                file: "missing.html".into()
            }
        );
    }

    #[test]
    fn no_loader_means_not_found() {
        let accessor = ResourceAccessor::new(None, true);
        assert!(matches!(
            accessor.resource("list.html"),
            Err(EngineError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn unreadable_resource() {
        let accessor = ResourceAccessor::new(Some(Arc::new(BrokenLoader)), true);
        assert!(matches!(
            accessor.resource("x"),
            Err(EngineError::ResourceUnreadable { .. })
        ));
    }

    #[test]
    fn property_by_locator() {
        let accessor = ResourceAccessor::new(Some(counting()), true);
        assert_eq!(
            accessor.property("labels.properties:title").unwrap(),
            "Contacts"
        );
        assert_eq!(
            accessor.property("labels.properties:subtitle").unwrap_err(),
            EngineError::PropertyNotFound {
                file: "labels.properties".into(),
                property: "subtitle".into()
            }
        );
        assert!(matches!(
            accessor.property("labels.properties"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn property_sets_are_cached() {
        let loader = counting();
        let accessor = ResourceAccessor::new(Some(loader.clone()), true);

        accessor.property("labels.properties:title").unwrap();
        accessor.property("labels.properties:title").unwrap();
        let set = accessor.properties("labels.properties").unwrap();

        assert_eq!(set.get("title"), Some("Contacts"));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn caching_can_be_disabled() {
        let loader = counting();
        let accessor = ResourceAccessor::new(Some(loader.clone()), false);

        accessor.property("labels.properties:title").unwrap();
        accessor.property("labels.properties:title").unwrap();

        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }
}
