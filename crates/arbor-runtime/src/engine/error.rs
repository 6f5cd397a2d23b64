//! Engine Layer Errors.
//!
//! All errors implement [`ErrorCode`] for standardized handling.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`EngineError::Inactive`] | `ENGINE_INACTIVE_INSTANCE` | No |
//! | [`EngineError::ApplicationNotRunning`] | `ENGINE_APPLICATION_NOT_RUNNING` | No |
//! | [`EngineError::NoRootController`] | `ENGINE_NO_ROOT_CONTROLLER` | No |
//! | [`EngineError::RootControllerAlreadySet`] | `ENGINE_ROOT_CONTROLLER_ALREADY_SET` | No |
//! | [`EngineError::NoInitialState`] | `ENGINE_NO_INITIAL_STATE` | No |
//! | [`EngineError::NoCurrentState`] | `ENGINE_NO_CURRENT_STATE` | No |
//! | [`EngineError::InitialStateAlreadyAdded`] | `ENGINE_INITIAL_STATE_ALREADY_ADDED` | No |
//! | [`EngineError::DuplicateState`] | `ENGINE_DUPLICATE_STATE` | No |
//! | [`EngineError::StateNotFound`] | `ENGINE_STATE_NOT_FOUND` | No |
//! | [`EngineError::DuplicateProcessor`] | `ENGINE_DUPLICATE_PROCESSOR` | No |
//! | [`EngineError::DuplicateChildController`] | `ENGINE_DUPLICATE_CHILD_CONTROLLER` | No |
//! | [`EngineError::ChildControllerNotFound`] | `ENGINE_CHILD_CONTROLLER_NOT_FOUND` | No |
//! | [`EngineError::ViewEventNotHandled`] | `ENGINE_VIEW_EVENT_NOT_HANDLED` | No |
//! | [`EngineError::ChildEventNotHandled`] | `ENGINE_CHILD_EVENT_NOT_HANDLED` | No |
//! | [`EngineError::NoParentController`] | `ENGINE_NO_PARENT_CONTROLLER` | No |
//! | [`EngineError::OutputNotFound`] | `ENGINE_OUTPUT_NOT_FOUND` | No |
//! | [`EngineError::NullOutput`] | `ENGINE_NULL_OUTPUT` | Yes |
//! | [`EngineError::ResourceNotFound`] | `ENGINE_RESOURCE_NOT_FOUND` | No |
//! | [`EngineError::ResourceUnreadable`] | `ENGINE_RESOURCE_UNREADABLE` | Yes |
//! | [`EngineError::PropertyNotFound`] | `ENGINE_PROPERTY_NOT_FOUND` | No |
//! | [`EngineError::Validation`] | `ENGINE_VALIDATION` | Yes |
//! | [`EngineError::Service`] | `ENGINE_SERVICE` | Inherited |
//! | [`EngineError::Failed`] | `ENGINE_HOOK_FAILED` | No |
//!
//! # Recoverability
//!
//! Validation problems are fixed by the caller correcting its input.
//! Everything else is either a static wiring mistake (unknown state or
//! service names) or a contract violation by the application built on the
//! engine, and will fail again on retry.
//!
//! Lock contention never shows up here: a lock attempt that times out
//! returns `Ok(None)`.

use crate::tree::Channel;
use arbor_service::ServiceError;
use arbor_types::{ErrorCode, ValidationError};
use thiserror::Error;

/// Engine layer error.
///
/// # Example
///
/// ```
/// use arbor_runtime::EngineError;
/// use arbor_types::ErrorCode;
///
/// let err = EngineError::NoRootController;
/// assert_eq!(err.code(), "ENGINE_NO_ROOT_CONTROLLER");
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An operation was invoked on a destroyed or not yet started instance.
    #[error("{kind} '{name}' is not active")]
    Inactive { kind: &'static str, name: String },

    /// The application has not been started or has been stopped.
    #[error("application not running")]
    ApplicationNotRunning,

    /// The startup hook returned without setting a root controller.
    #[error("application could not start because it has no root controller")]
    NoRootController,

    /// The startup hook set a second root controller.
    #[error("root controller already set")]
    RootControllerAlreadySet,

    /// A controller's startup hook returned without adding an initial state.
    #[error("controller '{controller}' did not add an initial state")]
    NoInitialState { controller: String },

    /// A started controller has no current state.
    #[error("controller '{controller}' has no current state")]
    NoCurrentState { controller: String },

    /// `add_initial_state` was called on a controller that already has states.
    #[error("initial state already added to controller '{controller}'")]
    InitialStateAlreadyAdded { controller: String },

    /// A state name was registered twice on one controller.
    #[error("state '{state}' already added to controller '{controller}'")]
    DuplicateState { controller: String, state: String },

    /// A transition named a state the controller does not have.
    #[error("transition destination state '{state}' not found in controller '{controller}'")]
    StateNotFound { controller: String, state: String },

    /// An event processor name was registered twice on one channel.
    #[error("{channel} event processor '{event}' already added to state '{state}'")]
    DuplicateProcessor {
        channel: Channel,
        event: String,
        state: String,
    },

    /// A child controller name was used twice within one state.
    #[error("child controller '{controller}' already added to state '{state}'")]
    DuplicateChildController { state: String, controller: String },

    /// No child controller with this name exists in the state.
    #[error("child controller '{controller}' not found in state '{state}'")]
    ChildControllerNotFound { state: String, controller: String },

    /// The current state has no view processor for the event.
    #[error("view event '{event}' not handled by state '{state}' of controller '{path}'")]
    ViewEventNotHandled {
        event: String,
        state: String,
        path: String,
    },

    /// A child event bubbled past the root without being handled.
    #[error("child controller event '{event}' from '{source_path}' not handled")]
    ChildEventNotHandled { event: String, source_path: String },

    /// A child event was fired from the root controller.
    #[error("event '{event}' not handled: controller '{controller}' has no parent")]
    NoParentController { controller: String, event: String },

    /// An output was read before being written.
    #[error("output '{output}' not found on controller '{controller}'")]
    OutputNotFound { controller: String, output: String },

    /// An output was written with a `null` value.
    #[error("tried to write null value to output '{output}'")]
    NullOutput { output: String },

    /// The resource loader has no such file.
    #[error("resource '{file}' not found")]
    ResourceNotFound { file: String },

    /// The resource exists but could not be read.
    #[error("failed to read resource '{file}': {message}")]
    ResourceUnreadable { file: String, message: String },

    /// The property file has no such property.
    #[error("property '{property}' not found in '{file}'")]
    PropertyNotFound { file: String, property: String },

    /// Malformed name or parameter.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Service lookup or locking protocol violation.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// An application hook reported a failure of its own.
    #[error("{0}")]
    Failed(String),
}

impl EngineError {
    /// Creates an error for an application hook failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn inactive(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Inactive {
            kind,
            name: name.into(),
        }
    }
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::Inactive { .. } => "ENGINE_INACTIVE_INSTANCE",
            Self::ApplicationNotRunning => "ENGINE_APPLICATION_NOT_RUNNING",
            Self::NoRootController => "ENGINE_NO_ROOT_CONTROLLER",
            Self::RootControllerAlreadySet => "ENGINE_ROOT_CONTROLLER_ALREADY_SET",
            Self::NoInitialState { .. } => "ENGINE_NO_INITIAL_STATE",
            Self::NoCurrentState { .. } => "ENGINE_NO_CURRENT_STATE",
            Self::InitialStateAlreadyAdded { .. } => "ENGINE_INITIAL_STATE_ALREADY_ADDED",
            Self::DuplicateState { .. } => "ENGINE_DUPLICATE_STATE",
            Self::StateNotFound { .. } => "ENGINE_STATE_NOT_FOUND",
            Self::DuplicateProcessor { .. } => "ENGINE_DUPLICATE_PROCESSOR",
            Self::DuplicateChildController { .. } => "ENGINE_DUPLICATE_CHILD_CONTROLLER",
            Self::ChildControllerNotFound { .. } => "ENGINE_CHILD_CONTROLLER_NOT_FOUND",
            Self::ViewEventNotHandled { .. } => "ENGINE_VIEW_EVENT_NOT_HANDLED",
            Self::ChildEventNotHandled { .. } => "ENGINE_CHILD_EVENT_NOT_HANDLED",
            Self::NoParentController { .. } => "ENGINE_NO_PARENT_CONTROLLER",
            Self::OutputNotFound { .. } => "ENGINE_OUTPUT_NOT_FOUND",
            Self::NullOutput { .. } => "ENGINE_NULL_OUTPUT",
            Self::ResourceNotFound { .. } => "ENGINE_RESOURCE_NOT_FOUND",
            Self::ResourceUnreadable { .. } => "ENGINE_RESOURCE_UNREADABLE",
            Self::PropertyNotFound { .. } => "ENGINE_PROPERTY_NOT_FOUND",
            Self::Validation(_) => "ENGINE_VALIDATION",
            Self::Service(_) => "ENGINE_SERVICE",
            Self::Failed(_) => "ENGINE_HOOK_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::NullOutput { .. } | Self::ResourceUnreadable { .. } => true,
            Self::Service(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::assert_error_codes;

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn all_variants() -> Vec<EngineError> {
        vec![
            EngineError::inactive("controller", "root"),
            EngineError::ApplicationNotRunning,
            EngineError::NoRootController,
            EngineError::RootControllerAlreadySet,
            EngineError::NoInitialState { controller: s("c") },
            EngineError::NoCurrentState { controller: s("c") },
            EngineError::InitialStateAlreadyAdded { controller: s("c") },
            EngineError::DuplicateState {
                controller: s("c"),
                state: s("listing"),
            },
            EngineError::StateNotFound {
                controller: s("c"),
                state: s("editing"),
            },
            EngineError::DuplicateProcessor {
                channel: Channel::View,
                event: s("edit"),
                state: s("listing"),
            },
            EngineError::DuplicateChildController {
                state: s("listing"),
                controller: s("row"),
            },
            EngineError::ChildControllerNotFound {
                state: s("listing"),
                controller: s("row"),
            },
            EngineError::ViewEventNotHandled {
                event: s("edit"),
                state: s("listing"),
                path: s("root.c"),
            },
            EngineError::ChildEventNotHandled {
                event: s("saved"),
                source_path: s("c.row"),
            },
            EngineError::NoParentController {
                controller: s("root"),
                event: s("saved"),
            },
            EngineError::OutputNotFound {
                controller: s("c"),
                output: s("rows"),
            },
            EngineError::NullOutput { output: s("rows") },
            EngineError::ResourceNotFound { file: s("a.txt") },
            EngineError::ResourceUnreadable {
                file: s("a.txt"),
                message: s("denied"),
            },
            EngineError::PropertyNotFound {
                file: s("a.properties"),
                property: s("title"),
            },
            EngineError::Validation(ValidationError::EmptyName { kind: "state" }),
            EngineError::Service(ServiceError::NotLocked { name: s("S") }),
            EngineError::failed("boom"),
        ]
    }

    #[test]
    fn all_codes_are_valid() {
        assert_error_codes(&all_variants(), "ENGINE_");
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = all_variants().iter().map(ErrorCode::code).collect();
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }

    #[test]
    fn recoverability() {
        assert!(EngineError::Validation(ValidationError::EmptyName { kind: "x" }).is_recoverable());
        assert!(!EngineError::NoRootController.is_recoverable());
        assert!(!EngineError::Service(ServiceError::AlreadyHeld { name: s("S") }).is_recoverable());
        assert!(
            EngineError::Service(ServiceError::InvalidName(ValidationError::EmptyName {
                kind: "service"
            }))
            .is_recoverable()
        );
    }

    #[test]
    fn view_event_error_names_everything() {
        let err = EngineError::ViewEventNotHandled {
            event: s("edit"),
            state: s("listing"),
            path: s("root.contacts"),
        };
        let msg = err.to_string();
        assert!(msg.contains("edit"));
        assert!(msg.contains("listing"));
        assert!(msg.contains("root.contacts"));
    }

    #[test]
    fn from_conversions() {
        let err: EngineError = ValidationError::MissingParam { name: s("id") }.into();
        assert_eq!(err.code(), "ENGINE_VALIDATION");
        assert_eq!(err.to_string(), "parameter 'id' not found");

        let err: EngineError = ServiceError::UnknownService { name: s("S") }.into();
        assert_eq!(err.code(), "ENGINE_SERVICE");
    }
}
