#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! Only programming errors are represented here: nothing in the runtime is
//! transiently fallible, so there is no retry classification.

use std::fmt;

use crate::component::ComponentId;

/// Errors from watch registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerError {
    /// `watch` was called with no branches. Use `watch_all` to observe every
    /// branch.
    EmptyBranchSet,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBranchSet => write!(f, "cannot watch an empty set of branches"),
        }
    }
}

impl std::error::Error for TrackerError {}

/// Lifecycle misuse of a component binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingError {
    /// A hook that requires a mounted component was called before `mount`
    /// or after `unmount`.
    NotMounted {
        component: ComponentId,
        hook: &'static str,
    },
    /// `mount` was called twice without an `unmount` in between.
    AlreadyMounted { component: ComponentId },
    /// The component's dependency declaration was rejected by the tracker.
    Watch(TrackerError),
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMounted { component, hook } => {
                write!(f, "component {component}: `{hook}` called while not mounted")
            }
            Self::AlreadyMounted { component } => {
                write!(f, "component {component} is already mounted")
            }
            Self::Watch(err) => write!(f, "invalid dependency declaration: {err}"),
        }
    }
}

impl std::error::Error for BindingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Watch(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TrackerError> for BindingError {
    fn from(err: TrackerError) -> Self {
        Self::Watch(err)
    }
}

/// Errors raised by the [`Actions`](crate::actions::Actions) registry itself.
///
/// Errors returned by action handlers are passed through untouched and never
/// wrapped in this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionError {
    /// No handler is registered under this name.
    UnknownAction(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAction(name) => write!(f, "unknown action: {name}"),
        }
    }
}

impl std::error::Error for ActionError {}

/// Errors from loading or validating a [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// A field holds a value outside its allowed range.
    Invalid { field: &'static str, reason: String },
    /// The config file could not be read.
    Io(std::io::Error),
    /// The config text could not be parsed.
    Parse(String),
    /// The file extension is neither `.toml` nor `.json`.
    UnsupportedFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { field, reason } => write!(f, "invalid config field `{field}`: {reason}"),
            Self::Io(err) => write!(f, "config read failed: {err}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::UnsupportedFormat(ext) => write!(f, "unsupported config format: {ext}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
