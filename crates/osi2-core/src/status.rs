//! Outcomes and errors of the control API operations.
//!
//! Every outcome and error maps onto the integer status protocol through
//! `code()`: negative codes are failures, 0 is plain success and positive
//! codes are successes with a caveat.

use crate::plugin::PluginError;

/// Successful [`load`](crate::ControlApi::load).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Library loaded and recorded.
    Loaded,
    /// Short name already registered; nothing was done.
    AlreadyRegistered,
    /// The plugin manager had the library loaded already; it is now recorded.
    LoadedUnregistered,
}

impl LoadOutcome {
    pub fn code(self) -> i32 {
        match self {
            LoadOutcome::Loaded => 0,
            LoadOutcome::AlreadyRegistered | LoadOutcome::LoadedUnregistered => 1,
        }
    }
}

/// Successful [`unload`](crate::ControlApi::unload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    /// Library unloaded and its record removed.
    Unloaded,
    /// The plugin manager did not have the library loaded; the stale record
    /// was removed.
    NotLoaded,
}

impl UnloadOutcome {
    pub fn code(self) -> i32 {
        match self {
            UnloadOutcome::Unloaded => 0,
            UnloadOutcome::NotLoaded => 1,
        }
    }
}

/// Successful [`create_object`](crate::ControlApi::create_object).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A library restriction was requested but its short name is not
    /// registered, so any library could supply the object.
    RestrictionIgnored,
}

impl CreateOutcome {
    pub fn code(self) -> i32 {
        match self {
            CreateOutcome::Created => 0,
            CreateOutcome::RestrictionIgnored => 1,
        }
    }
}

/// Successful [`destroy_object`](crate::ControlApi::destroy_object).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Destroyed,
    /// Destroyed, but the object was never attributed to a single library.
    Unattributed,
}

impl DestroyOutcome {
    pub fn code(self) -> i32 {
        match self {
            DestroyOutcome::Destroyed => 0,
            DestroyOutcome::Unattributed => 1,
        }
    }
}

/// Load errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Short name must not be empty")]
    InvalidShortName,

    #[error("Unable to locate the plugin manager")]
    NoPluginManager,

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl LoadError {
    pub fn code(&self) -> i32 {
        match self {
            LoadError::InvalidShortName => -5,
            LoadError::NoPluginManager => -4,
            LoadError::Plugin(e) => e.code(),
        }
    }
}

/// Unload errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnloadError {
    #[error("No library is registered as \"{0}\"")]
    NotRegistered(String),

    #[error("Unable to locate the plugin manager")]
    NoPluginManager,

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl UnloadError {
    pub fn code(&self) -> i32 {
        match self {
            UnloadError::NotRegistered(_) => 2,
            UnloadError::NoPluginManager => -2,
            UnloadError::Plugin(_) => -1,
        }
    }
}

/// Object creation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateError {
    #[error("Unable to locate the plugin manager")]
    NoPluginManager,

    #[error("Failed to create {api} object{}", from_library(.library))]
    CreateFailed {
        api: String,
        library: Option<String>,
    },
}

impl CreateError {
    pub fn code(&self) -> i32 {
        match self {
            CreateError::NoPluginManager => -2,
            CreateError::CreateFailed { .. } => -1,
        }
    }
}

fn from_library(library: &Option<String>) -> String {
    library
        .as_ref()
        .map(|name| format!(" from library \"{}\"", name))
        .unwrap_or_default()
}

/// Object destruction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestroyError {
    /// The object was not created by a control API, or was already destroyed.
    #[error("Object carries no identity")]
    NoIdentity,

    #[error("Unable to locate the plugin manager")]
    NoPluginManager,

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl DestroyError {
    pub fn code(&self) -> i32 {
        match self {
            DestroyError::NoIdentity => -3,
            DestroyError::NoPluginManager => -2,
            DestroyError::Plugin(_) => -1,
        }
    }
}

/// Integer status of an operation result.
pub trait StatusCode {
    fn code(&self) -> i32;
}

macro_rules! impl_status_code {
    ($($outcome:ty => $error:ty),* $(,)?) => {
        $(
            impl StatusCode for $outcome {
                fn code(&self) -> i32 {
                    <$outcome>::code(*self)
                }
            }

            impl StatusCode for $error {
                fn code(&self) -> i32 {
                    <$error>::code(self)
                }
            }
        )*
    };
}

impl_status_code! {
    LoadOutcome => LoadError,
    UnloadOutcome => UnloadError,
    CreateOutcome => CreateError,
    DestroyOutcome => DestroyError,
}

/// A created object paired with its outcome.
impl<T> StatusCode for (T, CreateOutcome) {
    fn code(&self) -> i32 {
        self.1.code()
    }
}

impl<T: StatusCode, E: StatusCode> StatusCode for Result<T, E> {
    fn code(&self) -> i32 {
        match self {
            Ok(outcome) => outcome.code(),
            Err(err) => err.code(),
        }
    }
}
