//! Plugin manager boundary.
//!
//! The control API never opens a shared library itself. Everything that
//! touches a library (open, init, object construction, close) goes through a
//! [`PluginManager`]. One manager serves the whole process; it is installed
//! once with [`install`] and found again with [`instance`].
//!
//! [`NativePluginManager`] is the `libloading` implementation.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::api::{Api, ObjectAdapter};

pub mod native;

pub use native::{
    ExitPluginFn, InitPluginFn, NativePluginManager, ObjectParams, PluginRegistrar,
    RegisterParams, EXIT_SYMBOL, INIT_SYMBOL,
};

/// Result type for plugin manager operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Process-unique identifier of one loaded library.
///
/// Assigned by the plugin manager at load time and stable until unload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginUniqueId(NonZeroU64);

impl PluginUniqueId {
    /// Wrap a raw identifier. Zero is reserved for "no library".
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for PluginUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Successful outcome of [`PluginManager::load_one_lib`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Library opened and initialised.
    Loaded,
    /// Library was already loaded; the existing identifier is returned.
    AlreadyLoaded,
}

impl LoadState {
    /// Integer status code.
    pub fn code(self) -> i32 {
        match self {
            LoadState::Loaded => 0,
            LoadState::AlreadyLoaded => 1,
        }
    }
}

/// Successful outcome of [`PluginManager::unload_one_lib`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadState {
    /// Exit function ran and the library was closed.
    Unloaded,
    /// No library is loaded under that path.
    NotLoaded,
}

impl UnloadState {
    /// Integer status code.
    pub fn code(self) -> i32 {
        match self {
            UnloadState::Unloaded => 0,
            UnloadState::NotLoaded => 1,
        }
    }
}

/// Plugin manager errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// The shared library could not be opened.
    #[error("Failed to load library {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// The library does not export an init function.
    #[error("Library {0} has no init function")]
    NoInitFunc(String),

    /// The init function reported failure.
    #[error("Init function of {path} failed with status {status}")]
    InitFailed { path: String, status: i32 },

    /// The exit function reported failure; the library stays loaded.
    #[error("Exit function of {path} failed with status {status}")]
    ExitFailed { path: String, status: i32 },

    /// Objects created by the library are still alive; the library stays loaded.
    #[error("Library {path} still owns {count} live object(s)")]
    ObjectsOutstanding { path: String, count: usize },

    /// No loaded library registered the API (for the given library, if any).
    #[error("No library provides API {api}")]
    UnknownApi { api: String },

    /// The plugin's destroy function reported failure.
    #[error("Destroy function for API {api} failed with status {status}")]
    DestroyFailed { api: String, status: i32 },
}

impl PluginError {
    /// Integer status code, matching the plugin manager's numeric protocol.
    pub fn code(&self) -> i32 {
        match self {
            PluginError::LoadFailed { .. } => -1,
            PluginError::NoInitFunc(_) => -2,
            PluginError::InitFailed { .. } => -3,
            PluginError::ExitFailed { .. }
            | PluginError::ObjectsOutstanding { .. }
            | PluginError::UnknownApi { .. }
            | PluginError::DestroyFailed { .. } => -1,
        }
    }
}

/// An object freshly produced by a plugin manager.
pub struct CreatedObject {
    /// The object.
    pub object: Box<dyn Api>,
    /// The library that produced it, when the manager can tell.
    pub lib_id: Option<PluginUniqueId>,
}

impl fmt::Debug for CreatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedObject")
            .field("lib_id", &self.lib_id)
            .finish_non_exhaustive()
    }
}

/// The capability provider service the control API delegates to.
pub trait PluginManager: Send {
    /// Open `lib_name` (inside `dir`, if given) and run its init function.
    fn load_one_lib(&mut self, lib_name: &str, dir: Option<&str>)
        -> Result<(LoadState, PluginUniqueId)>;

    /// Run the exit function of `lib_name` (inside `dir`, if given) and close it.
    fn unload_one_lib(&mut self, lib_name: &str, dir: Option<&str>) -> Result<UnloadState>;

    /// Directory searched when the caller names none. May be empty.
    fn default_plugin_dir(&self) -> String;

    /// Create an object implementing `api_name`.
    ///
    /// With `lib_id` set, only that library is considered; otherwise any
    /// library registering the API may answer. `None` means no library could.
    fn create_object(
        &mut self,
        api_name: &str,
        lib_id: Option<PluginUniqueId>,
        adapter: &dyn ObjectAdapter,
    ) -> Option<CreatedObject>;

    /// Destroy an object previously produced by [`PluginManager::create_object`].
    fn destroy_object(
        &mut self,
        api_name: &str,
        lib_id: Option<PluginUniqueId>,
        object: Box<dyn Api>,
    ) -> Result<()>;
}

/// Shared handle to a plugin manager.
pub type SharedPluginManager = Arc<Mutex<dyn PluginManager>>;

static INSTANCE: OnceCell<SharedPluginManager> = OnceCell::new();

/// Wrap a manager in a shared handle.
pub fn shared<M: PluginManager + 'static>(manager: M) -> SharedPluginManager {
    Arc::new(Mutex::new(manager))
}

/// Install the process-wide plugin manager.
///
/// Fails, handing the manager back, if one is already installed.
pub fn install(manager: SharedPluginManager) -> std::result::Result<(), SharedPluginManager> {
    INSTANCE.set(manager)?;
    tracing::debug!("Process-wide plugin manager installed");
    Ok(())
}

/// The process-wide plugin manager, if one has been installed.
pub fn instance() -> Option<SharedPluginManager> {
    INSTANCE.get().cloned()
}

/// Join a directory and a library file name with the platform separator.
pub fn join_path(dir: Option<&str>, lib_name: &str) -> String {
    match dir {
        Some(dir) if !dir.is_empty() => format!("{}{}{}", dir, std::path::MAIN_SEPARATOR, lib_name),
        _ => lib_name.to_string(),
    }
}

/// Split a full path at the last platform separator into `(lib_name, dir)`.
///
/// A path whose only separator is the leading one stays whole, so that
/// [`join_path`] gives back the same string.
pub fn split_path(full_path: &str) -> (&str, Option<&str>) {
    match full_path.rfind(std::path::MAIN_SEPARATOR) {
        Some(pos) if pos > 0 => (&full_path[pos + 1..], Some(&full_path[..pos])),
        _ => (full_path, None),
    }
}
