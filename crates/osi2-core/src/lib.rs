//! Control registry for Osi2 solver shims.
//!
//! [`ControlApi`] lets an application refer to a solver library by a short
//! name, load it once through the process-wide plugin manager, create objects
//! implementing a named API and destroy them again through the library that
//! produced them.

pub mod api;
pub mod config;
pub mod control;
pub mod message;
pub mod plugin;
pub mod status;

pub use api::{Api, ApiObject, ObjectAdapter, ObjectIdentity, PassThrough};
pub use config::{ConfigError, Osi2Config};
pub use control::{ControlApi, LibraryRecord, UNKNOWN_LIB};
pub use message::{ControlMessage, Diagnostic, HandlerRef, MessageHandler, Severity, Sink};
pub use plugin::{
    NativePluginManager, PluginError, PluginManager, PluginUniqueId, SharedPluginManager,
};
pub use status::{
    CreateError, CreateOutcome, DestroyError, DestroyOutcome, LoadError, LoadOutcome,
    StatusCode, UnloadError, UnloadOutcome,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::api::{Api, ApiObject};
    pub use crate::config::{env_vars, Osi2Config};
    pub use crate::control::ControlApi;
    pub use crate::message::{HandlerRef, MessageHandler};
    pub use crate::plugin::{PluginManager, PluginUniqueId, SharedPluginManager};
    pub use crate::status::StatusCode;
}
