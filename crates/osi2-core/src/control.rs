//! The control API: short-name registry and object lifecycle broker.
//!
//! A [`ControlApi`] maps caller-chosen short names onto libraries loaded by
//! the process-wide [`PluginManager`](crate::plugin::PluginManager), creates
//! objects implementing a named API (optionally from one specific library)
//! and destroys them again through the library and API recorded at creation.
//!
//! Several control APIs may coexist; they all share one plugin manager.

use std::collections::BTreeMap;
use std::fmt;

use crate::api::{ApiObject, ObjectAdapter, ObjectIdentity, PassThrough};
use crate::config::Osi2Config;
use crate::message::{ControlMessage, HandlerRef, MessageHandler};
use crate::plugin::{
    self, join_path, split_path, CreatedObject, LoadState, PluginUniqueId, SharedPluginManager,
    UnloadState,
};
use crate::status::{
    CreateError, CreateOutcome, DestroyError, DestroyOutcome, LoadError, LoadOutcome,
    UnloadError, UnloadOutcome,
};

/// Returned by reverse lookups that match no registered library.
pub const UNKNOWN_LIB: &str = "<unknown lib ID>";

/// A library registered under a short name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRecord {
    full_path: String,
    unique_id: PluginUniqueId,
}

impl LibraryRecord {
    /// Directory, separator and file name the library was loaded from.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Identifier assigned by the plugin manager.
    pub fn unique_id(&self) -> PluginUniqueId {
        self.unique_id
    }
}

/// Short-name registry over the plugin manager.
///
/// Not internally synchronised: drive one instance from one thread at a time.
/// Dropping a control API leaves its libraries loaded.
pub struct ControlApi {
    plugin_mgr: Option<SharedPluginManager>,
    known_libs: BTreeMap<String, LibraryRecord>,
    default_plugin_dir: String,
    handler: HandlerRef,
}

impl ControlApi {
    /// A control API with default configuration and its own message handler.
    pub fn new() -> Self {
        Self::from_config(&Osi2Config::default())
    }

    /// A control API configured from `config`, with its own message handler.
    pub fn from_config(config: &Osi2Config) -> Self {
        Self::with_handler(config, HandlerRef::default())
    }

    /// A control API reporting through `handler`.
    ///
    /// The configured log level is applied to owned handlers only; a borrowed
    /// handler keeps whatever level its owner gave it.
    pub fn with_handler(config: &Osi2Config, mut handler: HandlerRef) -> Self {
        if handler.is_owned() {
            handler.with(|h| h.set_log_level(config.log_level));
        }

        let mut control = Self {
            plugin_mgr: None,
            known_libs: BTreeMap::new(),
            default_plugin_dir: config.plugin_dir_or_empty().to_string(),
            handler,
        };
        control.handler.message(ControlMessage::Init, &["default"]);
        control
    }

    /// Use `manager` instead of looking up the process-wide instance.
    pub fn with_plugin_manager(mut self, manager: SharedPluginManager) -> Self {
        self.plugin_mgr = Some(manager);
        self
    }

    pub fn set_plugin_manager(&mut self, manager: SharedPluginManager) {
        self.plugin_mgr = Some(manager);
    }

    /// Replace the message handler.
    pub fn set_message_handler(&mut self, handler: HandlerRef) {
        self.handler = handler;
    }

    /// Run `f` against the message handler.
    pub fn with_message_handler<R>(&mut self, f: impl FnOnce(&mut MessageHandler) -> R) -> R {
        self.handler.with(f)
    }

    pub fn log_level(&self) -> u8 {
        self.handler.log_level()
    }

    pub fn set_log_level(&mut self, level: u8) {
        self.handler.with(|h| h.set_log_level(level));
    }

    /// This registry's own default plugin directory; empty when unset.
    pub fn default_plugin_dir(&self) -> &str {
        &self.default_plugin_dir
    }

    pub fn set_default_plugin_dir(&mut self, dir: impl Into<String>) {
        self.default_plugin_dir = dir.into();
    }

    /// Conventional library file name for a short name.
    ///
    /// `clp` becomes `libOsi2ClpShim.so` on Linux, `libOsi2ClpShim.dylib` on
    /// macOS and `libOsi2ClpShim.dll` on Windows.
    pub fn library_file_name(short_name: &str) -> String {
        let mut chars = short_name.chars();
        let capitalised: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        format!(
            "libOsi2{}Shim.{}",
            capitalised,
            std::env::consts::DLL_EXTENSION
        )
    }

    /// Load the conventionally named library for `short_name` from the
    /// default plugin directory.
    pub fn load(&mut self, short_name: &str) -> Result<LoadOutcome, LoadError> {
        if short_name.is_empty() {
            return self.reject_short_name("");
        }
        let lib_name = Self::library_file_name(short_name);
        self.load_lib(short_name, &lib_name)
    }

    /// Load `lib_name` from the default plugin directory.
    ///
    /// The directory is this registry's own default if set, else the plugin
    /// manager's default, else none.
    pub fn load_lib(&mut self, short_name: &str, lib_name: &str) -> Result<LoadOutcome, LoadError> {
        if short_name.is_empty() {
            return self.reject_short_name(lib_name);
        }

        let dir = if self.default_plugin_dir.is_empty() {
            let mgr = self.find_plugin_mgr().ok_or(LoadError::NoPluginManager)?;
            let dir = mgr.lock().default_plugin_dir();
            dir
        } else {
            self.default_plugin_dir.clone()
        };

        self.load_from(short_name, lib_name, Some(&dir))
    }

    /// Load `lib_name` from `dir` and register it as `short_name`.
    ///
    /// A short name that is already registered is never loaded again.
    pub fn load_from(
        &mut self,
        short_name: &str,
        lib_name: &str,
        dir: Option<&str>,
    ) -> Result<LoadOutcome, LoadError> {
        if short_name.is_empty() {
            return self.reject_short_name(lib_name);
        }

        if self.known_libs.contains_key(short_name) {
            tracing::debug!("Library \"{}\" is already registered", short_name);
            return Ok(LoadOutcome::AlreadyRegistered);
        }

        let mgr = self.find_plugin_mgr().ok_or(LoadError::NoPluginManager)?;

        let dir = dir.filter(|d| !d.is_empty());
        let full_path = join_path(dir, lib_name);
        let result = mgr.lock().load_one_lib(lib_name, dir);

        let (state, unique_id) = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                self.handler
                    .message(ControlMessage::LibLoadFail, &[short_name, &full_path]);
                return Err(e.into());
            }
        };

        if state == LoadState::AlreadyLoaded {
            self.handler
                .message(ControlMessage::Unregistered, &[&full_path, short_name]);
        }
        self.handler
            .message(ControlMessage::LibLoadOk, &[short_name, &full_path]);

        self.known_libs.insert(
            short_name.to_string(),
            LibraryRecord {
                full_path,
                unique_id,
            },
        );

        Ok(match state {
            LoadState::Loaded => LoadOutcome::Loaded,
            LoadState::AlreadyLoaded => LoadOutcome::LoadedUnregistered,
        })
    }

    fn reject_short_name(&mut self, lib_name: &str) -> Result<LoadOutcome, LoadError> {
        self.handler
            .message(ControlMessage::LibLoadFail, &["", lib_name]);
        Err(LoadError::InvalidShortName)
    }

    /// Unload the library registered as `short_name`.
    ///
    /// The record is dropped when the plugin manager reports the library
    /// unloaded or not loaded at all. On an error it stays registered so the
    /// unload can be retried.
    pub fn unload(&mut self, short_name: &str) -> Result<UnloadOutcome, UnloadError> {
        let Some(record) = self.known_libs.get(short_name).cloned() else {
            self.handler
                .message(ControlMessage::LibUnregistered, &[short_name]);
            return Err(UnloadError::NotRegistered(short_name.to_string()));
        };

        let mgr = self.find_plugin_mgr().ok_or(UnloadError::NoPluginManager)?;

        let (lib_name, dir) = split_path(&record.full_path);
        let result = mgr.lock().unload_one_lib(lib_name, dir);

        match result {
            Ok(UnloadState::Unloaded) => {
                self.known_libs.remove(short_name);
                self.handler
                    .message(ControlMessage::LibCloseOk, &[short_name, &record.full_path]);
                Ok(UnloadOutcome::Unloaded)
            }
            Ok(UnloadState::NotLoaded) => {
                self.known_libs.remove(short_name);
                self.handler
                    .message(ControlMessage::LibCloseFail, &[short_name, &record.full_path]);
                Ok(UnloadOutcome::NotLoaded)
            }
            Err(e) => {
                self.handler
                    .message(ControlMessage::LibCloseFail, &[short_name, &record.full_path]);
                Err(e.into())
            }
        }
    }

    /// Create an object implementing `api_name`.
    ///
    /// With a non-empty `short_name` only that library is asked. An unknown
    /// short name is reported and then ignored; the object may come from any
    /// library and the outcome is [`CreateOutcome::RestrictionIgnored`].
    pub fn create_object(
        &mut self,
        api_name: &str,
        short_name: Option<&str>,
    ) -> Result<(ApiObject, CreateOutcome), CreateError> {
        self.create_object_with(api_name, short_name, &PassThrough)
    }

    /// [`create_object`](Self::create_object) with a custom adapter applied
    /// to the raw object.
    pub fn create_object_with(
        &mut self,
        api_name: &str,
        short_name: Option<&str>,
        adapter: &dyn ObjectAdapter,
    ) -> Result<(ApiObject, CreateOutcome), CreateError> {
        let mgr = self.find_plugin_mgr().ok_or(CreateError::NoPluginManager)?;

        let restriction = short_name.filter(|s| !s.is_empty());
        let lib_id = match restriction {
            Some(short) => match self.known_libs.get(short) {
                Some(record) => Some(record.unique_id),
                None => {
                    self.handler
                        .message(ControlMessage::LibUnregistered, &[short]);
                    None
                }
            },
            None => None,
        };

        // Only name the library in messages when the restriction took effect.
        let library = restriction.filter(|_| lib_id.is_some());
        let mut args = vec![api_name];
        args.extend(library);

        let created = mgr.lock().create_object(api_name, lib_id, adapter);

        let Some(CreatedObject {
            object,
            lib_id: reported,
        }) = created
        else {
            self.handler.message(ControlMessage::CreateFail, &args);
            return Err(CreateError::CreateFailed {
                api: api_name.to_string(),
                library: library.map(str::to_string),
            });
        };

        let ident = ObjectIdentity::new(api_name, reported.or(lib_id));
        self.handler.message(ControlMessage::CreateOk, &args);

        let outcome = if restriction.is_some() && lib_id.is_none() {
            CreateOutcome::RestrictionIgnored
        } else {
            CreateOutcome::Created
        };
        Ok((ApiObject::with_identity(object, ident), outcome))
    }

    /// Destroy an object created by [`create_object`](Self::create_object).
    ///
    /// An empty slot or an object without identity is refused and left
    /// untouched. Otherwise the object is taken out of the slot and handed to
    /// the plugin manager, even if destruction then fails.
    pub fn destroy_object(
        &mut self,
        object: &mut Option<ApiObject>,
    ) -> Result<DestroyOutcome, DestroyError> {
        let Some(ident) = object.as_ref().and_then(ApiObject::identity).cloned() else {
            self.handler.message(ControlMessage::NoApiIdent, &[]);
            return Err(DestroyError::NoIdentity);
        };

        let mgr = self.find_plugin_mgr().ok_or(DestroyError::NoPluginManager)?;

        let Some(taken) = object.take() else {
            return Err(DestroyError::NoIdentity);
        };

        let library = ident.lib_id().map(|id| self.short_name(id).to_string());
        let mut args = vec![ident.api_name()];
        args.extend(library.as_deref());

        let result = mgr
            .lock()
            .destroy_object(ident.api_name(), ident.lib_id(), taken.into_inner());

        match result {
            Ok(()) => {
                self.handler.message(ControlMessage::DestroyOk, &args);
                Ok(if ident.is_attributed() {
                    DestroyOutcome::Destroyed
                } else {
                    DestroyOutcome::Unattributed
                })
            }
            Err(e) => {
                self.handler.message(ControlMessage::DestroyFail, &args);
                Err(e.into())
            }
        }
    }

    /// Whether `short_name` is registered.
    pub fn is_registered(&self, short_name: &str) -> bool {
        self.known_libs.contains_key(short_name)
    }

    /// The record registered under `short_name`.
    pub fn library(&self, short_name: &str) -> Option<&LibraryRecord> {
        self.known_libs.get(short_name)
    }

    /// All registered libraries, ordered by short name.
    pub fn libraries(&self) -> impl Iterator<Item = (&str, &LibraryRecord)> {
        self.known_libs
            .iter()
            .map(|(short, record)| (short.as_str(), record))
    }

    /// Short name of the library with identifier `lib_id`, or [`UNKNOWN_LIB`].
    pub fn short_name(&self, lib_id: PluginUniqueId) -> &str {
        self.known_libs
            .iter()
            .find(|(_, record)| record.unique_id == lib_id)
            .map(|(short, _)| short.as_str())
            .unwrap_or(UNKNOWN_LIB)
    }

    /// Full path of the library with identifier `lib_id`, or [`UNKNOWN_LIB`].
    pub fn full_path(&self, lib_id: PluginUniqueId) -> &str {
        self.known_libs
            .values()
            .find(|record| record.unique_id == lib_id)
            .map(|record| record.full_path.as_str())
            .unwrap_or(UNKNOWN_LIB)
    }

    /// The cached plugin manager, looking up the process-wide one on first use.
    fn find_plugin_mgr(&mut self) -> Option<SharedPluginManager> {
        if self.plugin_mgr.is_none() {
            self.plugin_mgr = plugin::instance();
        }

        if self.plugin_mgr.is_none() {
            self.handler.message(ControlMessage::NoPluginManager, &[]);
        }

        self.plugin_mgr.clone()
    }
}

impl Default for ControlApi {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ControlApi {
    /// Owned handlers are deep-copied, borrowed handlers are shared.
    fn clone(&self) -> Self {
        let mut copy = Self {
            plugin_mgr: self.plugin_mgr.clone(),
            known_libs: self.known_libs.clone(),
            default_plugin_dir: self.default_plugin_dir.clone(),
            handler: self.handler.clone(),
        };
        copy.handler.message(ControlMessage::Init, &["copy"]);
        copy
    }

    /// Takes the source's handler together with its log level. Re-applying
    /// this registry's old level would also change a borrowed handler the
    /// source still shares.
    fn clone_from(&mut self, source: &Self) {
        self.plugin_mgr.clone_from(&source.plugin_mgr);
        self.known_libs.clone_from(&source.known_libs);
        self.default_plugin_dir.clone_from(&source.default_plugin_dir);
        self.handler = source.handler.clone();
    }
}

impl fmt::Debug for ControlApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlApi")
            .field("has_plugin_mgr", &self.plugin_mgr.is_some())
            .field("known_libs", &self.known_libs)
            .field("default_plugin_dir", &self.default_plugin_dir)
            .field("handler", &self.handler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> ControlApi {
        ControlApi::with_handler(&Osi2Config::default(), MessageHandler::in_memory().into())
    }

    #[test]
    fn test_library_file_name() {
        let ext = std::env::consts::DLL_EXTENSION;
        assert_eq!(
            ControlApi::library_file_name("clp"),
            format!("libOsi2ClpShim.{}", ext)
        );
        assert_eq!(
            ControlApi::library_file_name("Glpk"),
            format!("libOsi2GlpkShim.{}", ext)
        );
        assert_eq!(
            ControlApi::library_file_name("x"),
            format!("libOsi2XShim.{}", ext)
        );
    }

    #[test]
    fn test_init_message() {
        let mut control = quiet();
        let history = control.with_message_handler(|h| h.history().to_vec());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, ControlMessage::Init);
        assert_eq!(history[0].args, vec!["default".to_string()]);
    }

    #[test]
    fn test_empty_short_name_rejected() {
        let mut control = quiet();
        assert_eq!(control.load(""), Err(LoadError::InvalidShortName));
        assert_eq!(
            control.load_from("", "libA.so", None),
            Err(LoadError::InvalidShortName)
        );
        assert_eq!(control.libraries().count(), 0);
    }

    #[test]
    fn test_reverse_lookup_unknown() {
        let control = quiet();
        let id = PluginUniqueId::new(99).unwrap();
        assert_eq!(control.short_name(id), UNKNOWN_LIB);
        assert_eq!(control.full_path(id), UNKNOWN_LIB);
    }

    #[test]
    fn test_unload_unregistered() {
        let mut control = quiet();
        let result = control.unload("clp");
        assert_eq!(result, Err(UnloadError::NotRegistered("clp".to_string())));
        assert_eq!(result.unwrap_err().code(), 2);

        let last = control.with_message_handler(|h| h.history().last().cloned());
        assert_eq!(last.unwrap().message, ControlMessage::LibUnregistered);
    }

    #[test]
    fn test_destroy_without_identity() {
        let mut control = quiet();

        let mut empty = None;
        assert_eq!(control.destroy_object(&mut empty), Err(DestroyError::NoIdentity));

        let mut detached = Some(ApiObject::detached(Box::new(5u8)));
        assert_eq!(
            control.destroy_object(&mut detached),
            Err(DestroyError::NoIdentity)
        );
        assert!(detached.is_some());
    }

    #[test]
    fn test_log_level_from_config() {
        let config = Osi2Config {
            log_level: 2,
            ..Osi2Config::default()
        };
        let mut control = ControlApi::from_config(&config);
        assert_eq!(control.log_level(), 2);
        control.set_log_level(0);
        assert_eq!(control.log_level(), 0);
    }

    #[test]
    fn test_default_plugin_dir() {
        let config = Osi2Config {
            plugin_dir: Some("/opt/osi2".to_string()),
            ..Osi2Config::default()
        };
        let mut control = ControlApi::from_config(&config);
        assert_eq!(control.default_plugin_dir(), "/opt/osi2");
        control.set_default_plugin_dir("");
        assert_eq!(control.default_plugin_dir(), "");
    }

    #[test]
    fn test_clone_emits_copy() {
        let control = quiet();
        let mut copy = control.clone();
        let history = copy.with_message_handler(|h| h.history().to_vec());
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].args, vec!["copy".to_string()]);
        assert!(copy.handler.is_owned());
    }
}
