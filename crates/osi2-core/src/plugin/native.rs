//! Native plugin manager using libloading.
//!
//! A plugin library exports an init function named `osi2_init_plugin`
//! (see [`INIT_SYMBOL`]) and optionally an exit function named
//! `osi2_exit_plugin`. The init function receives a [`PluginRegistrar`] and
//! registers one create/destroy pair per API it implements.
//!
//! The registrar and the [`Api`] trait objects cross the library boundary as
//! Rust types, so plugins must be built with the same toolchain and the same
//! `osi2-core` version as the host. Use [`export_plugin!`](crate::export_plugin)
//! to generate the exported symbols.
//!
//! Libraries can also be linked statically and made known by file name with
//! [`NativePluginManager::register_static`]; they then go through exactly the
//! same init/exit protocol without `dlopen`.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use libloading::{Library, Symbol};

use super::{
    join_path, CreatedObject, LoadState, PluginError, PluginManager, PluginUniqueId, Result,
    UnloadState,
};
use crate::api::{Api, ObjectAdapter};
use crate::config::Osi2Config;

/// Name of the exported init function.
pub const INIT_SYMBOL: &[u8] = b"osi2_init_plugin";

/// Name of the optional exported exit function.
pub const EXIT_SYMBOL: &[u8] = b"osi2_exit_plugin";

/// Init function: registers the library's APIs. Nonzero return means failure.
pub type InitPluginFn = unsafe extern "C" fn(registrar: &mut PluginRegistrar) -> i32;

/// Exit function: called before the library is closed. Nonzero return means failure.
pub type ExitPluginFn = unsafe extern "C" fn() -> i32;

/// Constructs an object for one API. `None` means construction failed.
pub type CreateFn = fn(params: &ObjectParams<'_>) -> Option<Box<dyn Api>>;

/// Destroys an object created by the matching [`CreateFn`]. Nonzero means failure.
pub type DestroyFn = fn(object: Box<dyn Api>) -> i32;

/// Passed to a [`CreateFn`].
#[derive(Debug, Clone, Copy)]
pub struct ObjectParams<'a> {
    /// API being constructed.
    pub api_name: &'a str,
    /// Library whose create function is running.
    pub lib_id: PluginUniqueId,
}

/// Create/destroy pair registered for one API.
#[derive(Debug, Clone, Copy)]
pub struct RegisterParams {
    pub create: CreateFn,
    pub destroy: DestroyFn,
}

/// Collects the APIs a library registers during init.
#[derive(Debug)]
pub struct PluginRegistrar {
    lib_id: PluginUniqueId,
    apis: Vec<(String, RegisterParams)>,
}

impl PluginRegistrar {
    fn new(lib_id: PluginUniqueId) -> Self {
        Self {
            lib_id,
            apis: Vec::new(),
        }
    }

    /// Identifier the library is being loaded under.
    pub fn lib_id(&self) -> PluginUniqueId {
        self.lib_id
    }

    /// Register an API. A later registration of the same name replaces the earlier one.
    pub fn register_api(&mut self, api_name: impl Into<String>, params: RegisterParams) {
        let api_name = api_name.into();
        self.apis.retain(|(name, _)| *name != api_name);
        self.apis.push((api_name, params));
    }
}

/// A library linked into the host and known by file name.
#[derive(Debug, Clone, Copy)]
struct StaticPlugin {
    init: InitPluginFn,
    exit: Option<ExitPluginFn>,
}

struct LoadedLibrary {
    id: PluginUniqueId,
    full_path: String,
    apis: Vec<(String, RegisterParams)>,
    exit: Option<ExitPluginFn>,
    live_objects: usize,
    /// `None` for statically linked plugins.
    _library: Option<Library>,
}

impl LoadedLibrary {
    fn api(&self, api_name: &str) -> Option<RegisterParams> {
        self.apis
            .iter()
            .find(|(name, _)| name == api_name)
            .map(|(_, params)| *params)
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_unique_id() -> PluginUniqueId {
    let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    PluginUniqueId(NonZeroU64::MIN.saturating_add(raw))
}

/// `libloading`-backed [`PluginManager`].
pub struct NativePluginManager {
    default_dir: String,
    /// In load order; unrestricted creation asks the oldest library first.
    libraries: Vec<LoadedLibrary>,
    statics: HashMap<String, StaticPlugin>,
}

impl NativePluginManager {
    /// Create a manager with no default plugin directory.
    pub fn new() -> Self {
        Self {
            default_dir: String::new(),
            libraries: Vec::new(),
            statics: HashMap::new(),
        }
    }

    /// Create a manager whose default directory comes from the configuration.
    pub fn from_config(config: &Osi2Config) -> Self {
        let mut manager = Self::new();
        manager.default_dir = config.plugin_dir_or_empty().to_string();
        manager
    }

    /// Set the default plugin directory.
    pub fn set_default_plugin_dir(&mut self, dir: impl Into<String>) {
        self.default_dir = dir.into();
    }

    /// Make a statically linked plugin loadable under `lib_name`.
    pub fn register_static(
        &mut self,
        lib_name: impl Into<String>,
        init: InitPluginFn,
        exit: Option<ExitPluginFn>,
    ) {
        self.statics.insert(lib_name.into(), StaticPlugin { init, exit });
    }

    /// Number of libraries currently loaded.
    pub fn loaded_count(&self) -> usize {
        self.libraries.len()
    }

    /// Full paths of the loaded libraries, in load order.
    pub fn loaded_paths(&self) -> Vec<&str> {
        self.libraries.iter().map(|l| l.full_path.as_str()).collect()
    }

    /// APIs registered by a loaded library.
    pub fn apis_of(&self, lib_id: PluginUniqueId) -> Vec<&str> {
        self.libraries
            .iter()
            .filter(|l| l.id == lib_id)
            .flat_map(|l| l.apis.iter().map(|(name, _)| name.as_str()))
            .collect()
    }

    /// Live objects created by a loaded library.
    pub fn live_objects(&self, lib_id: PluginUniqueId) -> usize {
        self.libraries
            .iter()
            .find(|l| l.id == lib_id)
            .map(|l| l.live_objects)
            .unwrap_or(0)
    }

    fn open(
        &self,
        lib_name: &str,
        full_path: &str,
    ) -> Result<(Option<Library>, InitPluginFn, Option<ExitPluginFn>)> {
        if let Some(plugin) = self.statics.get(lib_name) {
            tracing::debug!("Using statically linked plugin for {}", lib_name);
            return Ok((None, plugin.init, plugin.exit));
        }

        // SAFETY: loading a library runs its initialisers; plugins are trusted
        // code built against this crate.
        let library = unsafe {
            Library::new(full_path).map_err(|e| PluginError::LoadFailed {
                path: full_path.to_string(),
                reason: e.to_string(),
            })?
        };

        // SAFETY: the symbol type is fixed by the plugin protocol.
        let init: InitPluginFn = unsafe {
            let sym: Symbol<InitPluginFn> = library
                .get(INIT_SYMBOL)
                .map_err(|_| PluginError::NoInitFunc(full_path.to_string()))?;
            *sym
        };

        // SAFETY: as above; the exit function is optional.
        let exit: Option<ExitPluginFn> = unsafe {
            library
                .get::<ExitPluginFn>(EXIT_SYMBOL)
                .ok()
                .map(|sym| *sym)
        };

        Ok((Some(library), init, exit))
    }

    fn find_by_path(&self, full_path: &str) -> Option<usize> {
        self.libraries.iter().position(|l| l.full_path == full_path)
    }
}

impl Default for NativePluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager for NativePluginManager {
    fn load_one_lib(
        &mut self,
        lib_name: &str,
        dir: Option<&str>,
    ) -> Result<(LoadState, PluginUniqueId)> {
        let full_path = join_path(dir, lib_name);

        if let Some(index) = self.find_by_path(&full_path) {
            let id = self.libraries[index].id;
            tracing::debug!("Library {} already loaded as {}", full_path, id);
            return Ok((LoadState::AlreadyLoaded, id));
        }

        let (library, init, exit) = self.open(lib_name, &full_path)?;

        let id = next_unique_id();
        let mut registrar = PluginRegistrar::new(id);

        // SAFETY: `init` was resolved from the library we still hold.
        let status = unsafe { init(&mut registrar) };
        if status != 0 {
            tracing::warn!("Init function of {} returned {}", full_path, status);
            return Err(PluginError::InitFailed {
                path: full_path,
                status,
            });
        }

        tracing::info!(
            "Loaded plugin library {} as {} ({} API(s))",
            full_path,
            id,
            registrar.apis.len()
        );

        self.libraries.push(LoadedLibrary {
            id,
            full_path,
            apis: registrar.apis,
            exit,
            live_objects: 0,
            _library: library,
        });

        Ok((LoadState::Loaded, id))
    }

    fn unload_one_lib(&mut self, lib_name: &str, dir: Option<&str>) -> Result<UnloadState> {
        let full_path = join_path(dir, lib_name);

        let Some(index) = self.find_by_path(&full_path) else {
            return Ok(UnloadState::NotLoaded);
        };

        let entry = &self.libraries[index];
        if entry.live_objects > 0 {
            return Err(PluginError::ObjectsOutstanding {
                path: full_path,
                count: entry.live_objects,
            });
        }

        if let Some(exit) = entry.exit {
            // SAFETY: the library is still open.
            let status = unsafe { exit() };
            if status != 0 {
                return Err(PluginError::ExitFailed {
                    path: full_path,
                    status,
                });
            }
        }

        let entry = self.libraries.remove(index);
        tracing::info!("Unloaded plugin library {} ({})", entry.full_path, entry.id);
        Ok(UnloadState::Unloaded)
    }

    fn default_plugin_dir(&self) -> String {
        self.default_dir.clone()
    }

    fn create_object(
        &mut self,
        api_name: &str,
        lib_id: Option<PluginUniqueId>,
        adapter: &dyn ObjectAdapter,
    ) -> Option<CreatedObject> {
        let candidates = self
            .libraries
            .iter_mut()
            .filter(|l| lib_id.is_none_or(|id| id == l.id));

        for library in candidates {
            let Some(params) = library.api(api_name) else {
                continue;
            };

            let object_params = ObjectParams {
                api_name,
                lib_id: library.id,
            };
            match (params.create)(&object_params) {
                Some(object) => {
                    library.live_objects += 1;
                    return Some(CreatedObject {
                        object: adapter.adapt(object),
                        lib_id: Some(library.id),
                    });
                }
                None => {
                    tracing::warn!(
                        "Create function for API {} in {} returned nothing",
                        api_name,
                        library.full_path
                    );
                }
            }
        }

        None
    }

    fn destroy_object(
        &mut self,
        api_name: &str,
        lib_id: Option<PluginUniqueId>,
        object: Box<dyn Api>,
    ) -> Result<()> {
        // Without attribution, fall back to the oldest library that registered
        // the API and still has objects out.
        let library = self.libraries.iter_mut().find(|l| match lib_id {
            Some(id) => l.id == id,
            None => l.live_objects > 0 && l.api(api_name).is_some(),
        });

        let Some(library) = library else {
            return Err(PluginError::UnknownApi {
                api: api_name.to_string(),
            });
        };

        // The object is gone after this call whether or not the API matches.
        library.live_objects = library.live_objects.saturating_sub(1);

        let Some(params) = library.api(api_name) else {
            tracing::warn!(
                "{} registers no destroy function for {}; dropping the object in the host",
                library.full_path,
                api_name
            );
            drop(object);
            return Err(PluginError::UnknownApi {
                api: api_name.to_string(),
            });
        };

        let status = (params.destroy)(object);

        if status != 0 {
            return Err(PluginError::DestroyFailed {
                api: api_name.to_string(),
                status,
            });
        }
        Ok(())
    }
}

/// Export the init (and optionally exit) symbols of a plugin library.
///
/// # Usage
/// ```ignore
/// use osi2_core::plugin::{ObjectParams, PluginRegistrar, RegisterParams};
///
/// struct ClpSimplex;
///
/// fn init(registrar: &mut PluginRegistrar) -> i32 {
///     registrar.register_api("OsiSimplex", RegisterParams {
///         create: |_params| Some(Box::new(ClpSimplex)),
///         destroy: |_object| 0,
///     });
///     0
/// }
///
/// osi2_core::export_plugin!(init);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($init:path) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn osi2_init_plugin(
            registrar: &mut $crate::plugin::PluginRegistrar,
        ) -> i32 {
            $init(registrar)
        }
    };
    ($init:path, $exit:path) => {
        $crate::export_plugin!($init);

        #[no_mangle]
        pub unsafe extern "C" fn osi2_exit_plugin() -> i32 {
            $exit()
        }
    };
}
