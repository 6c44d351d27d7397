//! Process-wide plugin manager lookup.
//!
//! Kept in its own test binary: installing the manager is permanent for the
//! life of the process.

#![allow(improper_ctypes_definitions)]

use osi2_core::api::Api;
use osi2_core::message::MessageHandler;
use osi2_core::plugin::{self, NativePluginManager, ObjectParams, PluginRegistrar, RegisterParams};
use osi2_core::{ControlApi, DestroyOutcome, LoadOutcome, Osi2Config, UnloadOutcome};

struct CbcModel;

fn create(_params: &ObjectParams<'_>) -> Option<Box<dyn Api>> {
    Some(Box::new(CbcModel))
}

fn destroy(_object: Box<dyn Api>) -> i32 {
    0
}

unsafe extern "C" fn init(registrar: &mut PluginRegistrar) -> i32 {
    registrar.register_api("OsiMip", RegisterParams { create, destroy });
    0
}

#[test]
fn test_control_api_finds_installed_manager() {
    assert!(plugin::instance().is_none());

    let mut manager = NativePluginManager::new();
    manager.register_static(ControlApi::library_file_name("cbc"), init, None);
    assert!(plugin::install(plugin::shared(manager)).is_ok());
    assert!(plugin::install(plugin::shared(NativePluginManager::new())).is_err());

    let mut first = ControlApi::with_handler(&Osi2Config::default(), MessageHandler::in_memory().into());
    let mut second = ControlApi::new();

    assert_eq!(first.load("cbc"), Ok(LoadOutcome::Loaded));
    assert_eq!(second.load("cbc"), Ok(LoadOutcome::LoadedUnregistered));

    let (object, _) = second.create_object("OsiMip", Some("cbc")).unwrap();
    assert!(object.downcast_ref::<CbcModel>().is_some());
    let mut slot = Some(object);
    assert_eq!(first.destroy_object(&mut slot), Ok(DestroyOutcome::Destroyed));

    assert_eq!(first.unload("cbc"), Ok(UnloadOutcome::Unloaded));
    assert_eq!(second.unload("cbc"), Ok(UnloadOutcome::NotLoaded));
    assert!(!second.is_registered("cbc"));

    assert_eq!(second.load("cbc"), Ok(LoadOutcome::Loaded));
    assert_eq!(second.unload("cbc"), Ok(UnloadOutcome::Unloaded));
}
