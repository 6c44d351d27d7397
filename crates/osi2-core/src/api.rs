//! API objects handed out by the control API.
//!
//! The control API does not define what an API object can do. It only tracks
//! where each object came from, so that it can later be destroyed by the
//! library and interface that created it.

use std::any::Any;
use std::fmt;

use crate::plugin::PluginUniqueId;

/// Any object a plugin library can hand out.
///
/// Implemented for every `'static + Send` type; use [`ApiObject::downcast_ref`]
/// to get back to the concrete type.
pub trait Api: Any + Send {
    /// Borrow as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as [`Any`] for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send> Api for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The identity bound to every object created through the control API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentity {
    api_name: String,
    lib_id: Option<PluginUniqueId>,
}

impl ObjectIdentity {
    /// Create an identity record.
    pub fn new(api_name: impl Into<String>, lib_id: Option<PluginUniqueId>) -> Self {
        Self {
            api_name: api_name.into(),
            lib_id,
        }
    }

    /// Interface the object was created under.
    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    /// Library that produced the object, if known.
    pub fn lib_id(&self) -> Option<PluginUniqueId> {
        self.lib_id
    }

    /// Whether the object is attributed to exactly one library.
    pub fn is_attributed(&self) -> bool {
        self.lib_id.is_some()
    }
}

/// An API object plus the identity it was created with.
pub struct ApiObject {
    inner: Box<dyn Api>,
    ident: Option<ObjectIdentity>,
}

impl ApiObject {
    /// Wrap an object that did not come from the control API.
    ///
    /// Such an object carries no identity and `destroy_object` refuses it.
    pub fn detached(object: Box<dyn Api>) -> Self {
        Self {
            inner: object,
            ident: None,
        }
    }

    pub(crate) fn with_identity(object: Box<dyn Api>, ident: ObjectIdentity) -> Self {
        Self {
            inner: object,
            ident: Some(ident),
        }
    }

    /// The identity attached at creation, if any.
    pub fn identity(&self) -> Option<&ObjectIdentity> {
        self.ident.as_ref()
    }

    /// Borrow the object as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_ref().as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the object as a concrete type.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.as_mut().as_any_mut().downcast_mut::<T>()
    }

    /// Borrow the object itself.
    pub fn get(&self) -> &dyn Api {
        self.inner.as_ref()
    }

    pub(crate) fn into_inner(self) -> Box<dyn Api> {
        self.inner
    }
}

impl fmt::Debug for ApiObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiObject")
            .field("ident", &self.ident)
            .finish_non_exhaustive()
    }
}

/// Post-processes raw objects produced by a plugin before they reach the caller.
pub trait ObjectAdapter {
    /// Adapt a freshly created object.
    fn adapt(&self, object: Box<dyn Api>) -> Box<dyn Api>;
}

/// Adapter that hands objects through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ObjectAdapter for PassThrough {
    fn adapt(&self, object: Box<dyn Api>) -> Box<dyn Api> {
        object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Simplex {
        iterations: u32,
    }

    #[test]
    fn test_downcast() {
        let mut obj = ApiObject::detached(Box::new(Simplex { iterations: 3 }));
        assert_eq!(obj.downcast_ref::<Simplex>().unwrap().iterations, 3);
        obj.downcast_mut::<Simplex>().unwrap().iterations = 9;
        assert_eq!(obj.downcast_ref::<Simplex>().unwrap().iterations, 9);
        assert!(obj.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_detached_has_no_identity() {
        let obj = ApiObject::detached(Box::new(42u32));
        assert!(obj.identity().is_none());
    }

    #[test]
    fn test_identity_attribution() {
        let id = PluginUniqueId::new(4).unwrap();
        let obj = ApiObject::with_identity(Box::new(()), ObjectIdentity::new("OsiSimplex", Some(id)));
        let ident = obj.identity().unwrap();
        assert_eq!(ident.api_name(), "OsiSimplex");
        assert_eq!(ident.lib_id(), Some(id));
        assert!(ident.is_attributed());
        assert!(!ObjectIdentity::new("OsiSimplex", None).is_attributed());
    }

    #[test]
    fn test_pass_through_keeps_object() {
        let adapted = PassThrough.adapt(Box::new(7i64));
        assert_eq!(adapted.as_ref().as_any().downcast_ref::<i64>(), Some(&7));
    }
}
