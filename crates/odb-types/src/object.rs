use std::any::{Any, TypeId};
use std::sync::Arc;

/// Shared handle to a live application object.
///
/// The engine never inspects the object itself; identity is the address of
/// the shared allocation, so two handles cloned from the same `Arc` denote
/// the same object.
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// Pointer-identity key for an [`ObjectRef`].
///
/// Only meaningful while some map keeps the object alive; the session cache
/// always stores the `ObjectRef` alongside its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey(usize);

impl ObjectKey {
    pub fn of(object: &ObjectRef) -> Self {
        Self(Arc::as_ptr(object) as *const () as usize)
    }
}

/// Runtime type tag of the object behind a handle.
pub fn type_tag(object: &ObjectRef) -> TypeId {
    (**object).type_id()
}
