//! # User Types
//!
//! Script-facing wrapper types constructed from symbolic values.
//!
//! A wrapper describes which target types it stands for through
//! [`UserTypeMetadata`] (an optional module name and a type name) and knows
//! how to build itself from a [`Value`]. Registering a wrapper lets
//! [`Value::to_user_object`] pick it automatically; casting to a known
//! wrapper works without registration through [`Value::cast_as_user`].
//!
//! ## Example
//!
//! ```rust
//! use symscope_core::error::SymscopeResult;
//! use symscope_core::usertypes::{UserType, UserTypeMetadata, UserTypeRegistry};
//! use symscope_core::value::Value;
//!
//! struct Widget
//! {
//!     value: Value,
//! }
//!
//! impl UserType for Widget
//! {
//!     fn metadata() -> Vec<UserTypeMetadata>
//!     {
//!         vec![UserTypeMetadata::in_module("app", "Widget")]
//!     }
//!
//!     fn from_value(value: Value) -> SymscopeResult<Self>
//!     {
//!         Ok(Self { value })
//!     }
//! }
//!
//! let registry = UserTypeRegistry::new();
//! registry.register::<Widget>();
//! assert!(registry.is_registered::<Widget>());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::descriptor::names;
use crate::descriptor::TypeHandle;
use crate::error::SymscopeResult;
use crate::value::Value;

/// One target type a wrapper stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTypeMetadata
{
    /// Module that must define the type; `None` matches any module
    pub module_name: Option<String>,
    /// Type name, compared case-insensitively; `Name<>` matches any
    /// instantiation of a generic
    pub type_name: String,
}

impl UserTypeMetadata
{
    /// Metadata matching a type name in any module
    pub fn new(type_name: impl Into<String>) -> Self
    {
        Self {
            module_name: None,
            type_name: type_name.into(),
        }
    }

    /// Metadata matching a type name in one module
    pub fn in_module(module_name: impl Into<String>, type_name: impl Into<String>) -> Self
    {
        Self {
            module_name: Some(module_name.into()),
            type_name: type_name.into(),
        }
    }

    /// Check whether this metadata describes `ty` (or its pointee)
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the type name cannot be read.
    pub fn matches(&self, ty: &TypeHandle) -> SymscopeResult<bool>
    {
        let target = ty.remove_pointer()?;
        Ok(target.module_matches(self.module_name.as_deref())?
            && names::type_name_matches(&target.name()?, &self.type_name))
    }
}

/// A wrapper type constructible from a symbolic value
pub trait UserType: Sized + Send + Sync + 'static
{
    /// Target types this wrapper stands for
    fn metadata() -> Vec<UserTypeMetadata>;

    /// Build the wrapper around `value`
    ///
    /// ## Errors
    ///
    /// Implementations propagate whatever reading their fields fails with.
    fn from_value(value: Value) -> SymscopeResult<Self>;
}

/// A constructed wrapper whose concrete type is only known at runtime
pub struct UserObject
{
    type_name: &'static str,
    object: Box<dyn Any + Send + Sync>,
}

impl UserObject
{
    fn new<T: UserType>(object: T) -> Self
    {
        Self {
            type_name: std::any::type_name::<T>(),
            object: Box::new(object),
        }
    }

    /// Rust type name of the wrapper
    pub fn type_name(&self) -> &'static str
    {
        self.type_name
    }

    /// `true` if the wrapper is a `T`
    pub fn is<T: UserType>(&self) -> bool
    {
        self.object.is::<T>()
    }

    /// Borrow the wrapper as a `T`
    pub fn downcast_ref<T: UserType>(&self) -> Option<&T>
    {
        self.object.downcast_ref::<T>()
    }

    /// Take the wrapper out as a `T`
    ///
    /// ## Errors
    ///
    /// Gives the object back if it is not a `T`.
    pub fn downcast<T: UserType>(self) -> Result<T, Self>
    {
        let type_name = self.type_name;
        self.object
            .downcast::<T>()
            .map(|object| *object)
            .map_err(|object| Self { type_name, object })
    }
}

impl fmt::Debug for UserObject
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("UserObject").field("type_name", &self.type_name).finish_non_exhaustive()
    }
}

type Constructor = fn(Value) -> SymscopeResult<UserObject>;

fn construct<T: UserType>(value: Value) -> SymscopeResult<UserObject>
{
    T::from_value(value).map(UserObject::new)
}

#[derive(Clone)]
struct Registration
{
    type_id: TypeId,
    type_name: &'static str,
    metadata: Vec<UserTypeMetadata>,
    construct: Constructor,
}

/// Registered wrapper types, in registration order
///
/// Which wrappers apply to a type is decided at query time, so a wrapper
/// registered late still applies to types that were already resolved.
#[derive(Default)]
pub struct UserTypeRegistry
{
    registrations: RwLock<Vec<Registration>>,
}

impl fmt::Debug for UserTypeRegistry
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let registrations = self.registrations.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_list()
            .entries(registrations.iter().map(|registration| registration.type_name))
            .finish()
    }
}

impl UserTypeRegistry
{
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Register a wrapper type; registering twice has no effect
    pub fn register<T: UserType>(&self)
    {
        let mut registrations = self.registrations.write().unwrap_or_else(PoisonError::into_inner);
        if registrations.iter().any(|registration| registration.type_id == TypeId::of::<T>()) {
            return;
        }
        let type_name = std::any::type_name::<T>();
        debug!(user_type = type_name, "registered user type");
        registrations.push(Registration {
            type_id: TypeId::of::<T>(),
            type_name,
            metadata: T::metadata(),
            construct: construct::<T>,
        });
    }

    /// `true` if `T` was registered
    pub fn is_registered<T: UserType>(&self) -> bool
    {
        self.snapshot().iter().any(|registration| registration.type_id == TypeId::of::<T>())
    }

    /// Number of registered wrappers
    pub fn len(&self) -> usize
    {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if nothing is registered
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    // Constructors may cast to other user types, so never call out while
    // holding the lock.
    fn snapshot(&self) -> Vec<Registration>
    {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of the wrappers whose metadata describes `ty`
    pub(crate) fn matching(&self, ty: &TypeHandle) -> SymscopeResult<Vec<&'static str>>
    {
        let mut found = Vec::new();
        for registration in self.snapshot() {
            for metadata in &registration.metadata {
                if metadata.matches(ty)? {
                    found.push(registration.type_name);
                    break;
                }
            }
        }
        Ok(found)
    }

    /// Build the first registered wrapper that describes the value's type
    pub(crate) fn construct(&self, value: &Value) -> SymscopeResult<Option<UserObject>>
    {
        for registration in self.snapshot() {
            for metadata in &registration.metadata {
                if metadata.matches(value.ty())? {
                    return (registration.construct)(value.clone()).map(Some);
                }
            }
        }
        Ok(None)
    }
}
