//! Runtime type resolution.
//!
//! The dynamic type of a native object comes from its virtual table: the
//! first pointer-sized word of the object is looked up by the symbol
//! provider, which answers with the most-derived type and the offset of the
//! inspected sub-object inside it. Managed objects ask the runtime bridge
//! instead.
//!
//! Resolution is best-effort. Any failure falls back to the static type at
//! offset zero.

use std::convert::Infallible;
use std::sync::Arc;

use tracing::{debug, trace};

use super::Value;
use crate::descriptor::{BuiltinType, TypeHandle, TypeIndex, TypeKind};
use crate::error::SymscopeResult;
use crate::types::Address;
use crate::usertypes::UserType;

impl Value
{
    fn runtime_type_and_offset(&self) -> (TypeIndex, i64)
    {
        let epoch = self.ty.cx().epoch.current();
        self.state
            .runtime
            .get_or_try_init(epoch, || Ok::<_, Infallible>(self.resolve_runtime_type()))
            .unwrap_or_else(|never| match never {})
    }

    fn resolve_runtime_type(&self) -> (TypeIndex, i64)
    {
        match self.find_runtime_type() {
            Ok(Some(found)) => found,
            Ok(None) => (self.ty.index(), 0),
            Err(error) => {
                debug!(value = %self.path, %error, "runtime type resolution failed, using static type");
                (self.ty.index(), 0)
            }
        }
    }

    fn find_runtime_type(&self) -> SymscopeResult<Option<(TypeIndex, i64)>>
    {
        if self.ty.is_simple() {
            return Ok(None);
        }

        let cx = self.ty.cx();
        let object = self.pointer_address()?;
        if object.is_null() {
            return Ok(None);
        }

        if self.ty.kind() == TypeKind::Managed {
            let Some(runtime) = cx.managed.as_deref() else {
                return Ok(None);
            };
            if !self.ty.is_pointer() {
                return Ok(None);
            }
            return match runtime.object_type(object)? {
                Some(handle) => Ok(Some((cx.types.managed(cx, handle)?, 0))),
                None => Ok(None),
            };
        }

        let vtable = Address::from(cx.read_word(object, cx.pointer_size())?);
        let Some(found) = cx.provider.runtime_type(vtable)? else {
            trace!(%vtable, "unknown virtual table");
            return Ok(None);
        };
        Ok(Some((cx.types.native(cx, found.module, found.type_id)?, found.offset)))
    }

    /// Dynamic type of the value
    ///
    /// Falls back to the static type if it cannot be determined.
    pub fn runtime_type(&self) -> TypeHandle
    {
        let (index, _) = self.runtime_type_and_offset();
        TypeHandle::new(self.process().clone(), index)
    }

    /// Offset of this sub-object inside the most-derived object
    pub fn runtime_offset(&self) -> i64
    {
        self.runtime_type_and_offset().1
    }

    /// Reinterpret the value as a pointer to its dynamic type
    ///
    /// The pointer is moved back by the runtime offset so that it points at
    /// the most-derived object. Values whose dynamic type is their static
    /// type come back unchanged.
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the pointer type cannot be built.
    pub fn downcast_to_runtime_type(&self) -> SymscopeResult<Value>
    {
        let (index, offset) = self.runtime_type_and_offset();
        if offset == 0 && index == self.ty.index() {
            return Ok(self.clone());
        }

        let runtime = TypeHandle::new(self.process().clone(), index);
        let pointer_type = if runtime.is_pointer() { runtime } else { runtime.pointer_to_type()? };
        let address = self.pointer_address()?.offset(offset.wrapping_neg());
        Ok(Value::pointer(
            pointer_type,
            address,
            Arc::clone(&self.name),
            Arc::clone(&self.path),
        ))
    }

    /// Cast to `T` if the dynamic type derives from one of `T`'s types
    ///
    /// Returns `None` when the dynamic type is unrelated to `T`.
    ///
    /// ## Errors
    ///
    /// Returns whatever navigating to the base or constructing `T` fails with.
    pub fn dynamic_cast_as<T: UserType>(&self) -> SymscopeResult<Option<T>>
    {
        let mut runtime = self.runtime_type();
        if runtime.is_pointer() {
            runtime = runtime.element_type()?;
        }
        if !runtime.inherits_user_type::<T>()? {
            return Ok(None);
        }

        let downcast = self.downcast_to_runtime_type()?;
        for metadata in T::metadata() {
            match downcast.base_class_named(&metadata.type_name) {
                Ok(base) => return T::from_value(base).map(Some),
                Err(error) if error.is_not_found() => {}
                Err(error) => return Err(error),
            }
        }
        Ok(None)
    }

    /// Retype a managed reference as the dynamic type of the object it
    /// refers to
    ///
    /// Arrays are specialized for their length and point at their first
    /// element; boxed value types point past the object header.
    pub(crate) fn upcast_managed(self) -> SymscopeResult<Value>
    {
        let ty = &self.ty;
        if ty.kind() != TypeKind::Managed || ty.builtin_type() != BuiltinType::None || !ty.is_pointer() {
            return Ok(self);
        }
        let cx = ty.cx();
        let Some(runtime) = cx.managed.as_deref() else {
            return Ok(self);
        };

        let object = self.pointer_address()?;
        if object.is_null() {
            return Ok(self);
        }

        let dynamic = match runtime.object_type(object)? {
            Some(handle) => TypeHandle::new(self.process().clone(), cx.types.managed(cx, handle)?),
            None => ty.clone(),
        };

        let mut address = object;
        if !dynamic.is_pointer() {
            address = object + cx.pointer_size();
        }
        let specialized = dynamic.specialize_for_instance(address)?;
        if &specialized == ty {
            return Ok(self);
        }
        if specialized != dynamic {
            if let Some(first) = dynamic.instance_element_address(address, 0)? {
                address = first;
            }
        }

        trace!(value = %self.path, from = %ty, to = %specialized, "upcast managed value");
        let (name, path) = (Arc::clone(&self.name), Arc::clone(&self.path));
        if specialized.is_pointer() {
            Ok(Value::pointer(specialized, address, name, path))
        } else {
            Ok(Value::at(specialized, address, name, path))
        }
    }
}
