//! Descriptors backed by managed runtime type handles.

use std::sync::Arc;

use super::{BuiltinType, MemberOffset, RawBase, RawField, TypeDescriptor, TypeIndex, TypeKind, TypeTag};
use crate::error::{SymscopeError, SymscopeResult};
use crate::managed::{ElementKind, ManagedRuntime, ManagedTypeInfo};
use crate::process::ProcessContext;
use crate::types::{Address, ManagedTypeHandle, ModuleId};

/// A managed type, optionally specialized for one array length
///
/// Arrays are sized per instance: the plain array descriptor has the size of
/// a reference, while `length: Some(n)` describes the element storage of an
/// array holding `n` elements.
#[derive(Debug, Clone)]
pub(crate) struct ManagedType
{
    handle: ManagedTypeHandle,
    info: Arc<ManagedTypeInfo>,
    length: Option<u64>,
}

impl ManagedType
{
    pub(crate) fn new(handle: ManagedTypeHandle, info: ManagedTypeInfo) -> Self
    {
        Self {
            handle,
            info: Arc::new(info),
            length: None,
        }
    }

    fn runtime<'a>(&self, cx: &'a ProcessContext) -> SymscopeResult<&'a dyn ManagedRuntime>
    {
        cx.managed.as_deref().ok_or_else(|| {
            SymscopeError::Provider(format!("no managed runtime attached for type `{}`", self.info.name))
        })
    }

    fn simple_size(&self, pointer_size: u64) -> Option<u64>
    {
        let size = match self.info.element_kind {
            ElementKind::Boolean | ElementKind::Int8 | ElementKind::UInt8 => 1,
            ElementKind::Char | ElementKind::Int16 | ElementKind::UInt16 => 2,
            ElementKind::Int32 | ElementKind::UInt32 | ElementKind::Float => 4,
            ElementKind::Int64 | ElementKind::UInt64 | ElementKind::Double => 8,
            ElementKind::NativeInt
            | ElementKind::NativeUInt
            | ElementKind::String
            | ElementKind::Class
            | ElementKind::Array
            | ElementKind::SzArray
            | ElementKind::Object
            | ElementKind::Pointer
            | ElementKind::FunctionPointer => pointer_size,
            ElementKind::Struct | ElementKind::Unknown => return None,
        };
        Some(size)
    }
}

impl TypeDescriptor for ManagedType
{
    fn module(&self) -> ModuleId
    {
        self.info.module
    }

    fn kind(&self) -> TypeKind
    {
        TypeKind::Managed
    }

    fn tag(&self) -> TypeTag
    {
        let info = &self.info;
        if info.is_array {
            TypeTag::Array
        } else if info.is_pointer {
            TypeTag::Pointer
        } else if info.is_enum {
            TypeTag::Enum
        } else if info.is_primitive {
            TypeTag::Builtin
        } else if info.element_kind == ElementKind::FunctionPointer {
            TypeTag::Function
        } else if info.is_value_class {
            TypeTag::Struct
        } else {
            TypeTag::Class
        }
    }

    fn builtin(&self) -> BuiltinType
    {
        if !self.info.has_simple_value {
            return BuiltinType::None;
        }
        match self.info.element_kind {
            ElementKind::Boolean => BuiltinType::Bool,
            ElementKind::Char => BuiltinType::Char16,
            ElementKind::Int8 => BuiltinType::Int8,
            ElementKind::UInt8 => BuiltinType::UInt8,
            ElementKind::Int16 => BuiltinType::Int16,
            ElementKind::UInt16 => BuiltinType::UInt16,
            ElementKind::Int32 => BuiltinType::Int32,
            ElementKind::UInt32 => BuiltinType::UInt32,
            ElementKind::Int64 => BuiltinType::Int64,
            ElementKind::UInt64 => BuiltinType::UInt64,
            ElementKind::Float => BuiltinType::Float32,
            ElementKind::Double => BuiltinType::Float64,
            _ => BuiltinType::None,
        }
    }

    fn managed_handle(&self) -> Option<ManagedTypeHandle>
    {
        Some(self.handle)
    }

    // Object references are pointers: their data word is the object address.
    fn is_pointer(&self) -> bool
    {
        self.info.is_pointer || self.info.is_object_reference
    }

    fn is_simple(&self) -> bool
    {
        self.info.is_primitive
    }

    fn char_width(&self, _cx: &ProcessContext, _this: TypeIndex) -> Option<u64>
    {
        (self.is_pointer() && self.info.element_kind == ElementKind::Char).then_some(2)
    }

    fn load_name(&self, _cx: &ProcessContext) -> SymscopeResult<String>
    {
        Ok(self.info.name.clone())
    }

    fn load_size(&self, cx: &ProcessContext) -> SymscopeResult<u64>
    {
        if let Some(length) = self.length {
            return Ok(self.info.element_size.saturating_mul(length));
        }
        if self.info.has_simple_value {
            if let Some(size) = self.simple_size(cx.pointer_size()) {
                return Ok(size);
            }
        }
        Ok(self.info.base_size)
    }

    fn load_element(&self, cx: &ProcessContext, this: TypeIndex) -> SymscopeResult<TypeIndex>
    {
        match self.info.component_type {
            Some(component) => cx.types.managed(cx, component),
            None => Ok(this),
        }
    }

    fn load_fields(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawField>>
    {
        // Reference classes start with the object header.
        let header = if self.info.is_value_class { 0 } else { cx.pointer_size() };
        self.info
            .fields
            .iter()
            .map(|field| {
                Ok(RawField {
                    name: field.name.clone(),
                    ty: cx.types.managed(cx, field.type_handle)?,
                    offset: field.offset + header,
                })
            })
            .collect()
    }

    fn load_direct_bases(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawBase>>
    {
        self.info
            .base_type
            .map(|base| {
                Ok(RawBase {
                    ty: cx.types.managed(cx, base)?,
                    offset: MemberOffset::Fixed(0),
                })
            })
            .into_iter()
            .collect()
    }

    fn virtual_base_address(
        &self,
        _cx: &ProcessContext,
        object: Address,
        _base: &dyn TypeDescriptor,
    ) -> SymscopeResult<Address>
    {
        // Managed inheritance is single and never virtual.
        Ok(object)
    }

    fn instance_array_length(&self, cx: &ProcessContext, object: Address) -> SymscopeResult<Option<u64>>
    {
        if !self.info.is_array || self.length.is_some() {
            return Ok(None);
        }
        self.runtime(cx)?.array_length(self.handle, object).map(Some)
    }

    // A specialized array value already points at its first element, so
    // only plain array references go through the runtime.
    fn array_element_address(&self, cx: &ProcessContext, object: Address, index: u64) -> SymscopeResult<Option<Address>>
    {
        if !self.info.is_array || self.length.is_some() {
            return Ok(None);
        }
        self.runtime(cx)?.array_element_address(self.handle, object, index).map(Some)
    }

    fn specialize(&self, length: u64) -> Option<Box<dyn TypeDescriptor>>
    {
        if !self.info.is_array {
            return None;
        }
        Some(Box::new(Self {
            handle: self.handle,
            info: Arc::clone(&self.info),
            length: Some(length),
        }))
    }
}
