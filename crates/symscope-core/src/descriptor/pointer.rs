//! Pointer types that have no record of their own.

use super::{BuiltinType, RawBase, RawField, TypeDescriptor, TypeIndex, TypeKind, TypeTag};
use crate::error::{SymscopeError, SymscopeResult};
use crate::process::ProcessContext;
use crate::types::{Address, ModuleId};

/// "Pointer to X" for a pointee whose type system has no such record
///
/// Field and base class queries go to the pointee: the type table hands this
/// descriptor the pointee's member caches instead of building its own.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyntheticPointerType
{
    module: ModuleId,
    pointee: TypeIndex,
}

impl SyntheticPointerType
{
    pub(crate) fn new(module: ModuleId, pointee: TypeIndex) -> Self
    {
        Self { module, pointee }
    }
}

impl TypeDescriptor for SyntheticPointerType
{
    fn module(&self) -> ModuleId
    {
        self.module
    }

    fn kind(&self) -> TypeKind
    {
        TypeKind::SyntheticPointer
    }

    fn tag(&self) -> TypeTag
    {
        TypeTag::Pointer
    }

    fn builtin(&self) -> BuiltinType
    {
        BuiltinType::None
    }

    fn load_name(&self, cx: &ProcessContext) -> SymscopeResult<String>
    {
        let pointee = cx.types.entry(self.pointee).name(cx)?;
        Ok(format!("{pointee}*"))
    }

    fn load_size(&self, cx: &ProcessContext) -> SymscopeResult<u64>
    {
        Ok(cx.pointer_size())
    }

    fn load_element(&self, _cx: &ProcessContext, _this: TypeIndex) -> SymscopeResult<TypeIndex>
    {
        Ok(self.pointee)
    }

    fn load_fields(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawField>>
    {
        cx.types.entry(self.pointee).descriptor.load_fields(cx)
    }

    fn load_direct_bases(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawBase>>
    {
        cx.types.entry(self.pointee).descriptor.load_direct_bases(cx)
    }

    fn load_template_arguments(&self, cx: &ProcessContext) -> SymscopeResult<Option<Vec<String>>>
    {
        cx.types.entry(self.pointee).descriptor.load_template_arguments(cx)
    }

    fn virtual_base_address(
        &self,
        cx: &ProcessContext,
        object: Address,
        base: &dyn TypeDescriptor,
    ) -> SymscopeResult<Address>
    {
        cx.types.entry(self.pointee).descriptor.virtual_base_address(cx, object, base)
    }
}

/// `void*` stand-in for addresses that have no concrete type
///
/// Only the pointer value itself is meaningful. Layout queries fail with
/// [`SymscopeError::UnsupportedTypeQuery`] rather than returning nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UntypedPointerType
{
    module: ModuleId,
}

impl UntypedPointerType
{
    pub(crate) const NAME: &'static str = "void*";

    pub(crate) fn new(module: ModuleId) -> Self
    {
        Self { module }
    }

    fn unsupported<T>(query: &'static str) -> SymscopeResult<T>
    {
        Err(SymscopeError::UnsupportedTypeQuery {
            type_name: Self::NAME.to_string(),
            query,
        })
    }
}

impl TypeDescriptor for UntypedPointerType
{
    fn module(&self) -> ModuleId
    {
        self.module
    }

    fn kind(&self) -> TypeKind
    {
        TypeKind::UntypedPointer
    }

    fn tag(&self) -> TypeTag
    {
        TypeTag::Pointer
    }

    fn builtin(&self) -> BuiltinType
    {
        BuiltinType::None
    }

    fn char_width(&self, _cx: &ProcessContext, _this: TypeIndex) -> Option<u64>
    {
        None
    }

    fn load_name(&self, _cx: &ProcessContext) -> SymscopeResult<String>
    {
        Ok(Self::NAME.to_string())
    }

    fn load_size(&self, _cx: &ProcessContext) -> SymscopeResult<u64>
    {
        Self::unsupported("size")
    }

    fn load_element(&self, _cx: &ProcessContext, _this: TypeIndex) -> SymscopeResult<TypeIndex>
    {
        Self::unsupported("element type")
    }

    fn load_fields(&self, _cx: &ProcessContext) -> SymscopeResult<Vec<RawField>>
    {
        Self::unsupported("fields")
    }

    fn load_direct_bases(&self, _cx: &ProcessContext) -> SymscopeResult<Vec<RawBase>>
    {
        Self::unsupported("base classes")
    }

    fn load_template_arguments(&self, _cx: &ProcessContext) -> SymscopeResult<Option<Vec<String>>>
    {
        Self::unsupported("template arguments")
    }

    fn virtual_base_address(
        &self,
        _cx: &ProcessContext,
        _object: Address,
        _base: &dyn TypeDescriptor,
    ) -> SymscopeResult<Address>
    {
        Self::unsupported("virtual base address")
    }
}
