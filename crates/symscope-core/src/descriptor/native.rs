//! Descriptors backed by native debug-info type records.

use tracing::trace;

use super::{BuiltinType, RawBase, RawField, TypeDescriptor, TypeIndex, TypeKind, TypeTag};
use crate::error::{SymscopeError, SymscopeResult};
use crate::process::ProcessContext;
use crate::types::{Address, ModuleId, NativeTypeId};

/// A type record of one module's debug info
///
/// The tag and primitive classification are fetched when the descriptor is
/// interned; everything else is loaded on demand.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativeType
{
    module: ModuleId,
    id: NativeTypeId,
    tag: TypeTag,
    builtin: BuiltinType,
}

impl NativeType
{
    pub(crate) fn new(module: ModuleId, id: NativeTypeId, tag: TypeTag, builtin: BuiltinType) -> Self
    {
        Self {
            module,
            id,
            tag,
            builtin,
        }
    }
}

impl TypeDescriptor for NativeType
{
    fn module(&self) -> ModuleId
    {
        self.module
    }

    fn kind(&self) -> TypeKind
    {
        TypeKind::Native
    }

    fn tag(&self) -> TypeTag
    {
        self.tag
    }

    fn builtin(&self) -> BuiltinType
    {
        self.builtin
    }

    fn native_id(&self) -> Option<NativeTypeId>
    {
        Some(self.id)
    }

    fn load_name(&self, cx: &ProcessContext) -> SymscopeResult<String>
    {
        cx.provider.type_name(self.module, self.id)
    }

    fn load_size(&self, cx: &ProcessContext) -> SymscopeResult<u64>
    {
        cx.provider.type_size(self.module, self.id)
    }

    fn load_element(&self, cx: &ProcessContext, this: TypeIndex) -> SymscopeResult<TypeIndex>
    {
        if !matches!(self.tag, TypeTag::Pointer | TypeTag::Array) {
            return Ok(this);
        }
        let element = cx.provider.element_type(self.module, self.id)?;
        cx.types.native(cx, self.module, element)
    }

    fn load_pointer_to(&self, cx: &ProcessContext, this: TypeIndex) -> SymscopeResult<TypeIndex>
    {
        match cx.provider.pointer_to_type(self.module, self.id)? {
            Some(pointer) => cx.types.native(cx, self.module, pointer),
            None => {
                trace!(module = %self.module, type_id = %self.id, "synthesizing pointer type");
                Ok(cx.types.synthetic_pointer(this))
            }
        }
    }

    fn load_fields(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawField>>
    {
        cx.provider
            .type_fields(self.module, self.id)?
            .into_iter()
            .map(|field| {
                Ok(RawField {
                    ty: cx.types.native(cx, self.module, field.type_id)?,
                    name: field.name,
                    offset: field.offset,
                })
            })
            .collect()
    }

    fn load_direct_bases(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawBase>>
    {
        cx.provider
            .direct_base_classes(self.module, self.id)?
            .into_iter()
            .map(|base| {
                Ok(RawBase {
                    ty: cx.types.native(cx, self.module, base.type_id)?,
                    offset: base.offset,
                })
            })
            .collect()
    }

    fn load_template_arguments(&self, cx: &ProcessContext) -> SymscopeResult<Option<Vec<String>>>
    {
        cx.provider.template_arguments(self.module, self.id)
    }

    fn enum_name(&self, cx: &ProcessContext, value: u64) -> SymscopeResult<Option<String>>
    {
        cx.provider.enum_name(self.module, self.id, value)
    }

    fn virtual_base_address(
        &self,
        cx: &ProcessContext,
        object: Address,
        base: &dyn TypeDescriptor,
    ) -> SymscopeResult<Address>
    {
        let Some(base_id) = base.native_id() else {
            return Err(SymscopeError::Provider(format!(
                "virtual base of native type {} is not a native type",
                self.id
            )));
        };
        cx.provider.virtual_base_address(self.module, self.id, object, base_id)
    }
}
