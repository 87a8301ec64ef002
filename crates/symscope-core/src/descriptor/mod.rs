//! # Type Descriptors
//!
//! Polymorphic type metadata over two type systems.
//!
//! A type is described by one of four descriptor kinds:
//!
//! - **Native**: backed by a debug-info type record, queried through the
//!   [`SymbolProvider`](crate::provider::SymbolProvider)
//! - **Managed**: backed by a managed runtime type handle, with offsets and
//!   sizes computed from the runtime's layout rules. Arrays get one
//!   specialized descriptor per instance length.
//! - **Synthetic pointer**: "pointer to X" fabricated when the debug info has
//!   no such record. It borrows X's field and base class caches.
//! - **Untyped pointer**: a `void*` stand-in for addresses without a type
//!
//! Descriptors are interned in the per-process type table and handed out as
//! [`TypeHandle`]s. Everything a descriptor computes is memoized in its table
//! entry, so the providers are asked at most once per fact.

mod handle;
mod managed;
pub(crate) mod names;
mod native;
mod pointer;
pub(crate) mod table;

use std::fmt;

use crate::error::SymscopeResult;
use crate::process::ProcessContext;
use crate::types::{Address, ManagedTypeHandle, ModuleId, NativeTypeId};

pub use handle::{BaseClass, FieldInfo, MemberLocation, TemplateArgument, TypeHandle};
pub(crate) use managed::ManagedType;
pub(crate) use native::NativeType;
pub(crate) use pointer::{SyntheticPointerType, UntypedPointerType};
pub(crate) use table::{TypeIndex, TypeKey, TypeTable};

/// Kind of a native type record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag
{
    /// `struct`
    Struct,
    /// `class`
    Class,
    /// `union`
    Union,
    /// Enumeration
    Enum,
    /// Fixed-size array
    Array,
    /// Pointer or reference
    Pointer,
    /// Function signature
    Function,
    /// Primitive type
    Builtin,
}

/// Primitive classification of a type
///
/// `None` for everything that is not a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuiltinType
{
    /// Not a primitive
    #[default]
    None,
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// 8-bit character
    Char8,
    /// 16-bit character
    Char16,
    /// 32-bit character
    Char32,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Unsigned 64-bit integer
    UInt64,
    /// `float`
    Float32,
    /// `double`
    Float64,
    /// x87 extended precision
    Float80,
}

/// Which descriptor implementation backs a [`TypeHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind
{
    /// Native debug-info record
    Native,
    /// Managed runtime type, possibly specialized for an array length
    Managed,
    /// Pointer type fabricated for a pointee without a pointer record
    SyntheticPointer,
    /// `void*` fallback
    UntypedPointer,
}

/// Where a base class lives inside a derived object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberOffset
{
    /// At a constant byte offset
    Fixed(u64),
    /// Virtual base; the offset depends on the most-derived object and must
    /// be asked from the provider per instance
    VirtualBase,
}

/// A field as loaded from a descriptor, before composition with base classes
#[derive(Debug, Clone)]
pub(crate) struct RawField
{
    pub(crate) name: String,
    pub(crate) ty: TypeIndex,
    pub(crate) offset: u64,
}

/// A direct base class as loaded from a descriptor
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawBase
{
    pub(crate) ty: TypeIndex,
    pub(crate) offset: MemberOffset,
}

/// The abstract type descriptor contract
///
/// Loaders are called at most once per table entry; their results are cached
/// by [`table::TypeEntry`]. `this` is the descriptor's own table index.
pub(crate) trait TypeDescriptor: Send + Sync + fmt::Debug
{
    fn module(&self) -> ModuleId;

    fn kind(&self) -> TypeKind;

    fn tag(&self) -> TypeTag;

    fn builtin(&self) -> BuiltinType;

    fn native_id(&self) -> Option<NativeTypeId>
    {
        None
    }

    fn managed_handle(&self) -> Option<ManagedTypeHandle>
    {
        None
    }

    fn is_pointer(&self) -> bool
    {
        self.tag() == TypeTag::Pointer
    }

    fn is_array(&self) -> bool
    {
        self.tag() == TypeTag::Array
    }

    fn is_enum(&self) -> bool
    {
        self.tag() == TypeTag::Enum
    }

    fn is_function(&self) -> bool
    {
        self.tag() == TypeTag::Function
    }

    fn is_simple(&self) -> bool
    {
        self.tag() == TypeTag::Builtin
    }

    fn is_float(&self) -> bool
    {
        self.builtin() == BuiltinType::Float32
    }

    fn is_double(&self) -> bool
    {
        self.builtin() == BuiltinType::Float64
    }

    fn is_real(&self) -> bool
    {
        matches!(self.builtin(), BuiltinType::Float32 | BuiltinType::Float64 | BuiltinType::Float80)
    }

    /// Character width in bytes when values of this type render as strings
    ///
    /// Arrays of and pointers to 1-byte simple types are ANSI strings; 2-byte
    /// simple types and `char32_t` are wide strings.
    fn char_width(&self, cx: &ProcessContext, this: TypeIndex) -> Option<u64>
    {
        if !(self.is_array() || self.is_pointer()) {
            return None;
        }
        let element = cx.types.entry(this).element(cx).ok()?;
        if element == this {
            return None;
        }
        let element = cx.types.entry(element);
        if element.descriptor.builtin() == BuiltinType::Char32 {
            return Some(4);
        }
        if !element.descriptor.is_simple() {
            return None;
        }
        match element.size(cx).ok()? {
            width @ (1 | 2) => Some(width),
            _ => None,
        }
    }

    fn load_name(&self, cx: &ProcessContext) -> SymscopeResult<String>;

    fn load_size(&self, cx: &ProcessContext) -> SymscopeResult<u64>;

    fn load_element(&self, cx: &ProcessContext, this: TypeIndex) -> SymscopeResult<TypeIndex>;

    fn load_pointer_to(&self, cx: &ProcessContext, this: TypeIndex) -> SymscopeResult<TypeIndex>
    {
        Ok(cx.types.synthetic_pointer(this))
    }

    fn load_fields(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawField>>;

    fn load_direct_bases(&self, cx: &ProcessContext) -> SymscopeResult<Vec<RawBase>>;

    /// Template arguments recorded by the type system itself
    ///
    /// `None` means they should be parsed out of the name.
    fn load_template_arguments(&self, cx: &ProcessContext) -> SymscopeResult<Option<Vec<String>>>
    {
        let _ = cx;
        Ok(None)
    }

    fn enum_name(&self, cx: &ProcessContext, value: u64) -> SymscopeResult<Option<String>>
    {
        let _ = (cx, value);
        Ok(None)
    }

    /// Address of the virtual base `base` inside the instance at `object`
    fn virtual_base_address(
        &self,
        cx: &ProcessContext,
        object: Address,
        base: &dyn TypeDescriptor,
    ) -> SymscopeResult<Address>;

    /// Element count of the array instance at `object`, for types whose size
    /// depends on the instance
    fn instance_array_length(&self, cx: &ProcessContext, object: Address) -> SymscopeResult<Option<u64>>
    {
        let _ = (cx, object);
        Ok(None)
    }

    /// Address of element `index` of the array instance at `object`, for
    /// arrays whose elements are not laid out inline
    fn array_element_address(&self, cx: &ProcessContext, object: Address, index: u64) -> SymscopeResult<Option<Address>>
    {
        let _ = (cx, object, index);
        Ok(None)
    }

    /// Copy of this descriptor specialized for an array of `length` elements
    fn specialize(&self, length: u64) -> Option<Box<dyn TypeDescriptor>>
    {
        let _ = length;
        None
    }
}
