//! # Managed Runtime Bridge
//!
//! Reflection over a managed (garbage-collected) runtime hosted in the target.
//!
//! The bridge reports type handles with their layout flags; the symbolic model
//! applies the runtime's layout rules on top (object header skipping for
//! reference classes, primitive sizes, per-instance array specialization).

use crate::error::SymscopeResult;
use crate::types::{Address, ManagedTypeHandle, ModuleId};

/// Runtime element kind of a managed type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind
{
    /// `bool`
    Boolean,
    /// UTF-16 code unit
    Char,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// Pointer-sized signed integer
    NativeInt,
    /// Pointer-sized unsigned integer
    NativeUInt,
    /// String object reference
    String,
    /// Reference to an instance of a class
    Class,
    /// Inline value class
    Struct,
    /// Multi-dimensional array reference
    Array,
    /// Single-dimensional, zero-based array reference
    SzArray,
    /// `object` reference
    Object,
    /// Unmanaged pointer
    Pointer,
    /// Function pointer
    FunctionPointer,
    /// Anything the bridge cannot classify
    Unknown,
}

/// An instance field of a managed type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedField
{
    /// Field name
    pub name: String,
    /// Field type
    pub type_handle: ManagedTypeHandle,
    /// Offset as reported by the runtime, not counting the object header
    pub offset: u64,
}

/// Layout facts about one managed type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedTypeInfo
{
    /// Fully qualified type name
    pub name: String,
    /// Module defining the type
    pub module: ModuleId,
    /// Runtime element kind
    pub element_kind: ElementKind,
    /// Direct base type (absent for `System.Object` and interfaces)
    pub base_type: Option<ManagedTypeHandle>,
    /// Element type of arrays and pointers
    pub component_type: Option<ManagedTypeHandle>,
    /// Array type
    pub is_array: bool,
    /// Enumeration type
    pub is_enum: bool,
    /// Unmanaged pointer type
    pub is_pointer: bool,
    /// Values of this type are references to heap objects
    pub is_object_reference: bool,
    /// Built-in primitive (integers, floats, `bool`, `char`)
    pub is_primitive: bool,
    /// Value class (laid out inline, no object header)
    pub is_value_class: bool,
    /// The value fits in a single data word
    pub has_simple_value: bool,
    /// Instance size for value classes and objects
    pub base_size: u64,
    /// Size of one array element
    pub element_size: u64,
    /// Instance fields declared on this type, not on its bases
    pub fields: Vec<ManagedField>,
}

/// Reflection queries against a managed runtime in the target
pub trait ManagedRuntime: Send + Sync
{
    /// Layout facts about a type handle
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown handles.
    fn type_info(&self, handle: ManagedTypeHandle) -> SymscopeResult<ManagedTypeInfo>;

    /// Look up a type by name, optionally restricted to one module
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the runtime cannot be queried.
    fn find_type(&self, module: Option<ModuleId>, name: &str) -> SymscopeResult<Option<ManagedTypeHandle>>
    {
        let _ = (module, name);
        Ok(None)
    }

    /// Number of elements in the array object at `object`
    ///
    /// ## Errors
    ///
    /// Returns an error if the array header cannot be read.
    fn array_length(&self, handle: ManagedTypeHandle, object: Address) -> SymscopeResult<u64>;

    /// Address of element `index` of the array object at `object`
    ///
    /// ## Errors
    ///
    /// Returns an error if the array header cannot be read.
    fn array_element_address(&self, handle: ManagedTypeHandle, object: Address, index: u64) -> SymscopeResult<Address>;

    /// Dynamic type of the heap object at `object`
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the object header cannot be read.
    fn object_type(&self, object: Address) -> SymscopeResult<Option<ManagedTypeHandle>>
    {
        let _ = object;
        Ok(None)
    }
}
