//! Public handle to an interned type descriptor.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::names;
use super::table::{ArgumentRecord, BaseRecord, FieldRecord, Location, TypeEntry};
use super::{BuiltinType, TypeIndex, TypeKind, TypeTag};
use crate::error::{SymscopeError, SymscopeResult};
use crate::process::{Module, Process, ProcessContext};
use crate::types::{Address, ModuleId};
use crate::usertypes::UserType;

/// Where a field or base class lives inside an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLocation
{
    /// At a constant byte offset from the start of the object
    Offset(u64),
    /// Inside the given virtual base class, whose address is only known per
    /// instance
    VirtualBase(TypeHandle),
}

/// A field found by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo
{
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeHandle,
    /// Field location, composed through every base class on the way
    pub location: MemberLocation,
}

/// A base class of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseClass
{
    /// Base class type
    pub ty: TypeHandle,
    /// Where the base sub-object lives inside the derived object
    pub location: MemberLocation,
}

/// A resolved template (or generic) argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateArgument
{
    /// A type argument
    Type(TypeHandle),
    /// An integer literal argument
    Integer(i64),
    /// A token that is neither an integer nor a known type
    Unresolved(String),
}

/// A type as known to one inspected process
///
/// Handles are cheap to clone. Two handles are equal when they refer to the
/// same interned descriptor of the same process. Every query is memoized, so
/// asking twice never reaches the providers twice.
///
/// ## Example
///
/// ```rust,no_run
/// use symscope_core::process::Process;
///
/// # fn demo(process: &Process) -> symscope_core::error::SymscopeResult<()> {
/// let derived = process.type_by_name("app!Derived")?;
/// let field = derived.field("x")?;
/// println!("{} lives at {:?}", field.name, field.location);
///
/// let pointer = derived.pointer_to_type()?;
/// assert_eq!(pointer.element_type()?, derived);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TypeHandle
{
    process: Process,
    index: TypeIndex,
}

impl TypeHandle
{
    pub(crate) fn new(process: Process, index: TypeIndex) -> Self
    {
        Self { process, index }
    }

    pub(crate) fn index(&self) -> TypeIndex
    {
        self.index
    }

    pub(crate) fn cx(&self) -> &ProcessContext
    {
        self.process.context()
    }

    pub(crate) fn entry(&self) -> Arc<TypeEntry>
    {
        self.cx().types.entry(self.index)
    }

    fn sibling(&self, index: TypeIndex) -> TypeHandle
    {
        TypeHandle::new(self.process.clone(), index)
    }

    /// The process this type belongs to
    pub fn process(&self) -> &Process
    {
        &self.process
    }

    /// Identifier of the owning module
    pub fn module_id(&self) -> ModuleId
    {
        self.entry().descriptor.module()
    }

    /// The owning module
    ///
    /// ## Errors
    ///
    /// Returns `ModuleNotFound` if the provider no longer lists the module.
    pub fn module(&self) -> SymscopeResult<Module>
    {
        self.process.module_by_id(self.module_id())
    }

    /// Which descriptor implementation backs this type
    pub fn kind(&self) -> TypeKind
    {
        self.entry().descriptor.kind()
    }

    /// Type record kind
    pub fn tag(&self) -> TypeTag
    {
        self.entry().descriptor.tag()
    }

    /// Primitive classification
    pub fn builtin_type(&self) -> BuiltinType
    {
        self.entry().descriptor.builtin()
    }

    /// `true` for pointers, and for managed object references
    pub fn is_pointer(&self) -> bool
    {
        self.entry().descriptor.is_pointer()
    }

    /// `true` for arrays
    pub fn is_array(&self) -> bool
    {
        self.entry().descriptor.is_array()
    }

    /// `true` for enumerations
    pub fn is_enum(&self) -> bool
    {
        self.entry().descriptor.is_enum()
    }

    /// `true` for function types
    pub fn is_function(&self) -> bool
    {
        self.entry().descriptor.is_function()
    }

    /// `true` for primitives whose value is the data word itself
    pub fn is_simple(&self) -> bool
    {
        self.entry().descriptor.is_simple()
    }

    /// `true` for 32-bit floating point
    pub fn is_float(&self) -> bool
    {
        self.entry().descriptor.is_float()
    }

    /// `true` for 64-bit floating point
    pub fn is_double(&self) -> bool
    {
        self.entry().descriptor.is_double()
    }

    /// `true` for every floating point type
    pub fn is_real(&self) -> bool
    {
        self.entry().descriptor.is_real()
    }

    /// `true` for arrays of and pointers to single-byte characters
    pub fn is_ansi_string(&self) -> bool
    {
        self.char_width() == Some(1)
    }

    /// `true` for arrays of and pointers to UTF-16 or UTF-32 characters
    pub fn is_wide_string(&self) -> bool
    {
        matches!(self.char_width(), Some(2 | 4))
    }

    /// `true` for any string type
    pub fn is_string(&self) -> bool
    {
        self.char_width().is_some()
    }

    pub(crate) fn char_width(&self) -> Option<u64>
    {
        self.entry().descriptor.char_width(self.cx(), self.index)
    }

    /// Type name as the owning type system spells it
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the name cannot be read.
    pub fn name(&self) -> SymscopeResult<Arc<str>>
    {
        self.entry().name(self.cx())
    }

    /// Name for error messages; never fails
    pub(crate) fn display_name(&self) -> String
    {
        match self.name() {
            Ok(name) => name.to_string(),
            Err(_) => format!("<type #{}>", self.index.value()),
        }
    }

    /// Size in bytes
    ///
    /// ## Errors
    ///
    /// Fails with `UnsupportedTypeQuery` for the untyped pointer.
    pub fn size(&self) -> SymscopeResult<u64>
    {
        self.entry().size(self.cx())
    }

    /// Pointee of a pointer, element of an array, or the type itself
    ///
    /// ## Errors
    ///
    /// Fails with `UnsupportedTypeQuery` for the untyped pointer.
    pub fn element_type(&self) -> SymscopeResult<TypeHandle>
    {
        Ok(self.sibling(self.entry().element(self.cx())?))
    }

    /// Pointer to this type, synthesized when the debug info has none
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the debug info cannot be read.
    pub fn pointer_to_type(&self) -> SymscopeResult<TypeHandle>
    {
        Ok(self.sibling(self.entry().pointer_to(self.cx())?))
    }

    /// The pointee for pointers, the type itself otherwise
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the element type cannot be read.
    pub fn remove_pointer(&self) -> SymscopeResult<TypeHandle>
    {
        if self.is_pointer() && self.kind() != TypeKind::UntypedPointer {
            self.element_type()
        } else {
            Ok(self.clone())
        }
    }

    /// Names of all fields, own fields first, then inherited ones
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn field_names(&self) -> SymscopeResult<Vec<String>>
    {
        let members = self.entry().members(self.cx())?;
        Ok(members
            .all_field_names(self.cx())?
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Names of the fields declared on this class, not on its bases
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the layout cannot be read.
    pub fn class_field_names(&self) -> SymscopeResult<Vec<String>>
    {
        let members = self.entry().members(self.cx())?;
        Ok(members.fields(self.cx())?.iter().map(|field| field.name.to_string()).collect())
    }

    /// Look up a field, searching base classes too
    ///
    /// ## Errors
    ///
    /// Returns `FieldNotFound` if neither the type nor any ancestor declares
    /// the field.
    pub fn field(&self, name: &str) -> SymscopeResult<FieldInfo>
    {
        let members = self.entry().members(self.cx())?;
        match members.find_field(self.cx(), name)? {
            Some(record) => Ok(self.field_info(record)),
            None => Err(self.field_not_found(name)),
        }
    }

    /// Look up a field declared on this class itself
    ///
    /// ## Errors
    ///
    /// Returns `FieldNotFound` if the class does not declare the field.
    pub fn class_field(&self, name: &str) -> SymscopeResult<FieldInfo>
    {
        let members = self.entry().members(self.cx())?;
        match members.find_own_field(self.cx(), name)? {
            Some(record) => Ok(self.field_info(record)),
            None => Err(self.field_not_found(name)),
        }
    }

    /// Location of a field, searching base classes too
    ///
    /// ## Errors
    ///
    /// Returns `FieldNotFound` for unknown names.
    pub fn field_offset(&self, name: &str) -> SymscopeResult<MemberLocation>
    {
        Ok(self.field(name)?.location)
    }

    /// Every field, own fields first
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn fields(&self) -> SymscopeResult<Vec<FieldInfo>>
    {
        self.field_names()?.iter().map(|name| self.field(name)).collect()
    }

    /// Location of every field by name
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn field_offsets(&self) -> SymscopeResult<HashMap<String, MemberLocation>>
    {
        Ok(self.fields()?.into_iter().map(|field| (field.name, field.location)).collect())
    }

    /// Type of every field by name
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn field_types(&self) -> SymscopeResult<HashMap<String, TypeHandle>>
    {
        Ok(self.fields()?.into_iter().map(|field| (field.name, field.ty)).collect())
    }

    /// Direct base classes, virtual bases first, then by offset and name
    ///
    /// ## Errors
    ///
    /// Fails with `UnsupportedTypeQuery` for the untyped pointer.
    pub fn direct_base_classes(&self) -> SymscopeResult<Vec<BaseClass>>
    {
        let members = self.entry().members(self.cx())?;
        Ok(members.bases(self.cx())?.iter().map(|base| self.base_info(*base)).collect())
    }

    /// The single direct base class
    ///
    /// ## Errors
    ///
    /// Returns `NoBaseClass` or `MultipleBaseClasses` unless the type has
    /// exactly one direct base.
    pub fn inherited_class(&self) -> SymscopeResult<BaseClass>
    {
        let mut bases = self.direct_base_classes()?;
        match bases.len() {
            0 => Err(SymscopeError::NoBaseClass(self.display_name())),
            1 => Ok(bases.remove(0)),
            count => Err(SymscopeError::MultipleBaseClasses {
                type_name: self.display_name(),
                count,
            }),
        }
    }

    /// Find a base class by name anywhere in the hierarchy
    ///
    /// The type itself matches at offset 0. Names follow the case-insensitive
    /// and open-generic (`Name<>`) matching rules.
    ///
    /// ## Errors
    ///
    /// Returns `BaseClassNotFound` if no ancestor matches.
    pub fn base_class(&self, name: &str) -> SymscopeResult<BaseClass>
    {
        let own = self.remove_pointer()?;
        if names::type_name_matches(&own.name()?, name) {
            return Ok(BaseClass {
                ty: own,
                location: MemberLocation::Offset(0),
            });
        }

        let members = self.entry().members(self.cx())?;
        match members.find_base(self.cx(), name)? {
            Some(record) => Ok(self.base_info(record)),
            None => Err(SymscopeError::BaseClassNotFound {
                type_name: self.display_name(),
                base: name.to_string(),
            }),
        }
    }

    /// Template arguments as written in the type
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the name cannot be read.
    pub fn template_argument_strings(&self) -> SymscopeResult<Vec<String>>
    {
        let members = self.entry().members(self.cx())?;
        Ok(members.template_strings(self.cx())?.to_vec())
    }

    /// Template arguments resolved to types and integers
    ///
    /// Arguments that resolve to neither stay [`TemplateArgument::Unresolved`]
    /// instead of failing the whole query.
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the name cannot be read.
    pub fn template_arguments(&self) -> SymscopeResult<Vec<TemplateArgument>>
    {
        let members = self.entry().members(self.cx())?;
        Ok(members
            .template_arguments(self.cx())?
            .iter()
            .map(|argument| match argument {
                ArgumentRecord::Type(index) => TemplateArgument::Type(self.sibling(*index)),
                ArgumentRecord::Integer(value) => TemplateArgument::Integer(*value),
                ArgumentRecord::Unresolved(token) => TemplateArgument::Unresolved(token.clone()),
            })
            .collect())
    }

    /// `true` if this type is `other` or derives from it
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn inherits(&self, other: &TypeHandle) -> SymscopeResult<bool>
    {
        if self == other {
            return Ok(true);
        }
        for base in self.direct_base_classes()? {
            if base.ty.inherits(other)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `true` if this type or an ancestor matches `name`
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn inherits_name(&self, name: &str) -> SymscopeResult<bool>
    {
        if names::type_name_matches(&self.name()?, name) {
            return Ok(true);
        }
        for base in self.direct_base_classes()? {
            if base.ty.inherits_name(name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `true` if this type or an ancestor is described by `T`'s metadata
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn inherits_user_type<T: UserType>(&self) -> SymscopeResult<bool>
    {
        for metadata in T::metadata() {
            if self.module_matches(metadata.module_name.as_deref())? && self.inherits_name(&metadata.type_name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// `true` if `T`'s metadata describes exactly this type
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the name cannot be read.
    pub fn is_for_user_type<T: UserType>(&self) -> SymscopeResult<bool>
    {
        for metadata in T::metadata() {
            if metadata.matches(self)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Names of the registered user types that describe this type
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the name cannot be read.
    pub fn user_types(&self) -> SymscopeResult<Vec<&'static str>>
    {
        self.cx().user_types.matching(self)
    }

    pub(crate) fn module_matches(&self, module_name: Option<&str>) -> SymscopeResult<bool>
    {
        let Some(expected) = module_name else {
            return Ok(true);
        };
        Ok(self
            .cx()
            .module_info(self.module_id())?
            .is_some_and(|module| module.name.eq_ignore_ascii_case(expected)))
    }

    /// Enumerator name of `value`
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the debug info cannot be read.
    pub fn enum_name(&self, value: u64) -> SymscopeResult<Option<String>>
    {
        self.entry().descriptor.enum_name(self.cx(), value)
    }

    /// This type specialized for the array instance at `object`
    pub(crate) fn specialize_for_instance(&self, object: Address) -> SymscopeResult<TypeHandle>
    {
        let entry = self.entry();
        match entry.descriptor.instance_array_length(self.cx(), object)? {
            Some(length) => Ok(self.sibling(self.cx().types.specialized(self.cx(), self.index, length)?)),
            None => Ok(self.clone()),
        }
    }

    pub(crate) fn virtual_base_address(&self, object: Address, base: &TypeHandle) -> SymscopeResult<Address>
    {
        let base_entry = base.entry();
        self.entry()
            .descriptor
            .virtual_base_address(self.cx(), object, base_entry.descriptor.as_ref())
    }

    pub(crate) fn instance_element_address(&self, object: Address, index: u64) -> SymscopeResult<Option<Address>>
    {
        self.entry().descriptor.array_element_address(self.cx(), object, index)
    }

    fn location(&self, location: Location) -> MemberLocation
    {
        match location {
            Location::Offset(offset) => MemberLocation::Offset(offset),
            Location::VirtualBase(index) => MemberLocation::VirtualBase(self.sibling(index)),
        }
    }

    fn field_info(&self, record: FieldRecord) -> FieldInfo
    {
        FieldInfo {
            name: record.name.to_string(),
            ty: self.sibling(record.ty),
            location: self.location(record.location),
        }
    }

    fn base_info(&self, record: BaseRecord) -> BaseClass
    {
        BaseClass {
            ty: self.sibling(record.ty),
            location: self.location(record.location),
        }
    }

    fn field_not_found(&self, field: &str) -> SymscopeError
    {
        SymscopeError::FieldNotFound {
            type_name: self.display_name(),
            field: field.to_string(),
        }
    }
}

impl PartialEq for TypeHandle
{
    fn eq(&self, other: &Self) -> bool
    {
        self.index == other.index && self.process.ptr_eq(&other.process)
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle
{
    fn hash<H: Hasher>(&self, state: &mut H)
    {
        self.index.hash(state);
        std::ptr::hash(self.process.context(), state);
    }
}

impl fmt::Debug for TypeHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("TypeHandle")
            .field("index", &self.index.value())
            .field("name", &self.entry().cached_name())
            .finish()
    }
}

impl fmt::Display for TypeHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.display_name())
    }
}
