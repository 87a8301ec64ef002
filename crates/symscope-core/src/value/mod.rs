//! # Symbolic Values
//!
//! A [`Value`] is a typed handle to something living inside the inspected
//! process: a type, a storage address, and a name and path for diagnostics.
//! Nothing is copied out of the target until a conversion or a navigation
//! step needs it.
//!
//! ## Pointers
//!
//! For pointer-typed values the interesting address is not where the pointer
//! is stored but where it points. That pointee address is the value's *data
//! word*, read from the storage address on first use. Values manufactured by
//! casts and pointer arithmetic carry their data word directly and have no
//! storage address (it is zero).
//!
//! ## Caching
//!
//! The data word and the resolved runtime type are cached per value and
//! stamped with the process's cache generation, so
//! [`Process::invalidate_all`](crate::process::Process::invalidate_all)
//! drops them without visiting any value. With value interning enabled,
//! equal values (same type, address, name and path) share those caches.
//!
//! ## Example
//!
//! ```rust,no_run
//! use symscope_core::process::Process;
//!
//! # fn demo(process: &Process) -> symscope_core::error::SymscopeResult<()> {
//! let list = process.global("app!g_list")?;
//! let head = list.field("head")?.dereference()?;
//! let second = head.field("values")?.array_element(1)?;
//! println!("{} = {}", second.path(), second.to_i32()?);
//! # Ok(())
//! # }
//! ```

mod convert;
mod runtime;

use std::fmt;
use std::sync::Arc;

use crate::cache::EpochCell;
use crate::descriptor::{BaseClass, MemberLocation, TypeHandle, TypeIndex, TypeKind};
use crate::error::{SymscopeError, SymscopeResult};
use crate::process::Process;
use crate::types::Address;
use crate::usertypes::{UserObject, UserType};

/// Name given to values produced by indexing and arithmetic
pub const COMPUTED_NAME: &str = "<computed>";

/// Path of values created without one
pub const UNKNOWN_PATH: &str = "<unknown>";

/// Path of every derived value when path tracking is disabled
pub const UNTRACKED_PATH: &str = "<untracked>";

/// Lazily resolved state of a value
#[derive(Debug, Default)]
pub(crate) struct ValueState
{
    fixed_data: Option<u64>,
    data: EpochCell<u64>,
    runtime: EpochCell<(TypeIndex, i64)>,
}

impl ValueState
{
    fn with_data(data: u64) -> Self
    {
        Self {
            fixed_data: Some(data),
            ..Self::default()
        }
    }
}

/// Identity of an interned value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ValueKey
{
    ty: TypeIndex,
    address: Address,
    name: Arc<str>,
    path: Arc<str>,
}

/// A typed handle to a value inside the inspected process
///
/// Values are immutable: casts and navigation return new values. Cloning is
/// cheap and clones share their caches.
#[derive(Clone)]
pub struct Value
{
    ty: TypeHandle,
    address: Address,
    name: Arc<str>,
    path: Arc<str>,
    state: Arc<ValueState>,
}

impl Value
{
    /// Value stored at `address`, reading its data word on demand
    pub(crate) fn at(ty: TypeHandle, address: Address, name: Arc<str>, path: Arc<str>) -> Self
    {
        let cx = ty.cx();
        let state = if cx.config.intern_values {
            let key = ValueKey {
                ty: ty.index(),
                address,
                name: Arc::clone(&name),
                path: Arc::clone(&path),
            };
            match cx.values.get(&key) {
                Some(state) => state,
                None => cx.values.insert(key, Arc::new(ValueState::default())),
            }
        } else {
            Arc::new(ValueState::default())
        };

        Self {
            ty,
            address,
            name,
            path,
            state,
        }
    }

    /// Value with a known data word and storage address
    pub(crate) fn with_data(ty: TypeHandle, address: Address, data: u64, name: Arc<str>, path: Arc<str>) -> Self
    {
        Self {
            ty,
            address,
            name,
            path,
            state: Arc::new(ValueState::with_data(data)),
        }
    }

    /// Pointer value pointing at `target`, with no storage of its own
    pub(crate) fn pointer(ty: TypeHandle, target: Address, name: Arc<str>, path: Arc<str>) -> Self
    {
        Self::with_data(ty, Address::ZERO, target.value(), name, path)
    }

    /// Static type
    pub fn ty(&self) -> &TypeHandle
    {
        &self.ty
    }

    /// The process this value lives in
    pub fn process(&self) -> &Process
    {
        self.ty.process()
    }

    /// Diagnostic name
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Diagnostic access path, such as `g_list.head[2]`
    pub fn path(&self) -> &str
    {
        &self.path
    }

    /// Storage address, zero for manufactured pointer values
    pub fn memory_address(&self) -> Address
    {
        self.address
    }

    /// The raw data word
    ///
    /// Pointers read a pointer-sized word; everything else reads as many
    /// bytes as the type is large.
    ///
    /// ## Errors
    ///
    /// Returns `MemoryReadFailed` if the storage is unreadable and
    /// `UnsupportedDataSize` unless the word is 1, 2, 4 or 8 bytes wide.
    pub fn data(&self) -> SymscopeResult<u64>
    {
        if let Some(data) = self.state.fixed_data {
            return Ok(data);
        }
        let cx = self.ty.cx();
        self.state.data.get_or_try_init(cx.epoch.current(), || {
            let size = if self.ty.is_pointer() { cx.pointer_size() } else { self.ty.size()? };
            cx.read_word(self.address, size)
        })
    }

    /// The raw data word, same as [`Value::data`]
    ///
    /// ## Errors
    ///
    /// See [`Value::data`].
    pub fn bits(&self) -> SymscopeResult<u64>
    {
        self.data()
    }

    /// Pointee address for pointers, storage address otherwise
    ///
    /// ## Errors
    ///
    /// Returns the read error if a pointer's data word is unreadable.
    pub fn pointer_address(&self) -> SymscopeResult<Address>
    {
        if self.ty.is_pointer() {
            self.data().map(Address::from)
        } else {
            Ok(self.address)
        }
    }

    /// `true` for pointers to address zero
    ///
    /// ## Errors
    ///
    /// Returns the read error if the data word is unreadable.
    pub fn is_null_pointer(&self) -> SymscopeResult<bool>
    {
        Ok(self.ty.is_pointer() && self.data()? == 0)
    }

    fn child_path(&self, suffix: impl FnOnce() -> String) -> Arc<str>
    {
        if !self.ty.cx().config.track_paths {
            return Arc::from(UNTRACKED_PATH);
        }
        let base = match &*self.path {
            UNKNOWN_PATH | UNTRACKED_PATH | COMPUTED_NAME => &self.name,
            _ => &self.path,
        };
        if &**base == COMPUTED_NAME {
            return Arc::from(COMPUTED_NAME);
        }
        Arc::from(format!("{base}{}", suffix()))
    }

    fn computed_name() -> Arc<str>
    {
        Arc::from(COMPUTED_NAME)
    }

    /// Element `index` of an array, or of the array a pointer points into
    ///
    /// The element lives at `pointer_address + index * size(element)`.
    ///
    /// ## Errors
    ///
    /// Returns `NotArrayOrPointer` for other types.
    pub fn array_element(&self, index: u64) -> SymscopeResult<Value>
    {
        if !(self.ty.is_array() || self.ty.is_pointer()) {
            return Err(SymscopeError::NotArrayOrPointer(self.ty.display_name()));
        }

        let element = self.ty.element_type()?;
        let base = self.pointer_address()?;
        let address = match self.ty.instance_element_address(base, index)? {
            Some(address) => address,
            None => base + index.wrapping_mul(element.size()?),
        };
        let path = self.child_path(|| format!("[{index}]"));
        Value::at(element, address, Self::computed_name(), path).upcast_managed()
    }

    /// The value a pointer points to
    ///
    /// ## Errors
    ///
    /// Returns `NotPointer` for non-pointer types.
    pub fn dereference(&self) -> SymscopeResult<Value>
    {
        if !self.ty.is_pointer() {
            return Err(SymscopeError::NotPointer(self.ty.display_name()));
        }
        self.array_element(0)
    }

    /// Shift a value by `offset` bytes, keeping its type
    ///
    /// Pointers move their pointee address; other values move their storage
    /// address.
    ///
    /// ## Errors
    ///
    /// Returns `NotPointer` for non-pointer values without storage.
    pub fn adjust_pointer(&self, offset: i64) -> SymscopeResult<Value>
    {
        let (name, path) = (Arc::clone(&self.name), Arc::clone(&self.path));
        if self.ty.is_pointer() {
            Ok(Value::pointer(self.ty.clone(), self.pointer_address()?.offset(offset), name, path))
        } else if !self.address.is_null() {
            Ok(Value::at(self.ty.clone(), self.address.offset(offset), name, path))
        } else {
            Err(SymscopeError::NotPointer(self.ty.display_name()))
        }
    }

    /// Reinterpret the value as another type
    ///
    /// - same type: the value itself
    /// - pointer to pointer: same data word
    /// - anything to pointer: the storage address becomes the data word
    /// - pointer to non-pointer: the value the data word points at
    /// - otherwise: the same storage read as the new type
    ///
    /// ## Errors
    ///
    /// Returns `NullAddressCast` when a non-pointer without storage is cast
    /// to a non-pointer type.
    pub fn cast_as(&self, new_type: &TypeHandle) -> SymscopeResult<Value>
    {
        if new_type == &self.ty {
            return Ok(self.clone());
        }

        let (name, path) = (Arc::clone(&self.name), Arc::clone(&self.path));
        let new_type = new_type.clone();
        if self.ty.is_pointer() && new_type.is_pointer() {
            Ok(Value::with_data(new_type, self.address, self.data()?, name, path))
        } else if new_type.is_pointer() {
            Ok(Value::pointer(new_type, self.address, name, path))
        } else if self.ty.is_pointer() {
            Ok(Value::at(new_type, Address::from(self.data()?), name, path))
        } else if !self.address.is_null() {
            Ok(Value::at(new_type, self.address, name, path))
        } else {
            Err(SymscopeError::NullAddressCast {
                from: self.ty.display_name(),
                to: new_type.display_name(),
            })
        }
    }

    /// Cast to a type looked up by name
    ///
    /// `module!name` searches that module; a bare name searches the module
    /// of the value's own type. A trailing `*` asks for the pointer type.
    ///
    /// ## Errors
    ///
    /// Returns the lookup error, or the cast error of [`Value::cast_as`].
    pub fn cast_as_name(&self, type_name: &str) -> SymscopeResult<Value>
    {
        let new_type = if type_name.contains('!') {
            self.process().type_by_name(type_name)?
        } else {
            self.ty.module()?.type_by_name(type_name)?
        };
        self.cast_as(&new_type)
    }

    /// Wrap the value in a user type
    ///
    /// Null pointers produce `None`.
    ///
    /// ## Errors
    ///
    /// Returns whatever the wrapper's constructor fails with.
    pub fn cast_as_user<T: UserType>(&self) -> SymscopeResult<Option<T>>
    {
        if self.is_null_pointer()? {
            return Ok(None);
        }
        T::from_value(self.clone()).map(Some)
    }

    /// Wrap the value in the first registered user type describing its type
    ///
    /// ## Errors
    ///
    /// Returns `UserTypeNotRegistered` if no registered wrapper applies.
    pub fn to_user_object(&self) -> SymscopeResult<UserObject>
    {
        self.ty
            .cx()
            .user_types
            .construct(self)?
            .ok_or_else(|| SymscopeError::UserTypeNotRegistered(self.ty.display_name()))
    }

    /// The single direct base class sub-object
    ///
    /// ## Errors
    ///
    /// Returns `NoBaseClass` or `MultipleBaseClasses` unless the type has
    /// exactly one direct base.
    pub fn base_class(&self) -> SymscopeResult<Value>
    {
        let base = self.ty.inherited_class()?;
        self.base_sub_object(&base)
    }

    /// Direct base class sub-object by position in the sorted base list
    ///
    /// ## Errors
    ///
    /// Returns `BaseClassIndexOutOfRange` past the last base.
    pub fn base_class_at(&self, index: usize) -> SymscopeResult<Value>
    {
        let bases = self.ty.direct_base_classes()?;
        let Some(base) = bases.get(index) else {
            return Err(SymscopeError::BaseClassIndexOutOfRange {
                type_name: self.ty.display_name(),
                index,
                count: bases.len(),
            });
        };
        self.base_sub_object(base)
    }

    /// Base class sub-object by name, searching the whole hierarchy
    ///
    /// ## Errors
    ///
    /// Returns `BaseClassNotFound` if no ancestor matches.
    pub fn base_class_named(&self, name: &str) -> SymscopeResult<Value>
    {
        let base = self.ty.base_class(name)?;
        self.base_sub_object(&base)
    }

    fn base_sub_object(&self, base: &BaseClass) -> SymscopeResult<Value>
    {
        match &base.location {
            MemberLocation::Offset(offset) => self.to_base(&base.ty, BaseAt::Fixed(*offset)),
            MemberLocation::VirtualBase(virtual_base) if virtual_base == &base.ty => {
                self.to_base(&base.ty, BaseAt::Virtual)
            }
            MemberLocation::VirtualBase(virtual_base) => {
                // The base sits somewhere inside a virtual base; find that
                // first and continue from there.
                let via = self.to_base(virtual_base, BaseAt::Virtual)?;
                via.base_class_named(&base.ty.name()?)
            }
        }
    }

    fn to_base(&self, base: &TypeHandle, at: BaseAt) -> SymscopeResult<Value>
    {
        if base == &self.ty {
            return Ok(self.clone());
        }
        let mut new_type = base.clone();
        if self.ty.is_pointer() && !new_type.is_pointer() {
            new_type = new_type.pointer_to_type()?;
            if new_type == self.ty {
                return Ok(self.clone());
            }
        }

        let object = self.pointer_address()?;
        let address = match at {
            BaseAt::Fixed(offset) => object + offset,
            BaseAt::Virtual => self.ty.remove_pointer()?.virtual_base_address(object, base)?,
        };

        let (name, path) = (Arc::clone(&self.name), Arc::clone(&self.path));
        if new_type.is_pointer() {
            Ok(Value::pointer(new_type, address, name, path))
        } else {
            Ok(Value::at(new_type, address, name, path))
        }
    }

    /// Field declared on the value's own class
    ///
    /// ## Errors
    ///
    /// Returns `FieldNotFound` if the class does not declare the field.
    pub fn class_field(&self, name: &str) -> SymscopeResult<Value>
    {
        let field = self.ty.class_field(name)?;
        match field.location {
            MemberLocation::Offset(offset) => self.field_at(field.ty, offset, name),
            MemberLocation::VirtualBase(virtual_base) => self.to_base(&virtual_base, BaseAt::Virtual)?.field(name),
        }
    }

    /// Field declared on the value's class or any ancestor
    ///
    /// Fields inside a virtual base are read relative to that base, whose
    /// address is resolved for this instance first.
    ///
    /// ## Errors
    ///
    /// Returns `FieldNotFound` if no class in the hierarchy declares it.
    pub fn field(&self, name: &str) -> SymscopeResult<Value>
    {
        let field = self.ty.field(name)?;
        match field.location {
            MemberLocation::Offset(offset) => self.field_at(field.ty, offset, name),
            MemberLocation::VirtualBase(virtual_base) => self.to_base(&virtual_base, BaseAt::Virtual)?.field(name),
        }
    }

    fn field_at(&self, ty: TypeHandle, offset: u64, name: &str) -> SymscopeResult<Value>
    {
        let address = self.pointer_address()? + offset;
        let path = self.child_path(|| format!(".{name}"));
        Value::at(ty, address, Arc::from(name), path).upcast_managed()
    }

    /// Location of a field relative to the start of the object
    ///
    /// ## Errors
    ///
    /// Returns `FieldNotFound` for unknown names.
    pub fn field_offset(&self, name: &str) -> SymscopeResult<MemberLocation>
    {
        self.ty.field_offset(name)
    }

    /// Names of all fields, inherited ones included
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if a layout cannot be read.
    pub fn field_names(&self) -> SymscopeResult<Vec<String>>
    {
        self.ty.field_names()
    }

    /// Names of the fields declared on the value's own class
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the layout cannot be read.
    pub fn class_field_names(&self) -> SymscopeResult<Vec<String>>
    {
        self.ty.class_field_names()
    }

    /// Every field as a value, own fields first
    ///
    /// ## Errors
    ///
    /// Returns the first error encountered.
    pub fn fields(&self) -> SymscopeResult<Vec<Value>>
    {
        self.field_names()?.iter().map(|name| self.field(name)).collect()
    }

    /// Pointer to this value
    ///
    /// ## Errors
    ///
    /// Returns `NullAddressCast` for values without storage.
    pub fn address_of(&self) -> SymscopeResult<Value>
    {
        let pointer_type = self.ty.pointer_to_type()?;
        if self.address.is_null() {
            return Err(SymscopeError::NullAddressCast {
                from: self.ty.display_name(),
                to: pointer_type.display_name(),
            });
        }
        Ok(Value::pointer(
            pointer_type,
            self.address,
            Arc::clone(&self.name),
            Arc::clone(&self.path),
        ))
    }

    /// Number of elements of an array value
    ///
    /// Arrays sized per instance (managed arrays) read the length from the
    /// instance.
    ///
    /// ## Errors
    ///
    /// Returns `NotArray` for other types.
    pub fn array_length(&self) -> SymscopeResult<u64>
    {
        if !self.ty.is_array() {
            return Err(SymscopeError::NotArray(self.ty.display_name()));
        }
        let ty = self.ty.specialize_for_instance(self.pointer_address()?)?;
        let element_size = ty.element_type()?.size()?;
        if element_size == 0 {
            return Ok(0);
        }
        Ok(ty.size()? / element_size)
    }

    /// Structural equality
    ///
    /// A value always equals itself and any value of the same type stored at
    /// the same address, without reading memory. Two null pointers are
    /// equal. Otherwise the pointer addresses must match and either the
    /// types are the same, both are pointers to the same type, or one is a
    /// pointer to the other's type.
    ///
    /// ## Errors
    ///
    /// Returns the read error if a data word is unreadable.
    pub fn equals(&self, other: &Value) -> SymscopeResult<bool>
    {
        if self.is_same_storage(other) {
            return Ok(true);
        }
        if self.is_null_pointer()? && other.is_null_pointer()? {
            return Ok(true);
        }
        if self.pointer_address()? != other.pointer_address()? {
            return Ok(false);
        }
        if self.ty == other.ty {
            return Ok(true);
        }

        match (self.ty.is_pointer(), other.ty.is_pointer()) {
            (true, true) => {
                let (left, right) = (pointee(&self.ty)?, pointee(&other.ty)?);
                Ok(left.is_some() && left == right)
            }
            (false, false) => Ok(false),
            (true, false) => Ok(pointee(&self.ty)?.as_ref() == Some(&other.ty)),
            (false, true) => Ok(pointee(&other.ty)?.as_ref() == Some(&self.ty)),
        }
    }
}

impl Value
{
    /// Same type and either the same state or the same non-zero storage
    fn is_same_storage(&self, other: &Value) -> bool
    {
        if self.ty != other.ty || self.address != other.address {
            return false;
        }
        Arc::ptr_eq(&self.state, &other.state) || self.address != Address::ZERO
    }
}

#[derive(Debug, Clone, Copy)]
enum BaseAt
{
    Fixed(u64),
    Virtual,
}

fn pointee(ty: &TypeHandle) -> SymscopeResult<Option<TypeHandle>>
{
    if ty.kind() == TypeKind::UntypedPointer {
        return Ok(None);
    }
    ty.element_type().map(Some)
}

impl PartialEq for Value
{
    fn eq(&self, other: &Self) -> bool
    {
        self.equals(other).unwrap_or(false)
    }
}

impl fmt::Debug for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Value")
            .field("ty", &self.ty)
            .field("address", &self.address)
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.to_display_string() {
            Ok(text) => f.write_str(&text),
            Err(error) => write!(f, "<{error}>"),
        }
    }
}
