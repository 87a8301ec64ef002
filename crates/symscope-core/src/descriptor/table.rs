//! Per-process type table.
//!
//! Every descriptor the process ever creates is interned here exactly once,
//! keyed by where it came from. Table entries carry the memoized facts of
//! their descriptor; entries are never removed because type definitions do
//! not change during a session.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use tracing::trace;

use super::names;
use super::{
    ManagedType, MemberOffset, NativeType, SyntheticPointerType, TypeDescriptor, TypeKind, TypeTag, UntypedPointerType,
};
use crate::cache::DictionaryCache;
use crate::error::{SymscopeError, SymscopeResult};
use crate::process::ProcessContext;
use crate::types::{ManagedTypeHandle, ModuleId, NativeTypeId};

/// Position of a descriptor in its process's type table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TypeIndex(usize);

impl TypeIndex
{
    pub(crate) fn value(self) -> usize
    {
        self.0
    }
}

/// Where a descriptor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey
{
    Native(ModuleId, NativeTypeId),
    Managed(ManagedTypeHandle),
    Specialized(TypeIndex, u64),
    SyntheticPointer(TypeIndex),
    Untyped(ModuleId),
}

/// Where a member lives relative to the start of the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Location
{
    Offset(u64),
    /// Inside the given virtual base; the member must be re-resolved against
    /// that base once its address is known
    VirtualBase(TypeIndex),
}

impl Location
{
    /// Location of something found at `inner` inside a base located at `self`
    fn compose(self, inner: Location) -> Location
    {
        match (self, inner) {
            (Location::Offset(outer), Location::Offset(inner)) => Location::Offset(outer + inner),
            (Location::Offset(_), virtual_base @ Location::VirtualBase(_)) => virtual_base,
            (virtual_base @ Location::VirtualBase(_), _) => virtual_base,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FieldRecord
{
    pub(crate) name: Arc<str>,
    pub(crate) ty: TypeIndex,
    pub(crate) location: Location,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BaseRecord
{
    pub(crate) ty: TypeIndex,
    pub(crate) location: Location,
}

#[derive(Debug, Clone)]
pub(crate) enum ArgumentRecord
{
    Type(TypeIndex),
    Integer(i64),
    Unresolved(String),
}

/// Field, base class and template argument caches of one type
///
/// Pointer types share the caches of their pointee, so an entry only owns a
/// `MemberCaches` when it is not a pointer. `owner` is `None` for the empty
/// caches given to pointers to pointers.
#[derive(Debug)]
pub(crate) struct MemberCaches
{
    owner: Option<TypeIndex>,
    fields: OnceCell<Arc<[FieldRecord]>>,
    bases: OnceCell<Arc<[BaseRecord]>>,
    all_field_names: OnceCell<Arc<[Arc<str>]>>,
    field_lookup: DictionaryCache<String, FieldRecord>,
    base_lookup: DictionaryCache<String, BaseRecord>,
    template_strings: OnceCell<Arc<[String]>>,
    template_arguments: OnceCell<Arc<[ArgumentRecord]>>,
}

impl MemberCaches
{
    fn new(owner: Option<TypeIndex>) -> Self
    {
        Self {
            owner,
            fields: OnceCell::new(),
            bases: OnceCell::new(),
            all_field_names: OnceCell::new(),
            field_lookup: DictionaryCache::new(),
            base_lookup: DictionaryCache::new(),
            template_strings: OnceCell::new(),
            template_arguments: OnceCell::new(),
        }
    }

    /// Fields declared on the owner itself
    pub(crate) fn fields(&self, cx: &ProcessContext) -> SymscopeResult<Arc<[FieldRecord]>>
    {
        self.fields
            .get_or_try_init(|| {
                let Some(owner) = self.owner else {
                    return Ok(Arc::from(Vec::new()));
                };
                let fields: Vec<FieldRecord> = cx
                    .types
                    .entry(owner)
                    .descriptor
                    .load_fields(cx)?
                    .into_iter()
                    .map(|field| FieldRecord {
                        name: Arc::from(field.name),
                        ty: field.ty,
                        location: Location::Offset(field.offset),
                    })
                    .collect();
                trace!(owner = ?owner, fields = fields.len(), "loaded fields");
                Ok(Arc::from(fields))
            })
            .cloned()
    }

    /// Direct base classes, virtual bases first, then by offset and name
    pub(crate) fn bases(&self, cx: &ProcessContext) -> SymscopeResult<Arc<[BaseRecord]>>
    {
        self.bases
            .get_or_try_init(|| {
                let Some(owner) = self.owner else {
                    return Ok(Arc::from(Vec::new()));
                };
                let mut keyed = Vec::new();
                for base in cx.types.entry(owner).descriptor.load_direct_bases(cx)? {
                    let (order, location) = match base.offset {
                        MemberOffset::Fixed(offset) => ((1, offset), Location::Offset(offset)),
                        MemberOffset::VirtualBase => ((0, 0), Location::VirtualBase(base.ty)),
                    };
                    let name = cx.types.entry(base.ty).name(cx)?;
                    keyed.push((order, name, BaseRecord { ty: base.ty, location }));
                }
                keyed.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
                Ok(keyed.into_iter().map(|(_, _, base)| base).collect())
            })
            .cloned()
    }

    /// Names of own fields followed by inherited ones, without duplicates
    pub(crate) fn all_field_names(&self, cx: &ProcessContext) -> SymscopeResult<Arc<[Arc<str>]>>
    {
        self.all_field_names
            .get_or_try_init(|| {
                let mut names: Vec<Arc<str>> = self.fields(cx)?.iter().map(|field| Arc::clone(&field.name)).collect();
                for base in self.bases(cx)?.iter() {
                    for name in cx.types.entry(base.ty).members(cx)?.all_field_names(cx)?.iter() {
                        if !names.contains(name) {
                            names.push(Arc::clone(name));
                        }
                    }
                }
                Ok(Arc::from(names))
            })
            .cloned()
    }

    /// Own field with the given name
    pub(crate) fn find_own_field(&self, cx: &ProcessContext, name: &str) -> SymscopeResult<Option<FieldRecord>>
    {
        Ok(self.fields(cx)?.iter().find(|field| &*field.name == name).cloned())
    }

    /// Field with the given name, searching own fields before base classes
    pub(crate) fn find_field(&self, cx: &ProcessContext, name: &str) -> SymscopeResult<Option<FieldRecord>>
    {
        if let Some(field) = self.field_lookup.get(name) {
            return Ok(Some(field));
        }

        let mut found = self.find_own_field(cx, name)?;
        if found.is_none() {
            for base in self.bases(cx)?.iter() {
                if let Some(inner) = cx.types.entry(base.ty).members(cx)?.find_field(cx, name)? {
                    found = Some(FieldRecord {
                        location: base.location.compose(inner.location),
                        ..inner
                    });
                    break;
                }
            }
        }

        Ok(found.map(|field| self.field_lookup.insert(name.to_string(), field)))
    }

    /// Ancestor whose name matches `name`, direct bases first
    pub(crate) fn find_base(&self, cx: &ProcessContext, name: &str) -> SymscopeResult<Option<BaseRecord>>
    {
        if let Some(base) = self.base_lookup.get(name) {
            return Ok(Some(base));
        }

        let bases = self.bases(cx)?;
        let mut found = None;
        for base in bases.iter() {
            if names::type_name_matches(&cx.types.entry(base.ty).name(cx)?, name) {
                found = Some(*base);
                break;
            }
        }
        if found.is_none() {
            for base in bases.iter() {
                if let Some(inner) = cx.types.entry(base.ty).members(cx)?.find_base(cx, name)? {
                    found = Some(BaseRecord {
                        ty: inner.ty,
                        location: base.location.compose(inner.location),
                    });
                    break;
                }
            }
        }

        Ok(found.map(|base| self.base_lookup.insert(name.to_string(), base)))
    }

    pub(crate) fn template_strings(&self, cx: &ProcessContext) -> SymscopeResult<Arc<[String]>>
    {
        self.template_strings
            .get_or_try_init(|| {
                let Some(owner) = self.owner else {
                    return Ok(Arc::from(Vec::new()));
                };
                let entry = cx.types.entry(owner);
                let arguments = match entry.descriptor.load_template_arguments(cx)? {
                    Some(arguments) => arguments,
                    None => names::template_arguments(&entry.name(cx)?),
                };
                Ok(Arc::from(arguments))
            })
            .cloned()
    }

    /// Template arguments resolved to integers or types
    ///
    /// Type arguments are looked up in the owner's module first and then in
    /// every module. Tokens that resolve to nothing stay `Unresolved`.
    pub(crate) fn template_arguments(&self, cx: &ProcessContext) -> SymscopeResult<Arc<[ArgumentRecord]>>
    {
        self.template_arguments
            .get_or_try_init(|| {
                let module = self.owner.map(|owner| cx.types.entry(owner).descriptor.module());
                let arguments: Vec<ArgumentRecord> = self
                    .template_strings(cx)?
                    .iter()
                    .map(|token| {
                        if let Some(value) = names::parse_integer(token) {
                            return ArgumentRecord::Integer(value);
                        }
                        let resolved = module
                            .and_then(|module| cx.resolve_type(Some(module), token).ok())
                            .or_else(|| cx.resolve_type(None, token).ok());
                        match resolved {
                            Some(ty) => ArgumentRecord::Type(ty),
                            None => {
                                trace!(argument = %token, "template argument left unresolved");
                                ArgumentRecord::Unresolved(token.clone())
                            }
                        }
                    })
                    .collect();
                Ok::<_, SymscopeError>(Arc::from(arguments))
            })
            .cloned()
    }
}

/// One interned descriptor and its memoized facts
#[derive(Debug)]
pub(crate) struct TypeEntry
{
    pub(crate) index: TypeIndex,
    pub(crate) descriptor: Box<dyn TypeDescriptor>,
    name: OnceCell<Arc<str>>,
    size: OnceCell<u64>,
    element: OnceCell<TypeIndex>,
    pointer_to: OnceCell<TypeIndex>,
    members: OnceCell<Arc<MemberCaches>>,
}

impl TypeEntry
{
    fn new(index: TypeIndex, descriptor: Box<dyn TypeDescriptor>, members: Option<Arc<MemberCaches>>) -> Self
    {
        Self {
            index,
            descriptor,
            name: OnceCell::new(),
            size: OnceCell::new(),
            element: OnceCell::new(),
            pointer_to: OnceCell::new(),
            members: members.map_or_else(OnceCell::new, OnceCell::with_value),
        }
    }

    pub(crate) fn name(&self, cx: &ProcessContext) -> SymscopeResult<Arc<str>>
    {
        self.name
            .get_or_try_init(|| self.descriptor.load_name(cx).map(Arc::from))
            .cloned()
    }

    /// Name if it was already loaded, without asking any provider
    pub(crate) fn cached_name(&self) -> Option<Arc<str>>
    {
        self.name.get().cloned()
    }

    pub(crate) fn size(&self, cx: &ProcessContext) -> SymscopeResult<u64>
    {
        self.size.get_or_try_init(|| self.descriptor.load_size(cx)).copied()
    }

    pub(crate) fn element(&self, cx: &ProcessContext) -> SymscopeResult<TypeIndex>
    {
        self.element
            .get_or_try_init(|| {
                let element = self.descriptor.load_element(cx, self.index)?;
                // A native pointer record is also the answer to "pointer to
                // its element", which saves synthesizing one later.
                if self.descriptor.kind() == TypeKind::Native && self.descriptor.is_pointer() && element != self.index {
                    let _ = cx.types.entry(element).pointer_to.set(self.index);
                }
                Ok(element)
            })
            .copied()
    }

    pub(crate) fn pointer_to(&self, cx: &ProcessContext) -> SymscopeResult<TypeIndex>
    {
        self.pointer_to
            .get_or_try_init(|| self.descriptor.load_pointer_to(cx, self.index))
            .copied()
    }

    pub(crate) fn members(&self, cx: &ProcessContext) -> SymscopeResult<Arc<MemberCaches>>
    {
        self.members
            .get_or_try_init(|| {
                let shares_pointee = self.descriptor.tag() == TypeTag::Pointer
                    && self.descriptor.kind() != TypeKind::UntypedPointer;
                if shares_pointee {
                    let element = self.element(cx)?;
                    if element != self.index {
                        let pointee = cx.types.entry(element);
                        if pointee.descriptor.is_pointer() {
                            return Ok(Arc::new(MemberCaches::new(None)));
                        }
                        return pointee.members(cx);
                    }
                }
                Ok(Arc::new(MemberCaches::new(Some(self.index))))
            })
            .cloned()
    }
}

/// Interning table of every descriptor of one process
#[derive(Debug, Default)]
pub(crate) struct TypeTable
{
    entries: RwLock<Vec<Arc<TypeEntry>>>,
    keys: RwLock<HashMap<TypeKey, TypeIndex>>,
}

impl TypeTable
{
    pub(crate) fn new() -> Self
    {
        Self::default()
    }

    pub(crate) fn entry(&self, index: TypeIndex) -> Arc<TypeEntry>
    {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&entries[index.0])
    }

    pub(crate) fn len(&self) -> usize
    {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn lookup(&self, key: &TypeKey) -> Option<TypeIndex>
    {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).get(key).copied()
    }

    /// Insert a descriptor unless `key` is already present
    ///
    /// `make` runs under the table locks and must not touch the table.
    fn intern(
        &self,
        key: TypeKey,
        members: Option<Arc<MemberCaches>>,
        make: impl FnOnce() -> Box<dyn TypeDescriptor>,
    ) -> TypeIndex
    {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&index) = keys.get(&key) {
            return index;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let index = TypeIndex(entries.len());
        entries.push(Arc::new(TypeEntry::new(index, make(), members)));
        keys.insert(key, index);
        trace!(?key, index = index.0, "interned type descriptor");
        index
    }

    /// Descriptor for a native type record
    pub(crate) fn native(&self, cx: &ProcessContext, module: ModuleId, id: NativeTypeId) -> SymscopeResult<TypeIndex>
    {
        let key = TypeKey::Native(module, id);
        if let Some(index) = self.lookup(&key) {
            return Ok(index);
        }
        let tag = cx.provider.type_tag(module, id)?;
        let builtin = cx.provider.builtin_type(module, id)?;
        Ok(self.intern(key, None, || Box::new(NativeType::new(module, id, tag, builtin))))
    }

    /// Descriptor for a managed type handle
    pub(crate) fn managed(&self, cx: &ProcessContext, handle: ManagedTypeHandle) -> SymscopeResult<TypeIndex>
    {
        let key = TypeKey::Managed(handle);
        if let Some(index) = self.lookup(&key) {
            return Ok(index);
        }
        let Some(runtime) = cx.managed.as_deref() else {
            return Err(SymscopeError::Provider(format!("no managed runtime attached for type handle {handle}")));
        };
        let info = runtime.type_info(handle)?;
        Ok(self.intern(key, None, || Box::new(ManagedType::new(handle, info))))
    }

    /// Pointer type fabricated for `pointee`
    pub(crate) fn synthetic_pointer(&self, pointee: TypeIndex) -> TypeIndex
    {
        let key = TypeKey::SyntheticPointer(pointee);
        if let Some(index) = self.lookup(&key) {
            return index;
        }
        let module = self.entry(pointee).descriptor.module();
        self.intern(key, None, || Box::new(SyntheticPointerType::new(module, pointee)))
    }

    /// The `void*` fallback type of a module
    pub(crate) fn untyped_pointer(&self, module: ModuleId) -> TypeIndex
    {
        let key = TypeKey::Untyped(module);
        if let Some(index) = self.lookup(&key) {
            return index;
        }
        self.intern(key, None, || Box::new(UntypedPointerType::new(module)))
    }

    /// `base` specialized for arrays of `length` elements
    ///
    /// Types without per-instance specialization come back unchanged. The
    /// specialization shares the member caches of `base`.
    pub(crate) fn specialized(&self, cx: &ProcessContext, base: TypeIndex, length: u64) -> SymscopeResult<TypeIndex>
    {
        let key = TypeKey::Specialized(base, length);
        if let Some(index) = self.lookup(&key) {
            return Ok(index);
        }
        let entry = self.entry(base);
        let Some(descriptor) = entry.descriptor.specialize(length) else {
            return Ok(base);
        };
        let members = entry.members(cx)?;
        Ok(self.intern(key, Some(members), || descriptor))
    }
}
