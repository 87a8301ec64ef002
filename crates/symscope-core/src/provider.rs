//! # Symbol and Memory Provider
//!
//! The seam between the symbolic model and whatever actually talks to the
//! target: a live-process debugger backend, a crash dump reader, or an
//! in-memory fake in tests.
//!
//! Providers answer raw questions keyed by provider-issued identifiers
//! ([`ModuleId`], [`NativeTypeId`]). The symbolic model turns the answers into
//! memoized type descriptors, so a provider can stay stateless and slow.

use crate::descriptor::{BuiltinType, MemberOffset, TypeTag};
use crate::error::{SymscopeError, SymscopeResult};
use crate::types::{Address, Architecture, MemoryRegion, ModuleId, NativeTypeId};

/// A loaded module as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo
{
    /// Provider-issued identifier
    pub id: ModuleId,
    /// Module name without path or extension, used in `module!name` lookups
    pub name: String,
    /// Load address
    pub base: Address,
    /// Mapped image size in bytes
    pub size: u64,
}

impl ModuleInfo
{
    /// Check if an address lies inside the mapped image
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.base && address.value() < self.base.value().saturating_add(self.size)
    }
}

/// A field declared directly on a native type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeField
{
    /// Field name
    pub name: String,
    /// Field type
    pub type_id: NativeTypeId,
    /// Byte offset from the start of the declaring type
    pub offset: u64,
}

/// A direct base class of a native type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBaseClass
{
    /// Base class type
    pub type_id: NativeTypeId,
    /// Where the base lives inside the derived object
    pub offset: MemberOffset,
}

/// Dynamic type found through a virtual table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeTypeInfo
{
    /// Module defining the dynamic type
    pub module: ModuleId,
    /// The most-derived type
    pub type_id: NativeTypeId,
    /// Byte offset from the most-derived object to the object whose vtable
    /// pointer was read
    pub offset: i64,
}

/// Location and type of a global variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalVariable
{
    /// Address of the variable's storage
    pub address: Address,
    /// Declared type
    pub type_id: NativeTypeId,
}

/// Memory reads and native debug-info queries for one target process
///
/// Every method may be slow (a live target round-trip); the symbolic model
/// memoizes what it learns. Methods returning `Option` use `None` for "no
/// such thing", which is not an error.
pub trait SymbolProvider: Send + Sync
{
    /// Read exactly `size` bytes starting at `address`
    ///
    /// ## Errors
    ///
    /// Partial reads must be reported as `MemoryReadFailed`.
    fn read_memory(&self, address: Address, size: usize) -> SymscopeResult<Vec<u8>>;

    /// Architecture of the target, which fixes its pointer size
    fn architecture(&self) -> Architecture;

    /// All memory regions of the target, in any order
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the target cannot be queried.
    fn memory_regions(&self) -> SymscopeResult<Vec<MemoryRegion>>;

    /// All loaded modules
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the target cannot be queried.
    fn modules(&self) -> SymscopeResult<Vec<ModuleInfo>>;

    /// Look up a type by name inside one module
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the debug info cannot be read.
    fn find_type(&self, module: ModuleId, name: &str) -> SymscopeResult<Option<NativeTypeId>>;

    /// Kind of a type record
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown type identifiers.
    fn type_tag(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<TypeTag>;

    /// Primitive classification of a type record
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown type identifiers.
    fn builtin_type(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<BuiltinType>;

    /// Display name of a type
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown type identifiers.
    fn type_name(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<String>;

    /// Size of a type in bytes
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown type identifiers.
    fn type_size(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<u64>;

    /// Element type of a pointer or array type
    ///
    /// ## Errors
    ///
    /// Returns an error if the type has no element type.
    fn element_type(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<NativeTypeId>;

    /// Debug-info record for "pointer to this type", if the module has one
    ///
    /// When this returns `None` the symbolic model synthesizes a pointer type.
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the debug info cannot be read.
    fn pointer_to_type(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Option<NativeTypeId>>
    {
        let _ = (module, type_id);
        Ok(None)
    }

    /// Fields declared directly on the type, in declaration order
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown type identifiers.
    fn type_fields(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Vec<NativeField>>;

    /// Direct base classes of the type
    ///
    /// ## Errors
    ///
    /// Returns an error for unknown type identifiers.
    fn direct_base_classes(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Vec<NativeBaseClass>>;

    /// Template arguments as text, when the debug info records them
    ///
    /// When this returns `None` they are parsed out of the type name.
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the debug info cannot be read.
    fn template_arguments(&self, module: ModuleId, type_id: NativeTypeId) -> SymscopeResult<Option<Vec<String>>>
    {
        let _ = (module, type_id);
        Ok(None)
    }

    /// Name of the enumerator with the given value
    ///
    /// ## Errors
    ///
    /// Returns an environment error if the debug info cannot be read.
    fn enum_name(&self, module: ModuleId, type_id: NativeTypeId, value: u64) -> SymscopeResult<Option<String>>
    {
        let _ = (module, type_id, value);
        Ok(None)
    }

    /// Address of a virtual base class inside a concrete object
    ///
    /// `object` is the address of an instance of `derived`; the result is
    /// the address of its `base` sub-object.
    ///
    /// ## Errors
    ///
    /// Returns an error if the virtual base table cannot be read.
    fn virtual_base_address(
        &self,
        module: ModuleId,
        derived: NativeTypeId,
        object: Address,
        base: NativeTypeId,
    ) -> SymscopeResult<Address>;

    /// Map a virtual table address to the dynamic type that owns it
    ///
    /// ## Errors
    ///
    /// Returns an environment error if symbols cannot be read. Unknown
    /// vtables are `Ok(None)`.
    fn runtime_type(&self, vtable: Address) -> SymscopeResult<Option<RuntimeTypeInfo>>;

    /// Look up a global variable inside one module
    ///
    /// ## Errors
    ///
    /// Returns an environment error if symbols cannot be read.
    fn global_variable(&self, module: ModuleId, name: &str) -> SymscopeResult<Option<GlobalVariable>>;

    /// Whether `address` is the start of a public function symbol
    ///
    /// Public symbols of incrementally linked images often point at a jump
    /// thunk rather than at the function body.
    ///
    /// ## Errors
    ///
    /// Returns an environment error if symbols cannot be read.
    fn is_public_function(&self, address: Address) -> SymscopeResult<bool>
    {
        let _ = address;
        Ok(false)
    }

    /// Find the first occurrence of `pattern` in `[start, end)`
    ///
    /// A hit at address `a` only counts when `(a - start) % alignment == 0`.
    /// The default implementation scans the readable regions that overlap
    /// the range in bounded chunks, so a hit may straddle two adjacent
    /// regions, and an unreadable page only hides itself. Providers with a
    /// native search primitive should override it.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` for an empty pattern, or an environment
    /// error if the region list cannot be read.
    fn find_pattern(&self, start: Address, end: Address, pattern: &[u8], alignment: u64) -> SymscopeResult<Option<Address>>
    {
        if pattern.is_empty() {
            return Err(SymscopeError::InvalidArgument("search pattern is empty".to_string()));
        }
        let alignment = alignment.max(1);

        let mut regions = self.memory_regions()?;
        regions.sort_by_key(|region| region.start);

        // Adjacent readable regions form one run.
        let mut runs: Vec<(Address, Address)> = Vec::new();
        for region in regions.iter().filter(|region| region.is_readable()) {
            let low = region.start.max(start);
            let high = region.end.min(end);
            if low >= high {
                continue;
            }
            match runs.last_mut() {
                Some((_, run_end)) if low <= *run_end => *run_end = (*run_end).max(high),
                _ => runs.push((low, high)),
            }
        }

        let search = PatternSearch {
            start,
            pattern,
            alignment,
        };
        for (low, high) in runs {
            if let Some(hit) = search.scan(self, low, high) {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

/// Bytes read per step of the default pattern search
const SEARCH_CHUNK: u64 = 0x10000;

/// Granularity of the retry after a failed chunk
const SEARCH_PAGE: u64 = 0x1000;

struct PatternSearch<'a>
{
    start: Address,
    pattern: &'a [u8],
    alignment: u64,
}

impl PatternSearch<'_>
{
    /// Scan one run of readable memory
    ///
    /// The last `pattern.len() - 1` bytes of each chunk are carried into the
    /// next one. A failed chunk is retried page by page up to the next chunk
    /// boundary; a failed page drops the carry and moves on.
    fn scan<P: SymbolProvider + ?Sized>(&self, provider: &P, low: Address, high: Address) -> Option<Address>
    {
        let keep = self.pattern.len() - 1;
        let mut carry: Vec<u8> = Vec::new();
        let mut cursor = low.value();
        let mut page_mode = false;

        while cursor < high.value() {
            let granule = if page_mode { SEARCH_PAGE } else { SEARCH_CHUNK };
            let step_end = cursor.saturating_add(granule - cursor % granule).min(high.value());
            let Ok(length) = usize::try_from(step_end - cursor) else {
                return None;
            };

            match provider.read_memory(Address::from(cursor), length) {
                Ok(bytes) if bytes.len() == length => {
                    let buffer_start = cursor - carry.len() as u64;
                    carry.extend_from_slice(&bytes);
                    if let Some(hit) = self.find_in(buffer_start, &carry) {
                        return Some(hit);
                    }
                    carry.drain(..carry.len().saturating_sub(keep));
                }
                _ if !page_mode && step_end - cursor > SEARCH_PAGE - cursor % SEARCH_PAGE => {
                    page_mode = true;
                    continue;
                }
                _ => carry.clear(),
            }

            cursor = step_end;
            page_mode = page_mode && cursor % SEARCH_CHUNK != 0;
        }
        None
    }

    /// First aligned hit inside `buffer`, which starts at `buffer_start`
    fn find_in(&self, buffer_start: u64, buffer: &[u8]) -> Option<Address>
    {
        let misalignment = (buffer_start - self.start.value()) % self.alignment;
        let first = if misalignment == 0 { 0 } else { self.alignment - misalignment };
        let first = usize::try_from(first).ok()?;
        let step = usize::try_from(self.alignment).unwrap_or(usize::MAX);
        let last = buffer.len().checked_sub(self.pattern.len())?;

        (first..=last)
            .step_by(step)
            .find(|&offset| buffer[offset..].starts_with(self.pattern))
            .map(|offset| Address::from(buffer_start + offset as u64))
    }
}
