//! # Process Context
//!
//! One [`Process`] per inspected target. It owns the providers, the caching
//! policy and every cache of the symbolic model, so two targets can be open
//! side by side without sharing state.
//!
//! ## Cache Lifetime
//!
//! Type metadata is loaded once and kept for the whole session. Everything
//! derived from target memory (value data words, runtime types, strings, the
//! module and region lists) is tied to a cache generation. Call
//! [`Process::invalidate_all`] whenever a live target has run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use symscope_core::process::Process;
//! use symscope_core::provider::SymbolProvider;
//!
//! # fn demo(provider: Arc<dyn SymbolProvider>) -> symscope_core::error::SymscopeResult<()> {
//! let process = Process::builder(provider).build();
//!
//! let object = process.global("app!g_object")?;
//! println!("{} is a {}", object.path(), object.runtime_type());
//!
//! // The target ran: drop everything read from its memory.
//! process.invalidate_all();
//! # Ok(())
//! # }
//! ```

mod builder;
mod memory;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

pub use builder::ProcessBuilder;
pub use memory::PatternMatches;

use crate::cache::{CacheEpoch, DictionaryCache, EpochCell};
use crate::config::SessionConfig;
use crate::descriptor::names;
use crate::descriptor::{TypeHandle, TypeIndex, TypeTable};
use crate::error::{SymscopeError, SymscopeResult};
use crate::managed::ManagedRuntime;
use crate::provider::{ModuleInfo, SymbolProvider};
use crate::types::{Address, Architecture, ManagedTypeHandle, ModuleId, NativeTypeId, ProcessId};
use crate::usertypes::{UserType, UserTypeRegistry};
use crate::value::{Value, ValueKey, ValueState, UNKNOWN_PATH};

/// Everything the symbolic model knows about one process
pub(crate) struct ProcessContext
{
    pub(crate) id: ProcessId,
    pub(crate) config: SessionConfig,
    pub(crate) architecture: Architecture,
    pub(crate) provider: Arc<dyn SymbolProvider>,
    pub(crate) managed: Option<Arc<dyn ManagedRuntime>>,
    pub(crate) user_types: Arc<UserTypeRegistry>,
    pub(crate) epoch: CacheEpoch,
    pub(crate) types: TypeTable,
    pub(crate) values: DictionaryCache<ValueKey, Arc<ValueState>>,
    type_names: DictionaryCache<(Option<ModuleId>, String), TypeIndex>,
    modules: EpochCell<Arc<[ModuleInfo]>>,
    regions: EpochCell<Arc<memory::RegionSnapshot>>,
    strings: DictionaryCache<memory::StringKey, Arc<str>>,
}

impl ProcessContext
{
    pub(crate) fn pointer_size(&self) -> u64
    {
        u64::from(self.architecture.pointer_size_bytes())
    }

    pub(crate) fn modules(&self) -> SymscopeResult<Arc<[ModuleInfo]>>
    {
        self.modules
            .get_or_try_init(self.epoch.current(), || self.provider.modules().map(Arc::from))
    }

    pub(crate) fn module_info(&self, id: ModuleId) -> SymscopeResult<Option<ModuleInfo>>
    {
        Ok(self.modules()?.iter().find(|module| module.id == id).cloned())
    }

    fn module_name(&self, id: ModuleId) -> String
    {
        match self.module_info(id) {
            Ok(Some(module)) => module.name,
            _ => id.to_string(),
        }
    }

    /// Look a type up by name in one module, or in every module
    ///
    /// A trailing `*` resolves the pointee and returns its pointer type.
    pub(crate) fn resolve_type(&self, module: Option<ModuleId>, name: &str) -> SymscopeResult<TypeIndex>
    {
        let name = name.trim();
        if let Some(pointee) = name.strip_suffix('*') {
            let pointee = self.resolve_type(module, pointee)?;
            return self.types.entry(pointee).pointer_to(self);
        }

        let key = (module, name.to_string());
        if let Some(index) = self.type_names.get(&key) {
            return Ok(index);
        }

        let found = match module {
            Some(module) => self.find_in_module(module, name)?.ok_or_else(|| SymscopeError::TypeNotFound {
                module: Some(self.module_name(module)),
                name: name.to_string(),
            })?,
            None => {
                let mut hits = Vec::new();
                for module in self.modules()?.iter() {
                    if let Some(index) = self.find_in_module(module.id, name)? {
                        hits.push((module.name.clone(), index));
                    }
                }
                match hits.len() {
                    0 => {
                        return Err(SymscopeError::TypeNotFound {
                            module: None,
                            name: name.to_string(),
                        })
                    }
                    1 => hits[0].1,
                    _ => {
                        return Err(SymscopeError::AmbiguousModule {
                            name: name.to_string(),
                            modules: hits.into_iter().map(|(module, _)| module).collect(),
                        })
                    }
                }
            }
        };

        Ok(self.type_names.insert(key, found))
    }

    fn find_in_module(&self, module: ModuleId, name: &str) -> SymscopeResult<Option<TypeIndex>>
    {
        if let Some(id) = self.provider.find_type(module, name)? {
            return self.types.native(self, module, id).map(Some);
        }
        if let Some(runtime) = self.managed.as_deref() {
            if let Some(handle) = runtime.find_type(Some(module), name)? {
                return self.types.managed(self, handle).map(Some);
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for ProcessContext
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ProcessContext")
            .field("id", &self.id)
            .field("architecture", &self.architecture)
            .field("config", &self.config)
            .field("generation", &self.epoch.current())
            .field("types", &self.types.len())
            .field("managed", &self.managed.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to the per-process cache context
///
/// Cheap to clone; clones share every cache. All type handles and values
/// created through a `Process` keep it alive.
#[derive(Clone)]
pub struct Process
{
    inner: Arc<ProcessContext>,
}

impl fmt::Debug for Process
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        self.inner.fmt(f)
    }
}

impl Process
{
    /// Start configuring a process over a symbol and memory provider
    pub fn builder(provider: Arc<dyn SymbolProvider>) -> ProcessBuilder
    {
        ProcessBuilder::new(provider)
    }

    pub(crate) fn from_context(context: ProcessContext) -> Self
    {
        Self {
            inner: Arc::new(context),
        }
    }

    pub(crate) fn context(&self) -> &ProcessContext
    {
        &self.inner
    }

    pub(crate) fn ptr_eq(&self, other: &Process) -> bool
    {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn handle(&self, index: TypeIndex) -> TypeHandle
    {
        TypeHandle::new(self.clone(), index)
    }

    /// Process identifier
    pub fn id(&self) -> ProcessId
    {
        self.inner.id
    }

    /// Caching policy
    pub fn config(&self) -> &SessionConfig
    {
        &self.inner.config
    }

    /// Target architecture
    pub fn architecture(&self) -> Architecture
    {
        self.inner.architecture
    }

    /// Target pointer size in bytes
    pub fn pointer_size(&self) -> u64
    {
        self.inner.pointer_size()
    }

    /// Registered user types
    pub fn user_types(&self) -> &UserTypeRegistry
    {
        &self.inner.user_types
    }

    /// Register a user type with this process's registry
    pub fn register_user_type<T: UserType>(&self)
    {
        self.inner.user_types.register::<T>();
    }

    /// Drop every cache derived from target memory
    ///
    /// Type metadata survives: type definitions do not change while the
    /// target runs.
    pub fn invalidate_all(&self)
    {
        let cx = &self.inner;
        let generation = cx.epoch.advance();
        cx.values.clear();
        cx.strings.clear();
        cx.type_names.clear();
        debug!(process = %cx.id, generation, "invalidated memory caches");
    }

    /// All loaded modules
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the module list cannot be read.
    pub fn modules(&self) -> SymscopeResult<Vec<Module>>
    {
        Ok(self
            .inner
            .modules()?
            .iter()
            .map(|info| Module {
                process: self.clone(),
                info: info.clone(),
            })
            .collect())
    }

    /// Module by name, compared case-insensitively
    ///
    /// ## Errors
    ///
    /// Returns `ModuleNotFound` if no module has the name.
    pub fn module_by_name(&self, name: &str) -> SymscopeResult<Module>
    {
        self.modules()?
            .into_iter()
            .find(|module| module.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| SymscopeError::ModuleNotFound(name.to_string()))
    }

    /// Module by identifier
    ///
    /// ## Errors
    ///
    /// Returns `ModuleNotFound` if the provider does not list the module.
    pub fn module_by_id(&self, id: ModuleId) -> SymscopeResult<Module>
    {
        match self.inner.module_info(id)? {
            Some(info) => Ok(Module {
                process: self.clone(),
                info,
            }),
            None => Err(SymscopeError::ModuleNotFound(id.to_string())),
        }
    }

    /// Module whose image contains `address`
    ///
    /// ## Errors
    ///
    /// Returns the provider's error if the module list cannot be read.
    pub fn module_containing(&self, address: Address) -> SymscopeResult<Option<Module>>
    {
        Ok(self.modules()?.into_iter().find(|module| module.info.contains(address)))
    }

    /// Look a type up by name
    ///
    /// `module!name` searches one module; a bare name searches all of them
    /// and must be defined in exactly one. A trailing `*` returns the pointer
    /// type.
    ///
    /// ## Errors
    ///
    /// Returns `ModuleNotFound`, `TypeNotFound`, or `AmbiguousModule` when an
    /// unqualified name exists in several modules.
    pub fn type_by_name(&self, qualified: &str) -> SymscopeResult<TypeHandle>
    {
        let (module, name) = names::split_module(qualified);
        let module = match module {
            Some(module) => Some(self.module_by_name(module)?.id()),
            None => None,
        };
        self.inner.resolve_type(module, name).map(|index| self.handle(index))
    }

    /// Type for a native debug-info record
    ///
    /// ## Errors
    ///
    /// Returns the provider's error for unknown records.
    pub fn native_type(&self, module: ModuleId, id: NativeTypeId) -> SymscopeResult<TypeHandle>
    {
        let cx = self.context();
        cx.types.native(cx, module, id).map(|index| self.handle(index))
    }

    /// Type for a managed runtime type handle
    ///
    /// ## Errors
    ///
    /// Returns `Provider` if no managed runtime is attached.
    pub fn managed_type(&self, handle: ManagedTypeHandle) -> SymscopeResult<TypeHandle>
    {
        let cx = self.context();
        cx.types.managed(cx, handle).map(|index| self.handle(index))
    }

    /// The `void*` fallback type of a module
    pub fn untyped_pointer_type(&self, module: ModuleId) -> TypeHandle
    {
        self.handle(self.inner.types.untyped_pointer(module))
    }

    /// Untyped pointer to `address`, owned by the module containing it or
    /// else by the first module
    ///
    /// ## Errors
    ///
    /// Returns `ModuleNotFound` if the process has no modules at all.
    pub fn untyped_pointer(&self, address: Address) -> SymscopeResult<Value>
    {
        let module = match self.module_containing(address)? {
            Some(module) => module,
            None => self
                .modules()?
                .into_iter()
                .next()
                .ok_or_else(|| SymscopeError::ModuleNotFound("<any>".to_string()))?,
        };
        Ok(module.untyped_pointer(address))
    }

    /// Global variable by name
    ///
    /// `module!name` searches one module; a bare name takes the first module
    /// that defines it.
    ///
    /// ## Errors
    ///
    /// Returns `GlobalNotFound` if no module defines the variable.
    pub fn global(&self, qualified: &str) -> SymscopeResult<Value>
    {
        let (module, name) = names::split_module(qualified);
        if let Some(module) = module {
            return self.module_by_name(module)?.global(name);
        }
        for module in self.modules()? {
            match module.global(name) {
                Ok(value) => return Ok(value),
                Err(SymscopeError::GlobalNotFound(_)) => {}
                Err(error) => return Err(error),
            }
        }
        Err(SymscopeError::GlobalNotFound(qualified.to_string()))
    }

    /// Value of type `ty` stored at `address`
    pub fn value(&self, ty: &TypeHandle, address: Address) -> Value
    {
        Value::at(
            ty.clone(),
            address,
            Arc::from(crate::value::COMPUTED_NAME),
            Arc::from(UNKNOWN_PATH),
        )
    }

    /// Value of type `ty` stored at `address`, with a name and path
    pub fn value_named(&self, ty: &TypeHandle, address: Address, name: &str, path: &str) -> Value
    {
        Value::at(ty.clone(), address, Arc::from(name), Arc::from(path))
    }

    /// Pointer value of type `ty` pointing at `target`
    ///
    /// ## Errors
    ///
    /// Returns `NotPointer` if `ty` is not a pointer type.
    pub fn pointer_value(&self, ty: &TypeHandle, target: Address) -> SymscopeResult<Value>
    {
        if !ty.is_pointer() {
            return Err(SymscopeError::NotPointer(ty.display_name()));
        }
        Ok(Value::pointer(
            ty.clone(),
            target,
            Arc::from(crate::value::COMPUTED_NAME),
            Arc::from(UNKNOWN_PATH),
        ))
    }

    /// Value of type `ty` with a fixed data word and no storage
    pub fn constant(&self, ty: &TypeHandle, data: u64) -> Value
    {
        Value::with_data(
            ty.clone(),
            Address::ZERO,
            data,
            Arc::from(crate::value::COMPUTED_NAME),
            Arc::from(UNKNOWN_PATH),
        )
    }
}

/// A loaded module of a [`Process`]
#[derive(Clone)]
pub struct Module
{
    process: Process,
    info: ModuleInfo,
}

impl fmt::Debug for Module
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Module").field("info", &self.info).finish_non_exhaustive()
    }
}

impl Module
{
    /// Provider-issued identifier
    pub fn id(&self) -> ModuleId
    {
        self.info.id
    }

    /// Module name
    pub fn name(&self) -> &str
    {
        &self.info.name
    }

    /// Load address
    pub fn base(&self) -> Address
    {
        self.info.base
    }

    /// Image size in bytes
    pub fn size(&self) -> u64
    {
        self.info.size
    }

    /// Raw module facts
    pub fn info(&self) -> &ModuleInfo
    {
        &self.info
    }

    /// Owning process
    pub fn process(&self) -> &Process
    {
        &self.process
    }

    /// Look a type up by name in this module
    ///
    /// A trailing `*` returns the pointer type.
    ///
    /// ## Errors
    ///
    /// Returns `TypeNotFound` if the module does not define the type.
    pub fn type_by_name(&self, name: &str) -> SymscopeResult<TypeHandle>
    {
        self.process
            .inner
            .resolve_type(Some(self.info.id), name)
            .map(|index| self.process.handle(index))
    }

    /// Global variable of this module
    ///
    /// ## Errors
    ///
    /// Returns `GlobalNotFound` if the module does not define it.
    pub fn global(&self, name: &str) -> SymscopeResult<Value>
    {
        let cx = self.process.context();
        let Some(global) = cx.provider.global_variable(self.info.id, name)? else {
            return Err(SymscopeError::GlobalNotFound(format!("{}!{name}", self.info.name)));
        };
        let ty = self.process.native_type(self.info.id, global.type_id)?;
        Ok(self.process.value_named(&ty, global.address, name, name))
    }

    /// Untyped pointer to `address` owned by this module
    pub fn untyped_pointer(&self, address: Address) -> Value
    {
        let ty = self.process.untyped_pointer_type(self.info.id);
        Value::pointer(
            ty,
            address,
            Arc::from(crate::value::COMPUTED_NAME),
            Arc::from(UNKNOWN_PATH),
        )
    }
}
