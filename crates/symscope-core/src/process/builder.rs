//! # Process Builder
//!
//! Fluent configuration of a [`Process`] before any cache is created.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{Process, ProcessContext};
use crate::cache::{CacheEpoch, DictionaryCache, EpochCell};
use crate::config::SessionConfig;
use crate::descriptor::TypeTable;
use crate::managed::ManagedRuntime;
use crate::provider::SymbolProvider;
use crate::types::ProcessId;
use crate::usertypes::UserTypeRegistry;

/// Builder for a [`Process`]
///
/// ## Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use symscope_core::config::SessionConfig;
/// use symscope_core::process::Process;
/// use symscope_core::provider::SymbolProvider;
/// use symscope_core::types::ProcessId;
///
/// # fn demo(provider: Arc<dyn SymbolProvider>) {
/// let process = Process::builder(provider)
///     .with_process_id(ProcessId::from(4242))
///     .with_config(SessionConfig::default().with_intern_values(true))
///     .build();
/// assert!(process.config().intern_values);
/// # }
/// ```
pub struct ProcessBuilder
{
    provider: Arc<dyn SymbolProvider>,
    managed: Option<Arc<dyn ManagedRuntime>>,
    config: Option<SessionConfig>,
    id: ProcessId,
    user_types: Option<Arc<UserTypeRegistry>>,
}

impl fmt::Debug for ProcessBuilder
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ProcessBuilder")
            .field("id", &self.id)
            .field("managed", &self.managed.is_some())
            .field("config", &self.config)
            .field("user_types", &self.user_types.is_some())
            .finish_non_exhaustive()
    }
}

impl ProcessBuilder
{
    /// Create a builder over a symbol and memory provider
    pub fn new(provider: Arc<dyn SymbolProvider>) -> Self
    {
        Self {
            provider,
            managed: None,
            config: None,
            id: ProcessId::default(),
            user_types: None,
        }
    }

    /// Attach a managed runtime bridge
    ///
    /// Without one, managed type queries fail with a provider error.
    #[must_use]
    pub fn with_managed_runtime(mut self, runtime: Arc<dyn ManagedRuntime>) -> Self
    {
        self.managed = Some(runtime);
        self
    }

    /// Use an explicit caching policy
    ///
    /// Defaults to [`SessionConfig::from_env`].
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self
    {
        self.config = Some(config);
        self
    }

    /// Set the process identifier shown in diagnostics
    #[must_use]
    pub fn with_process_id(mut self, id: ProcessId) -> Self
    {
        self.id = id;
        self
    }

    /// Share a user-type registry with other processes
    #[must_use]
    pub fn with_user_types(mut self, registry: Arc<UserTypeRegistry>) -> Self
    {
        self.user_types = Some(registry);
        self
    }

    /// Create the process context
    pub fn build(self) -> Process
    {
        let config = self.config.unwrap_or_else(SessionConfig::from_env);
        let architecture = self.provider.architecture();
        debug!(
            process = %self.id,
            ?architecture,
            managed = self.managed.is_some(),
            "created process context"
        );

        Process::from_context(ProcessContext {
            id: self.id,
            config,
            architecture,
            provider: self.provider,
            managed: self.managed,
            user_types: self.user_types.unwrap_or_default(),
            epoch: CacheEpoch::new(),
            types: TypeTable::new(),
            values: DictionaryCache::new(),
            type_names: DictionaryCache::new(),
            modules: EpochCell::new(),
            regions: EpochCell::new(),
            strings: DictionaryCache::new(),
        })
    }
}

impl Process
{
    /// Process over `provider` with the environment's caching policy and no
    /// managed runtime
    pub fn new(provider: Arc<dyn SymbolProvider>) -> Self
    {
        ProcessBuilder::new(provider).build()
    }
}
