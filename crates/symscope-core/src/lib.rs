//! # symscope-core
//!
//! Symbolic type and value model for inspecting another process's memory.
//!
//! This crate turns raw answers from a debugger backend (memory bytes, debug
//! info records, managed runtime reflection) into typed, navigable handles:
//! - [`descriptor::TypeHandle`]: native, managed, synthetic-pointer and
//!   untyped-pointer types with memoized layout queries
//! - [`value::Value`]: typed values with field access, dereference, array
//!   indexing, casts and runtime-type resolution through virtual tables
//! - [`regions::RegionIndex`]: address to memory region lookup over a radix trie
//! - [`process::Process`]: the per-process cache context that owns all of the
//!   above and can drop every memory-derived cache at once
//!
//! ## Providers
//!
//! The crate never talks to a target itself. Implement
//! [`provider::SymbolProvider`] (memory and native debug info) and optionally
//! [`managed::ManagedRuntime`] (a managed runtime hosted in the target), then
//! build a [`process::Process`] over them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use symscope_core::prelude::*;
//!
//! # fn demo(provider: Arc<dyn SymbolProvider>) -> SymscopeResult<()> {
//! let process = Process::new(provider);
//! let node = process.global("app!g_root")?;
//! for name in node.field_names()?.iter() {
//!     println!("{name} = {}", node.field(name)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod managed;
pub mod prelude;
pub mod process;
pub mod provider;
pub mod regions;
pub mod types;
pub mod usertypes;
pub mod value;

// Re-export commonly used types
pub use descriptor::TypeHandle;
pub use error::{SymscopeError, SymscopeResult};
pub use process::{Module, Process};
pub use value::Value;
