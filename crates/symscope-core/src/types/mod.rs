//! # Types
//!
//! Plain data types shared by every layer: target addresses, process and
//! architecture facts, memory regions, and the opaque identifiers issued by
//! the external providers.

pub mod address;
pub mod ids;
pub mod process;

// Re-export all public types
pub use address::Address;
pub use ids::{ManagedTypeHandle, ModuleId, NativeTypeId};
pub use process::{Architecture, MemoryRegion, MemoryRegionId, ProcessId};
