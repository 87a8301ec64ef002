//! Common module for library exports

pub use crate::config::SessionConfig;
pub use crate::descriptor::{BaseClass, BuiltinType, FieldInfo, MemberLocation, TemplateArgument, TypeHandle, TypeKind, TypeTag};
pub use crate::error::{ErrorCategory, SymscopeError, SymscopeResult};
pub use crate::managed::{ElementKind, ManagedRuntime};
pub use crate::process::{Module, Process, ProcessBuilder};
pub use crate::provider::{ModuleInfo, SymbolProvider};
pub use crate::types::{Address, Architecture, ManagedTypeHandle, MemoryRegion, ModuleId, NativeTypeId, ProcessId};
pub use crate::usertypes::{UserObject, UserType, UserTypeMetadata, UserTypeRegistry};
pub use crate::value::Value;
