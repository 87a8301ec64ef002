//! Identifiers handed out by the external providers.
//!
//! These are opaque to the symbolic model. It only stores them and passes
//! them back to whichever provider issued them.

use std::fmt;

/// Identifier of a loaded module (executable or shared library)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u32);

/// Native debug-info type identifier, unique within one module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeTypeId(pub u32);

/// Managed runtime type handle (a method table address on most runtimes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagedTypeHandle(pub u64);

impl fmt::Display for ModuleId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "module#{}", self.0)
    }
}

impl fmt::Display for NativeTypeId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "type#{}", self.0)
    }
}

impl fmt::Display for ManagedTypeHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "mt:0x{:x}", self.0)
    }
}
