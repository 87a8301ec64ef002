//! Process, architecture, and memory region types.

use std::fmt;

use super::Address;

/// Process identifier (PID)
///
/// Identifies the inspected process in diagnostics and cache keys. Snapshot
/// targets (core dumps) use the PID recorded in the dump.
///
/// ## Example
///
/// ```rust
/// use symscope_core::types::ProcessId;
///
/// let pid = ProcessId::from(12345);
/// assert_eq!(u32::from(pid), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Identifier for memory regions
///
/// The position of the region in the sorted region list of a process. It is
/// stable until the caches of the process are invalidated, after which the
/// list is enumerated again and positions may shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRegionId(pub usize);

impl MemoryRegionId
{
    /// Get the raw `usize` value of this memory region identifier
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::MemoryRegionId;
    ///
    /// let id = MemoryRegionId(42);
    /// assert_eq!(id.value(), 42);
    /// ```
    pub fn value(self) -> usize
    {
        self.0
    }
}

/// Memory region in a process
///
/// Represents a contiguous region of memory in the target process,
/// such as the stack, heap, or code segments.
///
/// ## Examples
///
/// ```
/// use symscope_core::types::{Address, MemoryRegion, MemoryRegionId};
///
/// let heap = MemoryRegion::new(
///     MemoryRegionId(1),
///     Address::from(0x2000),
///     Address::from(0x3000),
///     "rw".to_string(),
///     Some("[heap]".to_string()),
/// );
/// assert_eq!(heap.size(), 0x1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion
{
    /// Stable identifier for the region.
    pub id: MemoryRegionId,

    /// Start address of the memory region (inclusive)
    pub start: Address,

    /// End address of the memory region (exclusive)
    pub end: Address,

    /// Memory permissions as a string
    ///
    /// Contains `r`, `w` and `x` for read, write and execute. Any other
    /// character (usually `-`) is ignored.
    pub permissions: String,

    /// Optional name/description of the region
    ///
    /// On Linux, this might be `"[heap]"`, `"[stack]"`, or a mapped file path.
    pub name: Option<String>,
}

impl MemoryRegion
{
    /// Create a new memory region
    ///
    /// This function does not validate that `end > start`. If `end <= start`,
    /// `size()` will return 0.
    pub fn new(id: MemoryRegionId, start: Address, end: Address, permissions: String, name: Option<String>) -> Self
    {
        Self {
            id,
            start,
            end,
            permissions,
            name,
        }
    }

    /// Create a region from a base address and a byte size
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::{Address, MemoryRegion, MemoryRegionId};
    ///
    /// let region = MemoryRegion::with_size(MemoryRegionId(0), Address::from(0x1000), 0x100, "r--");
    /// assert_eq!(region.end, Address::from(0x1100));
    /// ```
    pub fn with_size(id: MemoryRegionId, base: Address, size: u64, permissions: &str) -> Self
    {
        Self::new(id, base, base.saturating_add(size), permissions.to_string(), None)
    }

    /// Get the size of the memory region in bytes
    pub fn size(&self) -> u64
    {
        self.end.value().saturating_sub(self.start.value())
    }

    /// Check if the region is readable
    pub fn is_readable(&self) -> bool
    {
        self.permissions.contains('r')
    }

    /// Check if the region is writable
    pub fn is_writable(&self) -> bool
    {
        self.permissions.contains('w')
    }

    /// Check if the region is executable
    pub fn is_executable(&self) -> bool
    {
        self.permissions.contains('x')
    }

    /// Check if an address lies within this memory region
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::{Address, MemoryRegion, MemoryRegionId};
    ///
    /// let region = MemoryRegion::new(
    ///     MemoryRegionId(0),
    ///     Address::from(0x1000),
    ///     Address::from(0x2000),
    ///     "rwx".to_string(),
    ///     None,
    /// );
    ///
    /// assert!(region.contains(Address::from(0x1000))); // Start (inclusive)
    /// assert!(!region.contains(Address::from(0x2000))); // End (exclusive)
    /// ```
    pub fn contains(&self, address: Address) -> bool
    {
        address >= self.start && address < self.end
    }
}

/// CPU architecture of the inspected target
///
/// The only layout fact the symbolic model needs from the architecture is
/// the pointer width: pointer data words, vtable pointers and managed object
/// headers are all pointer sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 32-bit x86
    X86,
    /// 64-bit x86 (Intel/AMD)
    X86_64,
    /// 64-bit ARM
    Arm64,
    /// Any other architecture, assumed to use 64-bit pointers
    Unknown(&'static str),
}

impl Architecture
{
    /// Get the architecture of the currently running binary
    ///
    /// Useful as a default for providers that inspect a process on the same
    /// machine with the same bitness.
    pub const fn current() -> Self
    {
        #[cfg(target_arch = "aarch64")]
        {
            Architecture::Arm64
        }

        #[cfg(target_arch = "x86_64")]
        {
            Architecture::X86_64
        }

        #[cfg(target_arch = "x86")]
        {
            Architecture::X86
        }

        #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64", target_arch = "x86")))]
        {
            Architecture::Unknown(std::env::consts::ARCH)
        }
    }

    /// Size of a pointer in bytes for this architecture.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Architecture;
    ///
    /// assert_eq!(Architecture::X86.pointer_size_bytes(), 4);
    /// assert_eq!(Architecture::X86_64.pointer_size_bytes(), 8);
    /// ```
    #[must_use]
    pub const fn pointer_size_bytes(self) -> u8
    {
        match self {
            Architecture::X86 => 4,
            Architecture::Arm64 | Architecture::X86_64 | Architecture::Unknown(_) => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Unknown(name) => write!(f, "{name}"),
        }
    }
}
