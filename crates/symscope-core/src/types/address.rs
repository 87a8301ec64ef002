//! Memory address type.

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::SymscopeError;

/// Strongly typed memory address
///
/// Wraps a `u64` so that target addresses are never confused with sizes,
/// offsets or raw data words read out of the target.
///
/// ## Address Space
///
/// Addresses always live in the *target's* address space, never in ours. A
/// 32-bit target still uses this 64-bit wrapper; only the low 32 bits are
/// meaningful there and pointer reads are sized by the target architecture.
///
/// ## Example
///
/// ```rust
/// use symscope_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    ///
    /// A pointer value holding this address is a null pointer.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// This is equivalent to `Address::from(value)` but can be used in const contexts.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Address;
    ///
    /// const VTABLE: Address = Address::new(0x7fff00000000);
    /// ```
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    ///
    /// This returns the underlying address value. Use this when you need to pass
    /// the address to platform-specific APIs that expect a `u64`.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.value(), 0x1000);
    /// ```
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset to this address, checking for overflow
    ///
    /// Returns `Some(new_address)` if the addition doesn't overflow, or `None` if it does.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_add(0x100), Some(Address::from(0x1100)));
    /// assert_eq!(addr.checked_add(u64::MAX), None); // Overflow
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset from this address, checking for underflow
    ///
    /// Returns `Some(new_address)` if the subtraction doesn't underflow, or `None` if it does.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.checked_sub(0x100), Some(Address::from(0xf00)));
    /// assert_eq!(addr.checked_sub(u64::MAX), None); // Underflow
    /// ```
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset to this address, saturating at the maximum value
    ///
    /// If the addition would overflow, returns `Address::new(u64::MAX)` instead.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Address;
    ///
    /// let addr = Address::from(0x1000);
    /// assert_eq!(addr.saturating_add(0x100), Address::from(0x1100));
    /// assert_eq!(addr.saturating_add(u64::MAX), Address::new(u64::MAX)); // Saturates
    /// ```
    pub fn saturating_add(self, offset: u64) -> Self
    {
        Address(self.0.saturating_add(offset))
    }

    /// Move this address by a signed byte delta, wrapping on overflow
    ///
    /// Runtime type offsets and pointer adjustments can be negative, so they
    /// are applied through this instead of `Add<u64>`.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use symscope_core::types::Address;
    ///
    /// let addr = Address::from(0x1010);
    /// assert_eq!(addr.offset(-0x10), Address::from(0x1000));
    /// assert_eq!(addr.offset(0x10), Address::from(0x1020));
    /// ```
    #[must_use]
    pub const fn offset(self, delta: i64) -> Self
    {
        Address(self.0.wrapping_add_signed(delta))
    }

    /// Check whether this is the null address
    #[must_use]
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

/// Parse `0x`-prefixed hexadecimal or plain decimal text
///
/// ```rust
/// use symscope_core::types::Address;
///
/// assert_eq!("0x7fff_0000".parse::<Address>().unwrap(), Address::from(0x7fff_0000));
/// assert_eq!("4096".parse::<Address>().unwrap(), Address::from(0x1000));
/// ```
impl FromStr for Address
{
    type Err = SymscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let text = s.trim().replace('_', "");
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => text.parse(),
        };
        parsed
            .map(Address)
            .map_err(|_| SymscopeError::InvalidArgument(format!("`{s}` is not an address")))
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}
