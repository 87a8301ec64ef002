//! Memory reads, strings, regions and pattern search for a [`Process`].

use std::sync::Arc;

use tracing::{debug, trace};
use widestring::{U16Str, U32Str};

use super::{Process, ProcessContext};
use crate::error::{SymscopeError, SymscopeResult};
use crate::regions::RegionIndex;
use crate::types::{Address, MemoryRegion};

/// Strings are read one page at a time so a read never crosses into an
/// unmapped page after the terminator. A character split by a page boundary
/// is put together from two reads.
const PAGE_SIZE: u64 = 0x1000;

const JMP_REL32: u8 = 0xE9;

/// Sorted region list and its index, valid for one cache generation
#[derive(Debug)]
pub(super) struct RegionSnapshot
{
    regions: Vec<MemoryRegion>,
    index: RegionIndex,
}

/// `(address, character limit, character width)`
pub(super) type StringKey = (Address, usize, u8);

impl ProcessContext
{
    pub(crate) fn read_memory(&self, address: Address, size: usize) -> SymscopeResult<Vec<u8>>
    {
        let bytes = self.provider.read_memory(address, size)?;
        if bytes.len() < size {
            return Err(SymscopeError::MemoryReadFailed { address, size });
        }
        Ok(bytes)
    }

    /// Read a little-endian word of 1, 2, 4 or 8 bytes
    pub(crate) fn read_word(&self, address: Address, size: u64) -> SymscopeResult<u64>
    {
        let width = match size {
            1 | 2 | 4 | 8 => size as usize,
            _ => return Err(SymscopeError::UnsupportedDataSize(size)),
        };
        let bytes = self.read_memory(address, width)?;
        let mut word = [0_u8; 8];
        word[..width].copy_from_slice(&bytes[..width]);
        Ok(u64::from_le_bytes(word))
    }

    pub(crate) fn read_ansi_string(&self, address: Address, limit: usize) -> SymscopeResult<Arc<str>>
    {
        self.read_string(address, limit, 1, |bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub(crate) fn read_wide_string(&self, address: Address, limit: usize) -> SymscopeResult<Arc<str>>
    {
        self.read_string(address, limit, 2, |bytes| {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
                .collect();
            U16Str::from_slice(&units).to_string_lossy()
        })
    }

    pub(crate) fn read_utf32_string(&self, address: Address, limit: usize) -> SymscopeResult<Arc<str>>
    {
        self.read_string(address, limit, 4, |bytes| {
            let units: Vec<u32> = bytes
                .chunks_exact(4)
                .map(|unit| u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]))
                .collect();
            U32Str::from_slice(&units).to_string_lossy()
        })
    }

    /// Read a null-terminated string of `width`-byte characters
    ///
    /// Stops at the terminator or after `limit` characters. Only a failure
    /// to read the first character is an error; an unreadable page later on
    /// truncates the string.
    fn read_string(
        &self,
        address: Address,
        limit: usize,
        width: u8,
        decode: impl FnOnce(&[u8]) -> String,
    ) -> SymscopeResult<Arc<str>>
    {
        let key = (address, limit, width);
        self.strings.get_or_try_insert_with(key, || {
            let width = usize::from(width);
            let max_bytes = limit.saturating_mul(width);
            let mut bytes = Vec::new();
            // Bytes of a character that continues on the next page
            let mut partial = Vec::with_capacity(width);
            let mut cursor = address;

            'pages: while bytes.len() < max_bytes {
                let to_page_end = PAGE_SIZE - cursor.value() % PAGE_SIZE;
                let remaining = max_bytes - bytes.len() - partial.len();
                let wanted = usize::try_from(to_page_end).unwrap_or(remaining).min(remaining);

                let chunk = match self.read_memory(cursor, wanted) {
                    Ok(chunk) => chunk,
                    Err(error) if bytes.is_empty() => return Err(error),
                    Err(_) => break,
                };
                cursor = cursor + wanted as u64;
                partial.extend_from_slice(&chunk);

                let whole = partial.len() / width * width;
                for character in partial[..whole].chunks_exact(width) {
                    if character.iter().all(|&byte| byte == 0) {
                        break 'pages;
                    }
                    bytes.extend_from_slice(character);
                    if bytes.len() >= max_bytes {
                        break 'pages;
                    }
                }
                partial.drain(..whole);
            }

            trace!(%address, width, length = bytes.len() / width, "read string");
            Ok(Arc::from(decode(&bytes)))
        })
    }

    fn region_snapshot(&self) -> SymscopeResult<Arc<RegionSnapshot>>
    {
        self.regions.get_or_try_init(self.epoch.current(), || {
            let mut regions = self.provider.memory_regions()?;
            regions.sort_by_key(|region| region.start);
            let index = RegionIndex::from_regions(&regions, self.config.region_index_bits)?;
            debug!(process = %self.id, regions = regions.len(), "indexed memory regions");
            Ok(Arc::new(RegionSnapshot { regions, index }))
        })
    }
}

impl Process
{
    /// Read exactly `size` bytes from the target
    ///
    /// ## Errors
    ///
    /// Returns `MemoryReadFailed` if any byte is unreadable.
    pub fn read_memory(&self, address: Address, size: usize) -> SymscopeResult<Vec<u8>>
    {
        self.context().read_memory(address, size)
    }

    /// Read a pointer-sized word
    ///
    /// ## Errors
    ///
    /// Returns `MemoryReadFailed` if the word is unreadable.
    pub fn read_pointer(&self, address: Address) -> SymscopeResult<Address>
    {
        let cx = self.context();
        cx.read_word(address, cx.pointer_size()).map(Address::from)
    }

    /// Read a null-terminated single-byte string
    ///
    /// Reads at most the configured `max_string_length` characters. Results
    /// are cached until [`Process::invalidate_all`].
    ///
    /// ## Errors
    ///
    /// Returns `MemoryReadFailed` if the first character is unreadable.
    pub fn read_ansi_string(&self, address: Address) -> SymscopeResult<Arc<str>>
    {
        let cx = self.context();
        cx.read_ansi_string(address, cx.config.max_string_length)
    }

    /// Read a null-terminated UTF-16 string
    ///
    /// ## Errors
    ///
    /// Returns `MemoryReadFailed` if the first character is unreadable.
    pub fn read_wide_string(&self, address: Address) -> SymscopeResult<Arc<str>>
    {
        let cx = self.context();
        cx.read_wide_string(address, cx.config.max_string_length)
    }

    /// All memory regions of the target, sorted by start address
    ///
    /// ## Errors
    ///
    /// Returns the provider's error. Overlapping regions are kept as
    /// reported; [`Process::find_memory_region`] attributes shared addresses
    /// to the region that starts first.
    pub fn memory_regions(&self) -> SymscopeResult<Vec<MemoryRegion>>
    {
        Ok(self.context().region_snapshot()?.regions.clone())
    }

    /// Position in [`Process::memory_regions`] of the region containing
    /// `address`
    ///
    /// ## Errors
    ///
    /// See [`Process::memory_regions`].
    pub fn find_memory_region(&self, address: Address) -> SymscopeResult<Option<usize>>
    {
        Ok(self.context().region_snapshot()?.index.find(address))
    }

    /// First occurrence of `pattern` in `[start, end)` at an aligned offset
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` for an empty pattern.
    pub fn find_pattern(&self, start: Address, end: Address, pattern: &[u8], alignment: u64) -> SymscopeResult<Option<Address>>
    {
        self.context().provider.find_pattern(start, end, pattern, alignment)
    }

    /// Every occurrence of `pattern` in `[start, end)`
    ///
    /// Each step re-runs the search just past the previous hit, so the scan
    /// can be abandoned between hits.
    ///
    /// ## Example
    ///
    /// ```rust,no_run
    /// use symscope_core::process::Process;
    /// use symscope_core::types::Address;
    ///
    /// # fn demo(process: &Process) -> symscope_core::error::SymscopeResult<()> {
    /// for hit in process.find_all_patterns(Address::ZERO, Address::from(u64::MAX), b"MZ", 0x1000) {
    ///     println!("image header at {}", hit?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn find_all_patterns(&self, start: Address, end: Address, pattern: &[u8], alignment: u64) -> PatternMatches
    {
        PatternMatches {
            process: self.clone(),
            cursor: Some(start),
            end,
            pattern: pattern.to_vec(),
            alignment: alignment.max(1),
        }
    }

    /// Follow a relative `jmp` thunk at a public function symbol
    ///
    /// Returns `address` unchanged when it is not a public function, does
    /// not start with a jump, or cannot be read.
    pub fn resolve_function_address(&self, address: Address) -> Address
    {
        match self.jump_thunk_target(address) {
            Ok(Some(target)) => target,
            Ok(None) => address,
            Err(error) => {
                debug!(%address, %error, "could not decode jump thunk");
                address
            }
        }
    }

    fn jump_thunk_target(&self, address: Address) -> SymscopeResult<Option<Address>>
    {
        if !self.context().provider.is_public_function(address)? {
            return Ok(None);
        }
        let code = self.read_memory(address, 5)?;
        if code[0] != JMP_REL32 {
            return Ok(None);
        }
        let displacement = i32::from_le_bytes([code[1], code[2], code[3], code[4]]);
        Ok(Some((address + 5).offset(i64::from(displacement))))
    }
}

/// Iterator over pattern hits, see [`Process::find_all_patterns`]
#[derive(Debug)]
pub struct PatternMatches
{
    process: Process,
    cursor: Option<Address>,
    end: Address,
    pattern: Vec<u8>,
    alignment: u64,
}

impl Iterator for PatternMatches
{
    type Item = SymscopeResult<Address>;

    fn next(&mut self) -> Option<Self::Item>
    {
        let start = self.cursor.take()?;
        if start >= self.end {
            return None;
        }
        match self.process.find_pattern(start, self.end, &self.pattern, self.alignment) {
            Ok(Some(hit)) => {
                self.cursor = hit.checked_add(self.alignment);
                Some(Ok(hit))
            }
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}
