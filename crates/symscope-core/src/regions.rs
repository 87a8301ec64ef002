//! # Address Region Index
//!
//! Answers "which memory region contains this address" without scanning the
//! region list.
//!
//! The index is a fixed-radix trie over the bits of an address, consumed from
//! the most significant end `bits_per_level` bits at a time. Each branch node
//! splits its slice of the address space into `2^bits_per_level` buckets and
//! only materializes buckets that intersect at least one region. A bucket that
//! intersects exactly one region becomes a leaf.
//!
//! A leaf only says that its region is the single candidate for that bit
//! prefix. The address may still fall in a gap next to the region, so lookups
//! re-check `[start, end)` before answering.
//!
//! ## Example
//!
//! ```rust
//! use symscope_core::regions::RegionIndex;
//! use symscope_core::types::Address;
//!
//! let index = RegionIndex::from_ranges(&[(0x1000, 0x100), (0x2000, 0x50)], 8).unwrap();
//! assert_eq!(index.find(Address::from(0x1050)), Some(0));
//! assert_eq!(index.find(Address::from(0x1900)), None);
//! assert_eq!(index.find(Address::from(0x2049)), Some(1));
//! ```

use std::ops::Range;

use tracing::trace;

use crate::error::{SymscopeError, SymscopeResult};
use crate::types::{Address, MemoryRegion};

#[derive(Debug)]
enum TrieNode
{
    Leaf(usize),
    Branch(Box<[Option<TrieNode>]>),
}

/// Trie over `[start, end)` ranges sorted by start address
#[derive(Debug)]
pub struct RegionIndex
{
    bits_per_level: u32,
    bounds: Vec<(u64, u64)>,
    root: Option<TrieNode>,
}

impl RegionIndex
{
    /// Build an index over `[start, end)` bounds
    ///
    /// Lookups return positions in `bounds`. Empty ranges are kept in the
    /// list but never match. A range overlapping an earlier one is clipped to
    /// the part not covered yet, so the earlier range wins the shared
    /// addresses.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidArgument` if `bits_per_level` is not one of 1, 2, 4, 8
    /// or 16, or if the ranges are not sorted by start address.
    pub fn new(bounds: Vec<(Address, Address)>, bits_per_level: u32) -> SymscopeResult<Self>
    {
        if !matches!(bits_per_level, 1 | 2 | 4 | 8 | 16) {
            return Err(SymscopeError::InvalidArgument(format!(
                "region index bit width must be 1, 2, 4, 8 or 16, got {bits_per_level}"
            )));
        }

        let mut clipped = Vec::with_capacity(bounds.len());
        let mut last_start = 0;
        let mut covered_to = 0;
        for (start, end) in bounds {
            let (start, end) = (start.value(), end.value());
            if start < last_start {
                return Err(SymscopeError::InvalidArgument(format!(
                    "memory regions must be sorted by start address, offending region [0x{start:x}, 0x{end:x})"
                )));
            }
            last_start = start;

            // An earlier region keeps the addresses it already covers.
            let kept_start = start.max(covered_to);
            if kept_start < end {
                covered_to = end;
                clipped.push((kept_start, end));
            } else {
                clipped.push((end, end));
            }
        }
        let bounds = clipped;

        let mut index = Self {
            bits_per_level,
            bounds,
            root: None,
        };
        let candidates: Vec<usize> = (0..index.bounds.len()).filter(|&i| index.bounds[i].1 > index.bounds[i].0).collect();
        index.root = index.build_node(&candidates, 0, 0);
        trace!(
            regions = index.bounds.len(),
            bits_per_level,
            "built region index"
        );
        Ok(index)
    }

    /// Build an index over memory regions sorted by start address
    ///
    /// ## Errors
    ///
    /// See [`RegionIndex::new`].
    pub fn from_regions(regions: &[MemoryRegion], bits_per_level: u32) -> SymscopeResult<Self>
    {
        Self::new(regions.iter().map(|region| (region.start, region.end)).collect(), bits_per_level)
    }

    /// Build an index over `(base, size)` pairs
    ///
    /// ## Errors
    ///
    /// See [`RegionIndex::new`].
    pub fn from_ranges(ranges: &[(u64, u64)], bits_per_level: u32) -> SymscopeResult<Self>
    {
        Self::new(
            ranges
                .iter()
                .map(|&(base, size)| (Address::from(base), Address::from(base.saturating_add(size))))
                .collect(),
            bits_per_level,
        )
    }

    /// Number of indexed regions
    pub fn len(&self) -> usize
    {
        self.bounds.len()
    }

    /// `true` if no regions are indexed
    pub fn is_empty(&self) -> bool
    {
        self.bounds.is_empty()
    }

    /// Find the position of the region containing `address`
    ///
    /// Returns `None` on a miss.
    pub fn find(&self, address: Address) -> Option<usize>
    {
        let address = address.value();
        let mask = (1_u64 << self.bits_per_level) - 1;
        let mut node = self.root.as_ref()?;
        let mut level = 0;

        loop {
            match node {
                TrieNode::Leaf(index) => {
                    let (start, end) = self.bounds[*index];
                    return (start <= address && address < end).then_some(*index);
                }
                TrieNode::Branch(children) => {
                    // Truncation is fine: the masked bucket is below 2^16.
                    #[allow(clippy::cast_possible_truncation)]
                    let bucket = ((address >> self.shift(level)) & mask) as usize;
                    node = children[bucket].as_ref()?;
                    level += 1;
                }
            }
        }
    }

    fn shift(&self, level: u32) -> u32
    {
        64 - self.bits_per_level * (level + 1)
    }

    fn build_node(&self, candidates: &[usize], prefix: u64, level: u32) -> Option<TrieNode>
    {
        match candidates {
            [] => None,
            [single] => Some(TrieNode::Leaf(*single)),
            _ => {
                let shift = self.shift(level);
                let buckets = 1_u64 << self.bits_per_level;
                let span_mask = if shift == 0 { 0 } else { (1_u64 << shift) - 1 };
                let mut children = Vec::with_capacity(usize::try_from(buckets).unwrap_or_default());

                for bucket in 0..buckets {
                    let low = prefix | (bucket << shift);
                    let high = low | span_mask;
                    let range = self.intersecting(candidates, low, high);
                    children.push(self.build_node(&candidates[range], low, level + 1));
                }

                Some(TrieNode::Branch(children.into_boxed_slice()))
            }
        }
    }

    /// Sub-range of `candidates` intersecting the inclusive span `[low, high]`
    ///
    /// Candidates are sorted and disjoint, so the intersecting ones are
    /// contiguous.
    fn intersecting(&self, candidates: &[usize], low: u64, high: u64) -> Range<usize>
    {
        let first = candidates.partition_point(|&i| self.bounds[i].1 <= low);
        let last = candidates.partition_point(|&i| self.bounds[i].0 <= high);
        first..last.max(first)
    }
}
