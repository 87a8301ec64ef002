//! # Session Configuration
//!
//! Caching policy for one inspected process.
//!
//! ## Environment Variables
//!
//! - `SYMSCOPE_INTERN_VALUES`: share value caches between equal values (`true`/`false`, default: `false`)
//! - `SYMSCOPE_TRACK_PATHS`: build diagnostic paths while navigating (default: `true`)
//! - `SYMSCOPE_MAX_STRING_LENGTH`: longest string read from the target, in characters (default: `4096`)
//! - `SYMSCOPE_REGION_INDEX_BITS`: radix bits per region index level (default: `8`)
//!
//! Values that fail to parse are ignored and the default is kept.

use std::env;
use std::str::FromStr;

use tracing::debug;

/// Bit widths accepted for one level of the region index trie.
pub const REGION_INDEX_BITS: [u32; 5] = [1, 2, 4, 8, 16];

/// Caching policy for a process context
///
/// ## Example
///
/// ```rust
/// use symscope_core::config::SessionConfig;
///
/// let config = SessionConfig::default().with_intern_values(true).with_region_index_bits(4);
/// assert!(config.intern_values);
/// assert_eq!(config.region_index_bits, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig
{
    /// Deduplicate values by (type, address, name, path) so that equal values
    /// share one data word and runtime type cache.
    pub intern_values: bool,

    /// Record `.field` / `[index]` paths on navigated values.
    ///
    /// When disabled every derived value gets the path `<untracked>`.
    pub track_paths: bool,

    /// Longest null-terminated string read from the target, in characters.
    pub max_string_length: usize,

    /// Radix bit-width per level of the region index (1, 2, 4, 8 or 16).
    pub region_index_bits: u32,
}

impl Default for SessionConfig
{
    fn default() -> Self
    {
        Self {
            intern_values: false,
            track_paths: true,
            max_string_length: 4096,
            region_index_bits: 8,
        }
    }
}

impl SessionConfig
{
    /// Load the configuration from `SYMSCOPE_*` environment variables
    ///
    /// Unset or unparsable variables keep their default value.
    #[must_use]
    pub fn from_env() -> Self
    {
        let defaults = Self::default();

        let region_index_bits = read_env("SYMSCOPE_REGION_INDEX_BITS").unwrap_or(defaults.region_index_bits);
        let region_index_bits = if REGION_INDEX_BITS.contains(&region_index_bits) {
            region_index_bits
        } else {
            debug!(region_index_bits, "unsupported region index width, using default");
            defaults.region_index_bits
        };

        Self {
            intern_values: read_env("SYMSCOPE_INTERN_VALUES").unwrap_or(defaults.intern_values),
            track_paths: read_env("SYMSCOPE_TRACK_PATHS").unwrap_or(defaults.track_paths),
            max_string_length: read_env("SYMSCOPE_MAX_STRING_LENGTH").unwrap_or(defaults.max_string_length),
            region_index_bits,
        }
    }

    /// Enable or disable value interning
    #[must_use]
    pub fn with_intern_values(mut self, enabled: bool) -> Self
    {
        self.intern_values = enabled;
        self
    }

    /// Enable or disable path tracking
    #[must_use]
    pub fn with_track_paths(mut self, enabled: bool) -> Self
    {
        self.track_paths = enabled;
        self
    }

    /// Set the longest string read from the target
    #[must_use]
    pub fn with_max_string_length(mut self, length: usize) -> Self
    {
        self.max_string_length = length;
        self
    }

    /// Set the region index radix width
    ///
    /// The width is validated when the index is built.
    #[must_use]
    pub fn with_region_index_bits(mut self, bits: u32) -> Self
    {
        self.region_index_bits = bits;
        self
    }
}

fn read_env<T: FromStr>(name: &str) -> Option<T>
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(variable = name, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
