//! Primitive conversions and text rendering of values.
//!
//! Simple, enum and pointer values convert straight from their data word.
//! Anything else converts by parsing its rendered text, so wrapper types that
//! render as numbers convert like numbers.

use std::str::FromStr;

use super::Value;
use crate::error::{SymscopeError, SymscopeResult};

macro_rules! integer_conversions {
    ($($(#[$doc:meta])* $method:ident => $target:ty),* $(,)?) => {
        $(
            $(#[$doc])*
            ///
            /// ## Errors
            ///
            /// Returns `ConversionFailed` if the rendered text is not a number
            /// in range, or the read error of the data word.
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
            pub fn $method(&self) -> SymscopeResult<$target>
            {
                if self.converts_directly(std::mem::size_of::<$target>() as u64)? {
                    return Ok(self.data()? as $target);
                }
                self.parse_text(stringify!($target))
            }
        )*
    };
}

impl Value
{
    fn converts_directly(&self, width: u64) -> SymscopeResult<bool>
    {
        let ty = &self.ty;
        if ty.is_pointer() {
            return Ok(width == ty.cx().pointer_size());
        }
        Ok((ty.is_simple() || ty.is_enum()) && ty.size()? == width)
    }

    fn parse_text<T: FromStr>(&self, target: &'static str) -> SymscopeResult<T>
    {
        let text = self.to_display_string()?;
        text.trim()
            .parse()
            .map_err(|_| SymscopeError::ConversionFailed { text, target })
    }

    /// Convert to `bool`; any non-zero data word is `true`
    ///
    /// ## Errors
    ///
    /// Returns `ConversionFailed` for composite values whose text is neither
    /// `true`/`false` nor an integer.
    pub fn to_bool(&self) -> SymscopeResult<bool>
    {
        let ty = &self.ty;
        if ty.is_simple() || ty.is_pointer() || ty.is_enum() {
            return Ok(self.data()? != 0);
        }

        let text = self.to_display_string()?;
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            trimmed
                .parse::<i64>()
                .map(|number| number != 0)
                .map_err(|_| SymscopeError::ConversionFailed { text, target: "bool" })
        }
    }

    integer_conversions! {
        /// Convert to `i8`
        to_i8 => i8,
        /// Convert to `u8`
        to_u8 => u8,
        /// Convert to `i16`
        to_i16 => i16,
        /// Convert to `u16`
        to_u16 => u16,
        /// Convert to `i32`
        to_i32 => i32,
        /// Convert to `u32`
        to_u32 => u32,
        /// Convert to `i64`
        to_i64 => i64,
        /// Convert to `u64`
        to_u64 => u64,
    }

    /// Convert to `f32`
    ///
    /// ## Errors
    ///
    /// Returns `ConversionFailed` if a non-floating-point value does not
    /// render as a number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_f32(&self) -> SymscopeResult<f32>
    {
        if self.ty.is_float() {
            Ok(f32::from_bits(self.data()? as u32))
        } else if self.ty.is_double() {
            Ok(f64::from_bits(self.data()?) as f32)
        } else {
            self.parse_text("f32")
        }
    }

    /// Convert to `f64`
    ///
    /// ## Errors
    ///
    /// Returns `ConversionFailed` if a non-floating-point value does not
    /// render as a number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_f64(&self) -> SymscopeResult<f64>
    {
        if self.ty.is_float() {
            Ok(f64::from(f32::from_bits(self.data()? as u32)))
        } else if self.ty.is_double() {
            Ok(f64::from_bits(self.data()?))
        } else {
            self.parse_text("f64")
        }
    }

    /// Render the value as text
    ///
    /// In order of preference: `(null)` for null pointers, the string
    /// contents for string types, the number for reals and simple types
    /// (`true`/`false` for `bool`), the enumerator name for enums, and
    /// `0x<address> (<type>)` for everything else.
    ///
    /// ## Errors
    ///
    /// Returns the read error if the data word or string is unreadable.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn to_display_string(&self) -> SymscopeResult<String>
    {
        let ty = &self.ty;
        if self.is_null_pointer()? {
            return Ok("(null)".to_string());
        }

        if let Some(width) = ty.char_width() {
            return self.read_string(width);
        }

        if ty.is_float() {
            return Ok(f32::from_bits(self.data()? as u32).to_string());
        }
        if ty.is_double() {
            return Ok(f64::from_bits(self.data()?).to_string());
        }

        if ty.is_simple() {
            let data = self.data()?;
            let name = ty.name()?;
            if &*name == "bool" || &*name == "BOOL" {
                return Ok((data != 0).to_string());
            }
            return Ok(match ty.size()? {
                1 => (data as u8).to_string(),
                2 => (data as i16).to_string(),
                4 => (data as i32).to_string(),
                _ => (data as i64).to_string(),
            });
        }

        if ty.is_enum() {
            let data = self.data()?;
            return Ok(ty.enum_name(data)?.unwrap_or_else(|| data.to_string()));
        }

        let address = self.pointer_address()?;
        if ty.cx().pointer_size() == 4 {
            Ok(format!("0x{:08X} ({ty})", address.value()))
        } else {
            Ok(format!("0x{:016X} ({ty})", address.value()))
        }
    }

    fn read_string(&self, width: u64) -> SymscopeResult<String>
    {
        let cx = self.ty.cx();
        let mut limit = cx.config.max_string_length;
        if self.ty.is_array() {
            let length = usize::try_from(self.array_length()?).unwrap_or(usize::MAX);
            limit = limit.min(length);
        }

        let text = match width {
            1 => cx.read_ansi_string(self.pointer_address()?, limit)?,
            2 => cx.read_wide_string(self.pointer_address()?, limit)?,
            _ => cx.read_utf32_string(self.pointer_address()?, limit)?,
        };
        Ok(text.to_string())
    }
}
