//! # Error Types
//!
//! General error handling for the symbolic model.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Every variant belongs to exactly one [`ErrorCategory`]. Callers that only
//! care about "is this worth retrying after the target changes?" should match
//! on [`SymscopeError::category`] instead of individual variants.

use thiserror::Error;

use crate::types::Address;

/// Coarse classification of a [`SymscopeError`]
///
/// Best-effort lookups (runtime type resolution, jump thunk decoding) never
/// produce an error at all: they fall back to a well-defined value instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory
{
    /// A name (field, base class, type, module, global) could not be resolved.
    NotFound,
    /// The operation does not make sense for the kind of type or value it was
    /// applied to.
    TypeMismatch,
    /// The target or the provider could not deliver the requested facts.
    ///
    /// Retrying is pointless until the target state changes.
    Environment,
}

/// Main error type for symbolic model operations
///
/// ## Error Categories
///
/// 1. **Not found**: FieldNotFound, BaseClassNotFound, TypeNotFound, ModuleNotFound,
///    AmbiguousModule, GlobalNotFound, UserTypeNotRegistered
/// 2. **Type mismatch**: NotArrayOrPointer, NotPointer, NotArray, NullAddressCast,
///    NoBaseClass, MultipleBaseClasses, BaseClassIndexOutOfRange, UnsupportedTypeQuery,
///    ConversionFailed
/// 3. **Environment**: MemoryReadFailed, UnsupportedDataSize, Provider, InvalidArgument, Io
#[derive(Error, Debug)]
pub enum SymscopeError
{
    /// The type has no field with the given name
    ///
    /// Own fields and the fields of every ancestor were searched.
    #[error("Field `{field}` not found in type `{type_name}`")]
    FieldNotFound
    {
        /// Name of the type that was searched
        type_name: String,
        /// Requested field name
        field: String,
    },

    /// The type does not derive from a class with the given name
    #[error("Base class `{base}` not found in type `{type_name}`")]
    BaseClassNotFound
    {
        /// Name of the type that was searched
        type_name: String,
        /// Requested base class name
        base: String,
    },

    /// No module knows a type with this name
    #[error("Type `{name}` not found{}", .module.as_ref().map(|m| format!(" in module `{m}`")).unwrap_or_default())]
    TypeNotFound
    {
        /// Module that was searched, if the lookup was module-qualified
        module: Option<String>,
        /// Requested type name
        name: String,
    },

    /// The module part of a `module!name` lookup does not name a loaded module
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// An unqualified type name exists in more than one module
    ///
    /// Qualify the lookup as `module!name` to pick one.
    #[error("Type `{name}` is defined in several modules: {}", .modules.join(", "))]
    AmbiguousModule
    {
        /// Requested type name
        name: String,
        /// Every module that defines the name
        modules: Vec<String>,
    },

    /// No module exports a global with this name
    #[error("Global variable not found: {0}")]
    GlobalNotFound(String),

    /// No user type wrapper matches the value's type
    #[error("No registered user type for `{0}`")]
    UserTypeNotRegistered(String),

    /// Indexing or dereferencing a value that is neither an array nor a pointer
    #[error("Value of type `{0}` is not an array or a pointer")]
    NotArrayOrPointer(String),

    /// Dereferencing a value that is not a pointer
    #[error("Value of type `{0}` is not a pointer")]
    NotPointer(String),

    /// Array-only query on a non-array type
    #[error("Type `{0}` is not an array")]
    NotArray(String),

    /// Casting a non-pointer value with a zero address to a non-pointer type
    ///
    /// There is no storage to re-read under the new type.
    #[error("Cannot cast `{from}` with null address to `{to}`")]
    NullAddressCast
    {
        /// Type of the value being cast
        from: String,
        /// Requested type
        to: String,
    },

    /// Single-base accessor used on a type without base classes
    #[error("Type `{0}` has no base class")]
    NoBaseClass(String),

    /// Single-base accessor used on a type with several direct base classes
    #[error("Type `{type_name}` has {count} direct base classes")]
    MultipleBaseClasses
    {
        /// Name of the type
        type_name: String,
        /// Number of direct base classes
        count: usize,
    },

    /// Base class index past the end of the sorted direct base list
    #[error("Base class index {index} out of range for `{type_name}` ({count} base classes)")]
    BaseClassIndexOutOfRange
    {
        /// Name of the type
        type_name: String,
        /// Requested index
        index: usize,
        /// Number of direct base classes
        count: usize,
    },

    /// Layout query on a type kind that has no layout
    ///
    /// The untyped pointer fallback has no size, fields, base classes or
    /// element type. Asking for them is a programming error.
    #[error("`{query}` is not supported for type `{type_name}`")]
    UnsupportedTypeQuery
    {
        /// Name of the type
        type_name: String,
        /// The query that was attempted
        query: &'static str,
    },

    /// Text-backed conversion could not parse the value's rendering
    #[error("Cannot convert `{text}` to {target}")]
    ConversionFailed
    {
        /// Rendered value text
        text: String,
        /// Requested primitive type
        target: &'static str,
    },

    /// Reading target memory failed
    ///
    /// The memory may be unmapped, or the provider lost access to the target.
    #[error("Failed to read {size} bytes at {address}")]
    MemoryReadFailed
    {
        /// Start of the failed read
        address: Address,
        /// Requested byte count
        size: usize,
    },

    /// A data word of this byte size cannot be decoded
    ///
    /// Only 1, 2, 4 and 8 byte words are supported.
    #[error("Unsupported data size: {0} bytes")]
    UnsupportedDataSize(u64),

    /// The symbol/memory provider or managed bridge reported a failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid argument passed to a function
    ///
    /// Examples:
    /// - Region index bit width that does not divide 64
    /// - Memory regions not sorted by start address
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (for file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SymscopeError
{
    /// Classify this error
    #[must_use]
    pub fn category(&self) -> ErrorCategory
    {
        match self {
            SymscopeError::FieldNotFound { .. }
            | SymscopeError::BaseClassNotFound { .. }
            | SymscopeError::TypeNotFound { .. }
            | SymscopeError::ModuleNotFound(_)
            | SymscopeError::AmbiguousModule { .. }
            | SymscopeError::GlobalNotFound(_)
            | SymscopeError::UserTypeNotRegistered(_) => ErrorCategory::NotFound,
            SymscopeError::NotArrayOrPointer(_)
            | SymscopeError::NotPointer(_)
            | SymscopeError::NotArray(_)
            | SymscopeError::NullAddressCast { .. }
            | SymscopeError::NoBaseClass(_)
            | SymscopeError::MultipleBaseClasses { .. }
            | SymscopeError::BaseClassIndexOutOfRange { .. }
            | SymscopeError::UnsupportedTypeQuery { .. }
            | SymscopeError::ConversionFailed { .. } => ErrorCategory::TypeMismatch,
            SymscopeError::MemoryReadFailed { .. }
            | SymscopeError::UnsupportedDataSize(_)
            | SymscopeError::Provider(_)
            | SymscopeError::InvalidArgument(_)
            | SymscopeError::Io(_) => ErrorCategory::Environment,
        }
    }

    /// `true` for unknown names
    #[must_use]
    pub fn is_not_found(&self) -> bool
    {
        self.category() == ErrorCategory::NotFound
    }

    /// `true` for operations applied to the wrong kind of type or value
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool
    {
        self.category() == ErrorCategory::TypeMismatch
    }

    /// `true` for target or provider failures
    #[must_use]
    pub fn is_environment(&self) -> bool
    {
        self.category() == ErrorCategory::Environment
    }
}

/// Convenience type alias for `Result<T, SymscopeError>`
///
/// ```rust
/// use symscope_core::error::SymscopeResult;
/// fn foo() -> SymscopeResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type SymscopeResult<T> = std::result::Result<T, SymscopeError>;
