use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without origin-specific detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a tree allocation failure.
    ///
    /// `size` is the number of bytes that could not be obtained, `allocator`
    /// names the component that asked for them and `what` the operation.
    pub(crate) fn out_of_memory(size: usize, allocator: &'static str, what: &'static str) -> Self {
        let err = TreeError::OutOfMemory {
            size,
            allocator,
            what,
        };

        Self {
            class: ErrorClass::OutOfMemory,
            origin: ErrorOrigin::Tree,
            message: err.to_string(),
            detail: Some(ErrorDetail::Tree(err)),
        }
    }

    /// Construct an index uniqueness violation conflict error.
    pub(crate) fn index_violation(index: &str, space: &str) -> Self {
        let err = IndexError::UniqueViolation {
            index: index.to_string(),
            space: space.to_string(),
        };

        Self {
            class: ErrorClass::Conflict,
            origin: ErrorOrigin::Index,
            message: err.to_string(),
            detail: Some(ErrorDetail::Index(err)),
        }
    }

    /// Construct a missing-record error for a must-exist replace.
    pub(crate) fn tuple_not_found(index: &str, space: &str) -> Self {
        let err = IndexError::TupleNotFound {
            index: index.to_string(),
            space: space.to_string(),
        };

        Self {
            class: ErrorClass::Conflict,
            origin: ErrorOrigin::Index,
            message: err.to_string(),
            detail: Some(ErrorDetail::Index(err)),
        }
    }

    /// Construct an unsupported-iterator error for a tree index.
    pub(crate) fn unsupported_iterator(index: &str, code: u32) -> Self {
        let err = IndexError::UnsupportedIteratorType {
            index: index.to_string(),
            code,
        };

        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Iterator,
            message: err.to_string(),
            detail: Some(ErrorDetail::Index(err)),
        }
    }

    /// Construct a key arity error.
    pub(crate) fn key_part_count(index: &str, expected: usize, found: usize) -> Self {
        let err = IndexError::KeyPartCount {
            index: index.to_string(),
            expected,
            found,
        };

        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Key,
            message: err.to_string(),
            detail: Some(ErrorDetail::Index(err)),
        }
    }

    /// Construct a field type mismatch error for an indexed field.
    pub(crate) fn field_type(
        index: &str,
        fieldno: u32,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        let err = IndexError::FieldType {
            index: index.to_string(),
            fieldno,
            expected,
            found,
        };

        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Tuple,
            message: err.to_string(),
            detail: Some(ErrorDetail::Index(err)),
        }
    }

    /// Construct an index-origin unsupported error.
    pub(crate) fn index_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Index, message.into())
    }

    /// Construct an index-origin invariant violation.
    pub(crate) fn index_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Index,
            message.into(),
        )
    }

    /// Construct a key-origin unsupported error.
    pub(crate) fn key_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Key, message.into())
    }

    /// Construct a config-origin unsupported error.
    pub(crate) fn config_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Config, message.into())
    }

    /// Construct a serialize-origin corruption error.
    pub(crate) fn serialize_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Serialize, message.into())
    }

    /// Construct a serialize-origin internal error.
    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message.into())
    }

    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self.class, ErrorClass::OutOfMemory)
    }

    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Index(IndexError::UniqueViolation { .. }))
        )
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Index(IndexError),
    #[error("{0}")]
    Tree(TreeError),
}

///
/// IndexError
///
/// Index-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Index`].
///

#[derive(Debug, ThisError)]
pub enum IndexError {
    #[error("Duplicate key exists in unique index '{index}' in space '{space}'")]
    UniqueViolation { index: String, space: String },

    #[error("Tuple to replace not found in index '{index}' in space '{space}'")]
    TupleNotFound { index: String, space: String },

    #[error("index '{index}' does not support requested iterator type {code}")]
    UnsupportedIteratorType { index: String, code: u32 },

    #[error("invalid key part count for index '{index}' (expected {expected}, got {found})")]
    KeyPartCount {
        index: String,
        expected: usize,
        found: usize,
    },

    #[error("field {fieldno} of index '{index}' type mismatch: expected {expected}, got {found}")]
    FieldType {
        index: String,
        fieldno: u32,
        expected: &'static str,
        found: &'static str,
    },
}

///
/// TreeError
///
/// Tree-container structured error detail.
///

#[derive(Debug, ThisError)]
pub enum TreeError {
    #[error("Failed to allocate {size} bytes in {allocator} for {what}")]
    OutOfMemory {
        size: usize,
        allocator: &'static str,
        what: &'static str,
    },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Corruption,
    OutOfMemory,
    Internal,
    Conflict,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Corruption => "corruption",
            Self::OutOfMemory => "out_of_memory",
            Self::Internal => "internal",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Serialize,
    Tuple,
    Key,
    Tree,
    Index,
    Iterator,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Serialize => "serialize",
            Self::Tuple => "tuple",
            Self::Key => "key",
            Self::Tree => "tree",
            Self::Index => "index",
            Self::Iterator => "iterator",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_names_index_and_space() {
        let err = InternalError::index_violation("secondary", "users");

        assert!(err.is_unique_violation());
        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(
            err.to_string(),
            "Duplicate key exists in unique index 'secondary' in space 'users'"
        );
    }

    #[test]
    fn out_of_memory_reports_size_and_component() {
        let err = InternalError::out_of_memory(16384, "tree_index", "replace");

        assert!(err.is_out_of_memory());
        assert_eq!(
            err.display_with_class(),
            "tree:out_of_memory: Failed to allocate 16384 bytes in tree_index for replace"
        );
    }
}
