//! Error types for store operations.
//!
//! Every caller-recoverable boundary condition is an explicit error
//! value; internal consistency violations are debug assertions inside
//! the stores themselves.

use thiserror::Error;

/// Result type for store operations
pub type AllocResult<T> = Result<T, AllocError>;

/// Allocation and configuration errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The host allocator could not provide the requested region.
    #[error("host allocation of {bytes} bytes failed")]
    HostExhausted {
        /// Bytes requested from the host
        bytes: usize,
    },

    /// Zero-size allocation requests are rejected at the boundary.
    #[error("zero-size allocation request")]
    ZeroSize,

    /// A fixed-block store was asked for more than one block's worth.
    #[error("request of {requested} bytes exceeds fixed block size {block_size}")]
    BlockTooLarge {
        /// Requested size
        requested: usize,
        /// The store's immutable block size
        block_size: usize,
    },

    /// A request larger than the store can address in one block.
    #[error("request of {requested} bytes exceeds maximum supported size {max}")]
    ExceedsMaxSize {
        /// Requested size
        requested: usize,
        /// Largest size this store can represent
        max: usize,
    },

    /// Constructor parameters that cannot produce a usable store.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the parameters
        reason: &'static str,
    },
}

impl AllocError {
    /// True when retrying after the caller frees memory could succeed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::HostExhausted { .. })
    }

    /// Short machine-readable code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::HostExhausted { .. } => "STORE:HOST:EXHAUSTED",
            Self::ZeroSize => "STORE:ALLOC:ZERO",
            Self::BlockTooLarge { .. } => "STORE:ALLOC:OVERSIZE",
            Self::ExceedsMaxSize { .. } => "STORE:ALLOC:MAX",
            Self::InvalidConfig { .. } => "STORE:CONFIG:INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_is_the_only_retryable_error() {
        assert!(AllocError::HostExhausted { bytes: 64 }.is_exhausted());
        assert!(!AllocError::ZeroSize.is_exhausted());
        assert!(
            !AllocError::BlockTooLarge {
                requested: 32,
                block_size: 16
            }
            .is_exhausted()
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(AllocError::ZeroSize.code(), "STORE:ALLOC:ZERO");
        assert_eq!(
            AllocError::InvalidConfig { reason: "x" }.code(),
            "STORE:CONFIG:INVALID"
        );
    }

    #[test]
    fn display_includes_sizes() {
        let err = AllocError::BlockTooLarge {
            requested: 32,
            block_size: 16,
        };
        assert_eq!(
            err.to_string(),
            "request of 32 bytes exceeds fixed block size 16"
        );
    }
}
