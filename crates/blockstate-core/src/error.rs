//! Error types for blockstate

use thiserror::Error;

use crate::FieldPath;

/// Error produced by a user handler.
///
/// Boxed so a handler can surface whatever error type it works with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core blockstate errors
#[derive(Error, Debug)]
pub enum BlockError {
    // Input errors
    #[error("Patch must be an object, got {found}")]
    PatchNotObject { found: &'static str },

    #[error("Seed must be an object, got {found}")]
    SeedNotObject { found: &'static str },

    // Cascade errors
    #[error("Cascade limit exceeded: more than {limit} handler runs in one cycle")]
    CascadeLimitExceeded { limit: usize },

    #[error("Handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("Nested block at {path} failed: {source}")]
    Nested {
        path: FieldPath,
        source: Box<BlockError>,
    },
}

impl BlockError {
    /// Wrap an error raised by a nested block's instance
    pub fn nested(path: FieldPath, source: BlockError) -> Self {
        BlockError::Nested {
            path,
            source: Box::new(source),
        }
    }

    /// Convert a handler's error.
    ///
    /// A `BlockError` the handler propagated from an `update` call passes
    /// through unchanged; anything else becomes [`BlockError::Handler`].
    pub fn from_handler(err: HandlerError) -> Self {
        match err.downcast::<BlockError>() {
            Ok(inner) => *inner,
            Err(other) => BlockError::Handler(other),
        }
    }

    /// Innermost error, skipping nested-block wrappers
    pub fn root_cause(&self) -> &BlockError {
        match self {
            BlockError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for blockstate operations
pub type BlockResult<T> = Result<T, BlockError>;
