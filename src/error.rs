use thiserror::Error;

/// Rejected loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("loader has no fetch function")]
    MissingFetch,
    #[error("wait must be positive when max_batch_size is {max_batch_size}")]
    ZeroWait { max_batch_size: usize },
}

/// Why a single key could not be loaded.
///
/// `E` is the error type of the loader's [`BatchFn`](crate::BatchFn) and is
/// handed back exactly as the fetch function produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError<E> {
    /// The whole batch failed; every key enrolled in it sees the same error.
    #[error("batch fetch failed: {0}")]
    Batch(E),
    /// The batch resolved but this key was flagged individually.
    #[error("key failed to load: {0}")]
    Key(E),
    /// The fetch function returned fewer values than keys.
    #[error("fetch returned no value for batch slot {index}")]
    Unresolved { index: usize },
    /// The dispatch ended without publishing a result, e.g. the fetch
    /// function panicked or the runtime shut down.
    #[error("batch was dropped before it completed")]
    Canceled,
}

impl<E> LoadError<E> {
    /// The error reported by the fetch function, if there is one.
    pub fn source_error(&self) -> Option<&E> {
        match self {
            LoadError::Batch(e) | LoadError::Key(e) => Some(e),
            LoadError::Unresolved { .. } | LoadError::Canceled => None,
        }
    }
}
