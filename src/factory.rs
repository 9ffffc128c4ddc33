use std::collections::HashMap;
use std::hash::Hash;

use crate::{BatchFn, ConfigError, Loader, LoaderConfig};

/// Hands out a fresh [`Loader`] per logical request.
///
/// Loaders cache everything they resolve for as long as they live. Sharing
/// one across requests grows that cache without bound and leaks data between
/// requests, so long lived code keeps a factory instead and asks it for a
/// new loader whenever a request starts.
#[derive(Debug, Clone)]
pub struct LoaderFactory<F> {
    fetch: F,
    config: LoaderConfig,
}

impl<F: Clone> LoaderFactory<F> {
    pub fn new(fetch: F, config: LoaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(LoaderFactory { fetch, config })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// A loader with an empty cache and no open batch.
    pub fn loader<K, V>(&self) -> Loader<K, V, F>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: BatchFn<K, V>,
    {
        // validated in `new`
        Loader::from_parts(self.fetch.clone(), self.config, HashMap::new())
    }
}
