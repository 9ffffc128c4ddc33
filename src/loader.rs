use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, debug_span, trace, Instrument as _};

use crate::batch::{BatchId, ClosedBatch, Enrollment, OpenBatch, Outcome};
use crate::{
    runtime, BatchFn, Cache, ConfigError, LoadError, LoaderConfig, ManyThunk, Thunk,
};

/// Batching, deduplicating and caching front of a [`BatchFn`].
///
/// Keys passed to [`Loader::load`] are collected into one open batch until
/// either the configured wait elapses or the batch reaches
/// `max_batch_size`, whichever happens first. The batch is then handed to the
/// fetch function exactly once. Every successfully loaded value is cached for
/// the lifetime of the loader, so a loader is meant to live as long as one
/// logical request. See [`LoaderFactory`](crate::LoaderFactory).
pub struct Loader<K, V, F, C = HashMap<K, V>>
where
    F: BatchFn<K, V>,
{
    inner: Arc<Inner<K, V, F, C>>,
}

// Manual implementation is used to omit applying unnecessary Clone bounds.
impl<K, V, F, C> Clone for Loader<K, V, F, C>
where
    F: BatchFn<K, V>,
{
    fn clone(&self) -> Self {
        Loader {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<K, V, F, C>
where
    F: BatchFn<K, V>,
{
    state: Mutex<State<K, V, F::Error, C>>,
    fetch: F,
    config: LoaderConfig,
}

struct State<K, V, E, C> {
    cache: C,
    current: Option<OpenBatch<K, V, E>>,
    last_id: BatchId,
}

impl<K, V, E, C> State<K, V, E, C>
where
    K: Eq + Hash + Clone,
{
    fn open_batch(&mut self) -> &mut OpenBatch<K, V, E> {
        let last_id = &mut self.last_id;
        self.current.get_or_insert_with(|| {
            *last_id += 1;
            debug!(batch = *last_id, "opening batch");
            OpenBatch::new(*last_id)
        })
    }

    /// Detaches the open batch if it is still the one with `id`.
    fn close(&mut self, id: BatchId) -> Option<ClosedBatch<K, V, E>> {
        if self.current.as_ref().map(OpenBatch::id) != Some(id) {
            return None;
        }
        self.current.take().map(OpenBatch::close)
    }
}

enum Action<K, V, E> {
    StartTimer(BatchId),
    Dispatch(ClosedBatch<K, V, E>),
    Wait,
}

impl<K, V, F> Loader<K, V, F>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    /// Create a loader with the default [`LoaderConfig`].
    pub fn new(fetch: F) -> Self {
        Loader::from_parts(fetch, LoaderConfig::default(), HashMap::new())
    }

    pub fn with_config(fetch: F, config: LoaderConfig) -> Result<Self, ConfigError> {
        Loader::with_cache(fetch, config, HashMap::new())
    }

    pub fn builder() -> LoaderBuilder<K, V, F> {
        LoaderBuilder::new()
    }
}

impl<K, V, F, C> Loader<K, V, F, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
    C: Cache<K, V> + Send + 'static,
{
    /// Create a loader backed by the given cache storage.
    pub fn with_cache(fetch: F, config: LoaderConfig, cache: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Loader::from_parts(fetch, config, cache))
    }

    pub(crate) fn from_parts(fetch: F, config: LoaderConfig, cache: C) -> Self {
        Loader {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    cache,
                    current: None,
                    last_id: 0,
                }),
                fetch,
                config,
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Get the fetch function.
    pub fn fetcher(&self) -> &F {
        &self.inner.fetch
    }

    /// Enroll `key` in the open batch and return a handle to its result.
    ///
    /// Never waits. A cached key yields an already resolved thunk. Otherwise
    /// the key joins the open batch, reusing its slot if the key is already
    /// enrolled there, and the first key of a batch starts its timer. The key
    /// that fills a batch dispatches it right away.
    ///
    /// Successful values are cached by the dispatch task before any thunk of
    /// the batch resolves, so they are cached even if no caller awaits them.
    ///
    /// # Panics
    ///
    /// With the `runtime-tokio` feature, panics when called outside a tokio
    /// runtime, since the batch timer is spawned with `tokio::spawn`.
    pub fn load(&self, key: K) -> Thunk<V, F::Error> {
        let (thunk, action) = {
            let mut state = self.inner.lock();
            if let Some(value) = state.cache.get(&key) {
                trace!("cache hit");
                return Thunk::ready(value);
            }

            let max_batch_size = self.inner.config.max_batch_size;
            let batch = state.open_batch();
            let id = batch.id();
            let enrollment = batch.enroll(key);
            let full = max_batch_size > 0 && batch.len() >= max_batch_size;
            let thunk = Thunk::pending(batch.done(), enrollment.index());
            trace!(batch = id, index = enrollment.index(), "enrolled key");

            let action = match enrollment {
                Enrollment::Joined(_) => Action::Wait,
                Enrollment::Appended { .. } if full => match state.close(id) {
                    Some(batch) => Action::Dispatch(batch),
                    None => Action::Wait,
                },
                Enrollment::Appended { first: true, .. } => Action::StartTimer(id),
                Enrollment::Appended { first: false, .. } => Action::Wait,
            };
            (thunk, action)
        };

        match action {
            Action::StartTimer(id) => {
                let span = debug_span!("batch_timer", batch = id);
                runtime::spawn(self.inner.clone().close_after_wait(id).instrument(span));
            }
            Action::Dispatch(batch) => {
                debug!(batch = batch.id, "batch full, dispatching immediately");
                let span = debug_span!("dispatch", batch = batch.id);
                runtime::spawn(self.inner.clone().dispatch(batch).instrument(span));
            }
            Action::Wait => {}
        }

        thunk
    }

    /// Enroll every key now and return one handle resolving all of them, in
    /// key order.
    pub fn load_many_thunk<I>(&self, keys: I) -> ManyThunk<V, F::Error>
    where
        I: IntoIterator<Item = K>,
    {
        ManyThunk::new(keys.into_iter().map(|key| self.load(key)).collect())
    }

    /// Load every key; results come back in key order.
    pub async fn load_many<I>(&self, keys: I) -> Vec<Result<V, LoadError<F::Error>>>
    where
        I: IntoIterator<Item = K>,
    {
        self.load_many_thunk(keys).get().await
    }

    /// Load every key, failing with the first error.
    pub async fn try_load_many<I>(&self, keys: I) -> Result<Vec<V>, LoadError<F::Error>>
    where
        I: IntoIterator<Item = K>,
    {
        self.load_many_thunk(keys).try_get().await
    }

    /// Cache `value` under `key` unless the key is already cached.
    ///
    /// Returns whether the value was inserted. To replace a cached value,
    /// [`clear`](Loader::clear) the key first.
    pub fn prime(&self, key: K, value: V) -> bool {
        let mut state = self.inner.lock();
        if state.cache.contains_key(&key) {
            return false;
        }
        state.cache.insert(key, value);
        true
    }

    /// Prime every pair, returning how many were inserted.
    pub fn prime_many<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut state = self.inner.lock();
        let mut inserted = 0;
        for (key, value) in values {
            if !state.cache.contains_key(&key) {
                state.cache.insert(key, value);
                inserted += 1;
            }
        }
        inserted
    }

    /// Drop `key` from the cache. Batches already in flight are not affected.
    pub fn clear(&self, key: &K) {
        self.inner.lock().cache.remove(key);
    }

    pub fn clear_all(&self) {
        self.inner.lock().cache.clear();
    }

    pub fn cached(&self, key: &K) -> Option<V> {
        self.inner.lock().cache.get(key)
    }

    pub fn cached_len(&self) -> usize {
        self.inner.lock().cache.len()
    }
}

impl<K, V, F, C> Inner<K, V, F, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
    C: Cache<K, V> + Send + 'static,
{
    // Cache and batch bookkeeping stays consistent across a panicking holder,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, State<K, V, F::Error, C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn close_after_wait(self: Arc<Self>, id: BatchId) {
        runtime::sleep(self.config.wait).await;

        let batch = {
            let mut state = self.lock();
            state.close(id)
        };
        match batch {
            Some(batch) => {
                debug!(batch = id, "wait elapsed, dispatching");
                self.dispatch(batch).await;
            }
            // the size limit closed it first
            None => trace!(batch = id, "already dispatched"),
        }
    }

    async fn dispatch(self: Arc<Self>, batch: ClosedBatch<K, V, F::Error>) {
        debug!(keys = batch.keys.len(), "fetching batch");
        let outcome = Arc::new(Outcome::from(self.fetch.load(&batch.keys).await));

        let cached = {
            let mut state = self.lock();
            let mut cached = 0;
            for (key, value) in outcome.resolved(&batch.keys) {
                state.cache.insert(key.clone(), value.clone());
                cached += 1;
            }
            cached
        };
        debug!(
            keys = batch.keys.len(),
            cached,
            failed = matches!(*outcome, Outcome::Failed(_)),
            "batch complete"
        );

        batch.complete(outcome);
    }
}

/// Step by step construction of a [`Loader`].
pub struct LoaderBuilder<K, V, F, C = HashMap<K, V>> {
    fetch: Option<F>,
    config: LoaderConfig,
    cache: C,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, F> LoaderBuilder<K, V, F> {
    pub fn new() -> Self {
        LoaderBuilder {
            fetch: None,
            config: LoaderConfig::default(),
            cache: HashMap::new(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, F> Default for LoaderBuilder<K, V, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, F, C> LoaderBuilder<K, V, F, C> {
    #[must_use]
    pub fn fetch(self, fetch: F) -> Self {
        Self {
            fetch: Some(fetch),
            ..self
        }
    }

    #[must_use]
    pub fn config(self, config: LoaderConfig) -> Self {
        Self { config, ..self }
    }

    #[must_use]
    pub fn wait(self, wait: Duration) -> Self {
        let config = self.config.wait(wait);
        Self { config, ..self }
    }

    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        let config = self.config.max_batch_size(max_batch_size);
        Self { config, ..self }
    }

    /// Replace the cache storage.
    #[must_use]
    pub fn cache<C2>(self, cache: C2) -> LoaderBuilder<K, V, F, C2> {
        LoaderBuilder {
            fetch: self.fetch,
            config: self.config,
            cache,
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Result<Loader<K, V, F, C>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: BatchFn<K, V>,
        C: Cache<K, V> + Send + 'static,
    {
        let fetch = self.fetch.ok_or(ConfigError::MissingFetch)?;
        Loader::with_cache(fetch, self.config, self.cache)
    }
}
