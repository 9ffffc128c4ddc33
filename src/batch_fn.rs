use std::future::Future;

use async_trait::async_trait;

/// What a [`BatchFn`] hands back for one dispatched batch.
///
/// The outer `Err` fails every key of the batch at once. Otherwise the
/// inner vector is aligned by index with the requested keys, and each slot
/// carries its own value or error.
pub type BatchResult<V, E> = Result<Vec<Result<V, E>>, E>;

/// Resolves a batch of keys in one call.
///
/// Implementations take `&self` so that several closed batches of the same
/// loader may be in flight at the same time.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static {
    type Error: Clone + Send + Sync + 'static;

    async fn load(&self, keys: &[K]) -> BatchResult<V, Self::Error>;
}

#[async_trait]
impl<K, V, E, F, Fut> BatchFn<K, V> for F
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BatchResult<V, E>> + Send + 'static,
{
    type Error = E;

    async fn load(&self, keys: &[K]) -> BatchResult<V, E> {
        (self)(keys.to_vec()).await
    }
}
