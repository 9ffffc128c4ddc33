use std::fmt;
use std::future::IntoFuture;

use futures::future::{self, BoxFuture, FutureExt as _};

use crate::batch::Done;
use crate::LoadError;

/// Deferred result of [`Loader::load`](crate::Loader::load).
///
/// A thunk may be cloned and resolved any number of times; every resolution
/// yields the same result and none of them triggers another fetch. Dropping a
/// thunk, or a future resolving it, never cancels the batch it waits on.
pub struct Thunk<V, E> {
    state: State<V, E>,
}

enum State<V, E> {
    Ready(V),
    Pending { done: Done<V, E>, index: usize },
}

impl<V: Clone, E> Clone for Thunk<V, E> {
    fn clone(&self) -> Self {
        let state = match &self.state {
            State::Ready(v) => State::Ready(v.clone()),
            State::Pending { done, index } => State::Pending {
                done: done.clone(),
                index: *index,
            },
        };
        Thunk { state }
    }
}

impl<V, E> fmt::Debug for Thunk<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Ready(_) => f.debug_tuple("Thunk::Ready").finish(),
            State::Pending { index, .. } => f
                .debug_struct("Thunk::Pending")
                .field("index", index)
                .finish(),
        }
    }
}

impl<V, E> Thunk<V, E>
where
    V: Clone,
    E: Clone,
{
    pub(crate) fn ready(value: V) -> Self {
        Thunk {
            state: State::Ready(value),
        }
    }

    pub(crate) fn pending(done: Done<V, E>, index: usize) -> Self {
        Thunk {
            state: State::Pending { done, index },
        }
    }

    /// Whether the result is available without waiting: the value came from
    /// the cache, or some resolution of this batch has already finished.
    pub fn is_ready(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Pending { done, .. } => done.peek().is_some(),
        }
    }

    /// Waits for the batch this key was enrolled in, then returns its slot.
    pub async fn get(&self) -> Result<V, LoadError<E>> {
        match &self.state {
            State::Ready(v) => Ok(v.clone()),
            State::Pending { done, index } => {
                let outcome = done.clone().await.map_err(|_| LoadError::Canceled)?;
                outcome.slot(*index)
            }
        }
    }
}

impl<V, E> IntoFuture for Thunk<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Output = Result<V, LoadError<E>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.get().await }.boxed()
    }
}

/// Deferred results of [`Loader::load_many_thunk`](crate::Loader::load_many_thunk),
/// in the order the keys were given.
pub struct ManyThunk<V, E> {
    thunks: Vec<Thunk<V, E>>,
}

impl<V: Clone, E> Clone for ManyThunk<V, E> {
    fn clone(&self) -> Self {
        ManyThunk {
            thunks: self.thunks.clone(),
        }
    }
}

impl<V, E> ManyThunk<V, E>
where
    V: Clone,
    E: Clone,
{
    pub(crate) fn new(thunks: Vec<Thunk<V, E>>) -> Self {
        ManyThunk { thunks }
    }

    pub fn len(&self) -> usize {
        self.thunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thunks.is_empty()
    }

    pub fn thunks(&self) -> &[Thunk<V, E>] {
        &self.thunks
    }

    /// One result per key, in key order.
    pub async fn get(&self) -> Vec<Result<V, LoadError<E>>> {
        future::join_all(self.thunks.iter().map(|thunk| thunk.get())).await
    }

    /// All values in key order, or the first error encountered.
    pub async fn try_get(&self) -> Result<Vec<V>, LoadError<E>> {
        future::try_join_all(self.thunks.iter().map(|thunk| thunk.get())).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;

    use super::*;
    use crate::batch::{OpenBatch, Outcome};

    #[test]
    fn ready_thunk() {
        let thunk = Thunk::<u32, ()>::ready(5);
        assert!(thunk.is_ready());
        assert_eq!(Ok(5), block_on(thunk.get()));
        assert_eq!(Ok(5), block_on(thunk.into_future()));
    }

    #[test]
    fn pending_thunk_is_idempotent() {
        let mut batch = OpenBatch::<u32, u32, String>::new(1);
        let a = Thunk::pending(batch.done(), batch.enroll(1).index());
        let b = Thunk::pending(batch.done(), batch.enroll(2).index());
        assert!(!a.is_ready());

        batch
            .close()
            .complete(Arc::new(Outcome::Resolved(vec![Ok(10), Err("bad".into())])));

        assert_eq!(Ok(10), block_on(a.get()));
        assert!(a.is_ready());
        assert_eq!(Ok(10), block_on(a.clone().get()));
        assert_eq!(Err(LoadError::Key("bad".to_string())), block_on(b.get()));
        assert_eq!(Err(LoadError::Key("bad".to_string())), block_on(b.get()));
    }

    #[test]
    fn canceled_batch() {
        let mut batch = OpenBatch::<u32, u32, String>::new(1);
        let thunk = Thunk::pending(batch.done(), batch.enroll(1).index());
        drop(batch);
        assert_eq!(Err(LoadError::Canceled), block_on(thunk.get()));
    }

    #[test]
    fn many_thunk_keeps_order() {
        let mut batch = OpenBatch::<u32, u32, String>::new(1);
        let thunks = [3, 1, 2]
            .into_iter()
            .map(|k| Thunk::pending(batch.done(), batch.enroll(k).index()))
            .collect();
        let many = ManyThunk::new(thunks);
        assert_eq!(3, many.len());

        batch
            .close()
            .complete(Arc::new(Outcome::Resolved(vec![Ok(30), Ok(10), Ok(20)])));

        assert_eq!(vec![Ok(30), Ok(10), Ok(20)], block_on(many.get()));
        assert_eq!(Ok(vec![30, 10, 20]), block_on(many.try_get()));
    }
}
