use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{FutureExt as _, Shared};

use crate::{BatchResult, LoadError};

pub(crate) type BatchId = u64;

/// Fires once for every waiter of a batch. Resolves to `Err(Canceled)` if the
/// batch is dropped without completing.
pub(crate) type Done<V, E> = Shared<oneshot::Receiver<Arc<Outcome<V, E>>>>;

/// Result of one dispatch, shared by every thunk of the batch.
#[derive(Debug)]
pub(crate) enum Outcome<V, E> {
    Failed(E),
    Resolved(Vec<Result<V, E>>),
}

impl<V, E> From<BatchResult<V, E>> for Outcome<V, E> {
    fn from(result: BatchResult<V, E>) -> Self {
        match result {
            Ok(values) => Outcome::Resolved(values),
            Err(e) => Outcome::Failed(e),
        }
    }
}

impl<V: Clone, E: Clone> Outcome<V, E> {
    pub(crate) fn slot(&self, index: usize) -> Result<V, LoadError<E>> {
        match self {
            Outcome::Failed(e) => Err(LoadError::Batch(e.clone())),
            Outcome::Resolved(values) => match values.get(index) {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(e)) => Err(LoadError::Key(e.clone())),
                None => Err(LoadError::Unresolved { index }),
            },
        }
    }

    /// Pairs every successfully resolved key with its value.
    pub(crate) fn resolved<'a, K>(
        &'a self,
        keys: &'a [K],
    ) -> impl Iterator<Item = (&'a K, &'a V)> {
        let values: &[Result<V, E>] = match self {
            Outcome::Resolved(values) => values.as_slice(),
            Outcome::Failed(_) => &[],
        };
        keys.iter()
            .zip(values)
            .filter_map(|(k, v)| v.as_ref().ok().map(|v| (k, v)))
    }
}

/// Where a key landed inside the open batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enrollment {
    /// The key already had a slot in this batch.
    Joined(usize),
    /// A new slot was appended.
    Appended { index: usize, first: bool },
}

impl Enrollment {
    pub(crate) fn index(self) -> usize {
        match self {
            Enrollment::Joined(index) | Enrollment::Appended { index, .. } => index,
        }
    }
}

/// A batch that is still collecting keys.
///
/// Only the loader's current-batch slot holds an `OpenBatch`. Taking it out of
/// that slot and calling [`OpenBatch::close`] is the one way to dispatch it, so
/// the timer and the size limit can never both dispatch the same batch.
pub(crate) struct OpenBatch<K, V, E> {
    id: BatchId,
    keys: Vec<K>,
    slots: HashMap<K, usize>,
    tx: oneshot::Sender<Arc<Outcome<V, E>>>,
    done: Done<V, E>,
}

impl<K, V, E> OpenBatch<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new(id: BatchId) -> Self {
        let (tx, rx) = oneshot::channel();
        OpenBatch {
            id,
            keys: Vec::new(),
            slots: HashMap::new(),
            tx,
            done: rx.shared(),
        }
    }

    pub(crate) fn id(&self) -> BatchId {
        self.id
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn done(&self) -> Done<V, E> {
        self.done.clone()
    }

    pub(crate) fn enroll(&mut self, key: K) -> Enrollment {
        if let Some(&index) = self.slots.get(&key) {
            return Enrollment::Joined(index);
        }
        let index = self.keys.len();
        self.slots.insert(key.clone(), index);
        self.keys.push(key);
        Enrollment::Appended {
            index,
            first: index == 0,
        }
    }

    pub(crate) fn close(self) -> ClosedBatch<K, V, E> {
        ClosedBatch {
            id: self.id,
            keys: self.keys,
            tx: self.tx,
        }
    }
}

/// A batch detached from its loader, waiting for or running its fetch.
pub(crate) struct ClosedBatch<K, V, E> {
    pub(crate) id: BatchId,
    pub(crate) keys: Vec<K>,
    tx: oneshot::Sender<Arc<Outcome<V, E>>>,
}

impl<K, V, E> ClosedBatch<K, V, E> {
    /// Publishes the outcome to every waiter. Consumes the batch, so this
    /// happens at most once.
    pub(crate) fn complete(self, outcome: Arc<Outcome<V, E>>) {
        // no receivers left means every waiter gave up, which is fine
        let _ = self.tx.send(outcome);
    }
}
