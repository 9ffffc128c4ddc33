use std::future::Future;

// runtime-async-std
#[cfg(all(feature = "runtime-async-std", not(feature = "runtime-tokio")))]
pub use async_std::task::sleep;

#[cfg(all(feature = "runtime-async-std", not(feature = "runtime-tokio")))]
pub fn spawn<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    // dropping the handle detaches the task
    async_std::task::spawn(task);
}

// runtime-tokio
#[cfg(feature = "runtime-tokio")]
pub use tokio::time::sleep;

/// Panics when called outside of a tokio runtime context.
#[cfg(feature = "runtime-tokio")]
pub fn spawn<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(task);
}
