//! Batching, deduplicating key-value loader.
//!
//! A [`Loader`] turns many independent point lookups issued during one
//! logical request into a few calls of a [`BatchFn`]. Keys are collected for a
//! short wait window, or until a batch is full, then fetched together; each
//! caller gets back a [`Thunk`] that resolves to its own value or error.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use batchfetch::{BatchResult, Loader};
//!
//! # async fn run() {
//! let loader: Loader<u64, String, _> = Loader::builder()
//!     .fetch(|ids: Vec<u64>| async move {
//!         let users: Vec<Result<String, String>> =
//!             ids.iter().map(|id| Ok(format!("user-{}", id))).collect();
//!         BatchResult::Ok(users)
//!     })
//!     .wait(Duration::from_millis(5))
//!     .max_batch_size(50)
//!     .build()
//!     .unwrap();
//!
//! let (a, b) = (loader.load(1), loader.load(2));
//! assert_eq!(Ok("user-1".to_string()), a.await);
//! assert_eq!(Ok("user-2".to_string()), b.await);
//! # }
//! ```

#[cfg(not(any(feature = "runtime-async-std", feature = "runtime-tokio")))]
compile_error!("enable one of the `runtime-async-std` or `runtime-tokio` features");

mod batch;
mod batch_fn;
mod cache;
mod config;
mod error;
mod factory;
mod loader;
mod runtime;
mod thunk;

pub use batch_fn::{BatchFn, BatchResult};
pub use cache::Cache;
pub use config::LoaderConfig;
pub use error::{ConfigError, LoadError};
pub use factory::LoaderFactory;
pub use loader::{Loader, LoaderBuilder};
pub use thunk::{ManyThunk, Thunk};
