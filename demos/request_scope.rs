//! One loader per request, fed by a shared repository.
//!
//! Run with `RUST_LOG=batchfetch=debug cargo run --example request_scope` to
//! watch batches open, close and complete.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use batchfetch::{LoadError, LoaderConfig, LoaderFactory};
use futures::future;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Error)]
enum RepoError {
    #[error("category {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone)]
struct Category {
    name: String,
}

struct Repository {
    categories: HashMap<String, Category>,
}

impl Repository {
    async fn categories(&self, ids: &[String]) -> Vec<Result<Category, RepoError>> {
        println!("repository: fetching {:?}", ids);
        ids.iter()
            .map(|id| {
                self.categories
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RepoError::NotFound(id.clone()))
            })
            .collect()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let repo = Arc::new(Repository {
        categories: [("food", "Food and Drink"), ("travel", "Travel"), ("rent", "Rent")]
            .into_iter()
            .map(|(id, name)| {
                (
                    id.to_string(),
                    Category {
                        name: name.to_string(),
                    },
                )
            })
            .collect(),
    });

    let fetch = move |ids: Vec<String>| {
        let repo = repo.clone();
        async move { Ok::<_, RepoError>(repo.categories(&ids).await) }
    };
    let config = LoaderConfig::default().wait(Duration::from_millis(10));
    let factory = LoaderFactory::new(fetch, config).unwrap();

    for request in 1..=2 {
        println!("\n -- request {} --", request);
        let loader = factory.loader::<String, Category>();

        let transactions = ["food", "rent", "food", "travel", "gym"];
        let thunks: Vec<_> = transactions
            .iter()
            .map(|id| loader.load(id.to_string()))
            .collect();
        let categories = future::join_all(thunks.iter().map(|t| t.get())).await;

        for (id, category) in transactions.iter().zip(categories) {
            match category {
                Ok(category) => println!("{:>8} => {}", id, category.name),
                Err(LoadError::Key(e)) => println!("{:>8} => {}", id, e),
                Err(e) => println!("{:>8} => request failed: {}", id, e),
            }
        }

        // resolved keys are served from this request's cache
        let again = loader.load("food".to_string());
        println!("cached: {}, cache size: {}", again.is_ready(), loader.cached_len());
    }
}
