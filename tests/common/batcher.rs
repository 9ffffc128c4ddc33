use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use batchfetch::{BatchFn, BatchResult};
use futures_timer::Delay;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MyError {
    #[error("backend unavailable")]
    Unavailable,
    #[error("key {0} is odd")]
    Odd(i32),
}

#[derive(Clone, Copy, Debug)]
pub enum Mode {
    /// every key resolves to `key * 10`
    Ok,
    /// odd keys fail individually
    OddKeysFail,
    /// the whole batch fails
    Unavailable,
    /// the last key of each batch gets no value
    Short,
}

/// Records every batch it is asked to load.
#[derive(Clone)]
pub struct Batcher {
    mode: Mode,
    delay: Duration,
    calls: Arc<Mutex<Vec<Vec<i32>>>>,
}

impl Batcher {
    pub fn new() -> Batcher {
        Batcher::with_mode(Mode::Ok)
    }

    pub fn with_mode(mode: Mode) -> Batcher {
        Batcher {
            mode,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every load take at least `delay`.
    pub fn delayed(self, delay: Duration) -> Batcher {
        Batcher { delay, ..self }
    }

    pub fn calls(&self) -> Vec<Vec<i32>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BatchFn<i32, i32> for Batcher {
    type Error = MyError;

    async fn load(&self, keys: &[i32]) -> BatchResult<i32, MyError> {
        self.calls.lock().unwrap().push(keys.to_vec());
        if !self.delay.is_zero() {
            Delay::new(self.delay).await;
        }
        match self.mode {
            Mode::Ok => Ok(keys.iter().map(|k| Ok(k * 10)).collect()),
            Mode::OddKeysFail => Ok(keys
                .iter()
                .map(|&k| if k % 2 == 0 { Ok(k * 10) } else { Err(MyError::Odd(k)) })
                .collect()),
            Mode::Unavailable => Err(MyError::Unavailable),
            Mode::Short => Ok(keys
                .iter()
                .take(keys.len().saturating_sub(1))
                .map(|k| Ok(k * 10))
                .collect()),
        }
    }
}
