#![allow(dead_code)]

mod batcher;

pub use batcher::*;
