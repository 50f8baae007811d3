// src/lib.rs

//! shelf: book inventory and lending ledger library

pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
