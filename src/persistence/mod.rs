//! Durability
//!
//! - `aof`: the append-only file of mutating requests and its replay

pub mod aof;

pub use aof::{replay, AofError, AofResult, AppendOnlyLog, ReplayReport};
