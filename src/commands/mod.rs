//! Command Layer
//!
//! Receives decoded requests, checks them against the command table, logs the
//! ones that mutate, and runs them against the storage engine.
//!
//! ```text
//! Client Request / AOF record
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │ CommandHandler  │─────>│  AppendOnlyLog  │  (mutating commands only)
//! └────────┬────────┘      └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Strings
//! - `GET`, `SET`, `EXISTS`, `DEL`, `APPEND`, `INCR`, `COPY`
//!
//! ### Hashes
//! - `HSET`, `HGET`, `HGETALL`, `HDEL`
//!
//! ### Lists
//! - `RPUSH`, `LPUSH`, `LLEN`, `LSET`, `LRANGE`
//!
//! ### Connection
//! - `PING`

pub mod handler;
pub mod registry;

mod hashes;
mod lists;
mod server;
mod strings;

pub use handler::CommandHandler;
pub use registry::{Arity, CommandSpec};
