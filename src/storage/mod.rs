//! Storage Engine Module
//!
//! In-memory home of every scalar, hash and list. The engine knows nothing
//! about the wire protocol or the append-only log; command handlers translate
//! between them.
//!
//! ## Example
//!
//! ```
//! use ledgerkv::storage::{StorageEngine, StorageError};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//!
//! assert_eq!(engine.incr(&Bytes::from("hits")), Ok(1));
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(engine.incr(&Bytes::from("name")), Err(StorageError::NotAnInteger));
//!
//! engine.hset(Bytes::from("user:1"), Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(engine.hget(b"user:1", b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod engine;

pub use engine::{StorageEngine, StorageError, StorageResult, StorageStats};
