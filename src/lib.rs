//! # LedgerKV - An In-Memory Key-Value Store with an Append-Only Log
//!
//! LedgerKV speaks the Redis wire protocol (RESP) and keeps three kinds of
//! values in memory: strings, hashes and lists. Every command that changes
//! data is written to an append-only file before it takes effect, and the file
//! is replayed on startup to rebuild the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              LedgerKV                               │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │              │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │              │
//! │  └─────────────┘    └──────┬──────┘    └──┬───────┬──┘              │
//! │                            │ decode       │ log   │ apply           │
//! │                            ▼              ▼       ▼                 │
//! │                     ┌─────────────┐ ┌──────────┐ ┌────────────────┐ │
//! │                     │ RESP Parser │ │ Append-  │ │ StorageEngine  │ │
//! │                     │             │ │ Only File│>│ scalars/hashes │ │
//! │                     └─────────────┘ └──────────┘ │ /lists         │ │
//! │                                       (replay)   └────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ledgerkv::commands::CommandHandler;
//! use ledgerkv::connection::{handle_connection, ConnectionStats};
//! use ledgerkv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let (handler, _report) = CommandHandler::recover(storage, "appendonly.aof")?;
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         tokio::spawn(handle_connection(stream, addr, handler.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP values, encoder and incremental parser
//! - [`storage`]: the three independently locked containers
//! - [`persistence`]: append-only file and replay
//! - [`commands`]: command table and dispatcher
//! - [`connection`]: per-client read/execute/respond loop
//!
//! ## Design Highlights
//!
//! ### Log order is apply order
//!
//! A mutating command holds the log's mutex from the moment its record is
//! written until its handler returns, so replaying the file reproduces the
//! exact sequence of changes that live clients observed.
//!
//! ### Atomic read-modify-write
//!
//! `INCR`, `APPEND`, `COPY` and `HDEL` each run under one write guard, so
//! concurrent clients never lose updates.
//!
//! ### Binary safety
//!
//! Keys and values are `bytes::Bytes`. Bulk strings are framed by their length
//! prefix, so payloads containing `\r\n` or NUL bytes pass through unchanged.

pub mod commands;
pub mod connection;
pub mod persistence;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use persistence::{AppendOnlyLog, ReplayReport};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port LedgerKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Append-only file used when none is given on the command line
pub const DEFAULT_AOF_PATH: &str = "appendonly.aof";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
