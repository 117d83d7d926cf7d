//! Command Dispatcher
//!
//! Turns a decoded request into a reply:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//! │  │ resolve  │──>│  arity   │──>│ AOF      │──>│ handler  │  │
//! │  │ name+args│   │  check   │   │ (mutates)│   │          │  │
//! │  └──────────┘   └──────────┘   └──────────┘   └──────────┘  │
//! │                                                     │       │
//! │                                                     ▼       │
//! │                                               StorageEngine │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests that fail before the AOF step (bad shape, unknown command, wrong
//! arity) are never logged. Past that point a mutating request is logged even
//! if its handler then replies with an error; replaying it yields the same
//! error and changes nothing.

use super::registry::{self, CommandSpec};
use crate::persistence::{replay, AofResult, AppendOnlyLog, ReplayReport};
use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, trace};

const BAD_REQUEST: &str = "ERR Protocol error: expected a non-empty array of bulk strings";

/// Executes requests against the store, logging mutations when an
/// append-only log is attached.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
    aof: Option<Arc<AppendOnlyLog>>,
}

impl CommandHandler {
    /// A handler with no persistence.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage, aof: None }
    }

    /// A handler that logs every mutating command to `aof` before applying it.
    pub fn with_aof(storage: Arc<StorageEngine>, aof: Arc<AppendOnlyLog>) -> Self {
        Self {
            storage,
            aof: Some(aof),
        }
    }

    /// Rebuilds `storage` from the log at `path`, repairs a torn tail if
    /// there is one, and returns a handler that keeps appending to that log.
    pub fn recover(
        storage: Arc<StorageEngine>,
        path: impl AsRef<Path>,
    ) -> AofResult<(Self, ReplayReport)> {
        let path = path.as_ref();
        let replayer = Self::new(Arc::clone(&storage));

        let report = replay(path, |request| {
            let reply = replayer.apply_logged(request);
            if let RespValue::Error(message) = &reply {
                debug!(error = %message, "Logged command replayed to an error");
            }
        })?;

        let aof = AppendOnlyLog::open_after_replay(path, &report)?;
        Ok((Self::with_aof(storage, Arc::new(aof)), report))
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Executes a client request and returns the reply.
    pub fn execute(&self, request: RespValue) -> RespValue {
        let (spec, args) = match resolve(&request) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };

        trace!(command = spec.name, args = args.len(), "Dispatching");

        match &self.aof {
            Some(aof) if spec.mutates => {
                match aof.append_then(&request, || (spec.handler)(&self.storage, &args)) {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(command = spec.name, error = %e, "Failed to persist command");
                        RespValue::error(format!("ERR failed to persist command: {}", e))
                    }
                }
            }
            _ => (spec.handler)(&self.storage, &args),
        }
    }

    /// Applies a request read back from the append-only log. Identical to
    /// `execute` except that nothing is appended.
    pub fn apply_logged(&self, request: RespValue) -> RespValue {
        match resolve(&request) {
            Ok((spec, args)) => (spec.handler)(&self.storage, &args),
            Err(reply) => reply,
        }
    }
}

/// Validates the request and finds its command. On failure, returns the error
/// reply to send instead.
fn resolve(request: &RespValue) -> Result<(&'static CommandSpec, Vec<Bytes>), RespValue> {
    let parts = match request.as_array() {
        Some(parts) if !parts.is_empty() => parts,
        _ => return Err(RespValue::error(BAD_REQUEST)),
    };

    let name = parts[0]
        .as_bytes()
        .ok_or_else(|| RespValue::error(BAD_REQUEST))?;
    let name = String::from_utf8_lossy(&name).to_uppercase();

    let spec = registry::lookup(&name)
        .ok_or_else(|| RespValue::error(format!("ERR unknown command '{}'", name)))?;

    let args = parts[1..]
        .iter()
        .map(RespValue::as_bytes)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| RespValue::error(BAD_REQUEST))?;

    if !spec.arity.accepts(args.len()) {
        return Err(RespValue::error(format!(
            "ERR wrong number of arguments for '{}' command",
            spec.name
        )));
    }

    Ok((spec, args))
}
