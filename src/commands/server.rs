//! Connection-level commands.

use crate::protocol::RespValue;
use crate::storage::StorageEngine;

use bytes::Bytes;

/// PING [message]
pub fn ping(_storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    match args.first() {
        Some(message) => RespValue::bulk_string(message.clone()),
        None => RespValue::pong(),
    }
}
