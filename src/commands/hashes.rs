//! Hash commands: HSET, HGET, HGETALL, HDEL.

use crate::protocol::RespValue;
use crate::storage::StorageEngine;

use bytes::Bytes;

/// HSET key field value
///
/// Replies `+OK` whether or not the field already existed.
pub fn hset(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    storage.hset(args[0].clone(), args[1].clone(), args[2].clone());
    RespValue::ok()
}

/// HGET key field
pub fn hget(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    match storage.hget(&args[0], &args[1]) {
        Some(value) => RespValue::bulk_string(value),
        None => RespValue::null(),
    }
}

/// HGETALL key
///
/// Flat `[field, value, field, value, ...]`; null when the hash doesn't exist.
pub fn hgetall(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    let Some(pairs) = storage.hgetall(&args[0]) else {
        return RespValue::null();
    };

    let flat = pairs
        .into_iter()
        .flat_map(|(field, value)| [RespValue::bulk_string(field), RespValue::bulk_string(value)])
        .collect();
    RespValue::array(flat)
}

/// HDEL key field [field ...]
pub fn hdel(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    RespValue::integer(storage.hdel(&args[0], &args[1..]) as i64)
}
