//! List commands: RPUSH, LPUSH, LLEN, LSET, LRANGE.

use crate::protocol::RespValue;
use crate::storage::{StorageEngine, StorageError};

use bytes::Bytes;

const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";

fn parse_index(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// RPUSH key value [value ...]
pub fn rpush(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    let len = storage.rpush(args[0].clone(), args[1..].to_vec());
    RespValue::integer(len as i64)
}

/// LPUSH key value [value ...]
pub fn lpush(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    let len = storage.lpush(args[0].clone(), args[1..].to_vec());
    RespValue::integer(len as i64)
}

/// LLEN key
pub fn llen(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    RespValue::integer(storage.llen(&args[0]) as i64)
}

/// LSET key index value
pub fn lset(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    let Some(index) = parse_index(&args[1]) else {
        return RespValue::error(NOT_AN_INTEGER);
    };

    match storage.lset(&args[0], index, args[2].clone()) {
        Ok(()) => RespValue::ok(),
        Err(StorageError::NoSuchKey) => RespValue::error("ERR no such key"),
        Err(_) => RespValue::error("ERR index out of range"),
    }
}

/// LRANGE key start stop
pub fn lrange(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    let (Some(start), Some(stop)) = (parse_index(&args[1]), parse_index(&args[2])) else {
        return RespValue::error(NOT_AN_INTEGER);
    };

    let values = storage
        .lrange(&args[0], start, stop)
        .into_iter()
        .map(RespValue::bulk_string)
        .collect();
    RespValue::array(values)
}
