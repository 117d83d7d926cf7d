//! Scalar commands: GET, SET, EXISTS, DEL, APPEND, INCR, COPY.

use crate::protocol::RespValue;
use crate::storage::{StorageEngine, StorageError};

use bytes::Bytes;

/// GET key
pub fn get(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    match storage.get(&args[0]) {
        Some(value) => RespValue::bulk_string(value),
        None => RespValue::null(),
    }
}

/// SET key value
pub fn set(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    storage.set(args[0].clone(), args[1].clone());
    RespValue::ok()
}

/// EXISTS key [key ...]
pub fn exists(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    RespValue::integer(storage.exists_many(args) as i64)
}

/// DEL key [key ...]
pub fn del(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    RespValue::integer(storage.delete_many(args) as i64)
}

/// APPEND key value
pub fn append(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    RespValue::integer(storage.append(&args[0], &args[1]) as i64)
}

/// INCR key
pub fn incr(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    match storage.incr(&args[0]) {
        Ok(n) => RespValue::integer(n),
        Err(StorageError::Overflow) => {
            RespValue::error("ERR increment or decrement would overflow")
        }
        Err(_) => RespValue::error("ERR wrong type of argument for 'INCR' command"),
    }
}

/// COPY source destination
pub fn copy(storage: &StorageEngine, args: &[Bytes]) -> RespValue {
    let copied = storage.copy(&args[0], args[1].clone());
    RespValue::integer(copied as i64)
}
