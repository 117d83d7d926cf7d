//! RESP Protocol Implementation
//!
//! This module provides the wire codec shared by client connections and the
//! append-only log.
//!
//! - `types`: the `RespValue` enum and its serialization (encode)
//! - `parser`: incremental frame parser (decode)
//!
//! ## Example
//!
//! ```
//! use ledgerkv::protocol::{parse_message, RespValue};
//! use bytes::Bytes;
//!
//! let data = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
//! let (value, consumed) = parse_message(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//! assert_eq!(value, RespValue::command(["GET", "foo"]));
//!
//! let reply = RespValue::bulk_string(Bytes::from("bar"));
//! assert_eq!(reply.serialize(), b"$3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
