//! Incremental RESP Parser
//!
//! The parser works on a borrowed buffer and never blocks. It returns:
//! - `Ok(Some((value, consumed)))` - one complete frame, occupying `consumed` bytes
//! - `Ok(None)` - the buffer holds only a prefix of a frame; read more and retry
//! - `Err(ParseError)` - the bytes can never become a valid frame
//!
//! The same parser serves both live connections (which read more from the
//! socket on `Ok(None)`) and log replay (which treats `Ok(None)` at the end of
//! the file as a torn final record).
//!
//! Bulk string payloads are located by their length prefix, never by scanning
//! for CRLF, so a payload may itself contain `\r\n`.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Length or integer field is not a base-10 i64
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Simple string or error text is not UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (other than the -1 null sentinel)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array count is negative
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Framing violation (missing CRLF after a payload, nesting too deep)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A single bulk string exceeds the configured maximum
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// RESP frame decoder.
///
/// # Example
///
/// ```
/// use ledgerkv::protocol::{RespParser, RespValue};
///
/// let mut parser = RespParser::new();
/// let buf = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
/// let (value, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(value, RespValue::command(["GET", "foo"]));
/// assert_eq!(consumed, buf.len());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RespParser {
    max_bulk_size: usize,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    pub fn new() -> Self {
        Self {
            max_bulk_size: MAX_BULK_SIZE,
        }
    }

    /// Overrides the largest bulk string the parser accepts.
    pub fn with_max_bulk_size(max_bulk_size: usize) -> Self {
        Self { max_bulk_size }
    }

    /// Attempts to parse one frame from the start of `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.parse_value(buf, 0)
    }

    fn parse_value(&self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        let Some(&tag) = buf.first() else {
            return Ok(None);
        };

        match tag {
            prefix::SIMPLE_STRING => Ok(parse_text(buf)?
                .map(|(s, consumed)| (RespValue::SimpleString(s), consumed))),
            prefix::ERROR => {
                Ok(parse_text(buf)?.map(|(s, consumed)| (RespValue::Error(s), consumed)))
            }
            prefix::INTEGER => {
                Ok(parse_number(buf)?.map(|(n, consumed)| (RespValue::Integer(n), consumed)))
            }
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf, depth),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// `$<length>\r\n<data>\r\n`, or `$-1\r\n` for null
    fn parse_bulk_string(&self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let Some((length, header_len)) = parse_number(buf)? else {
            return Ok(None);
        };

        if length == -1 {
            return Ok(Some((RespValue::Null, header_len)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > self.max_bulk_size {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: self.max_bulk_size,
            });
        }

        let total = header_len + length + CRLF.len();
        if buf.len() < total {
            return Ok(None);
        }

        if &buf[header_len + length..total] != CRLF {
            return Err(ParseError::Protocol(format!(
                "bulk string of declared length {} is not followed by CRLF",
                length
            )));
        }

        let data = Bytes::copy_from_slice(&buf[header_len..header_len + length]);
        Ok(Some((RespValue::BulkString(data), total)))
    }

    /// `*<count>\r\n<elements...>`
    fn parse_array(&self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::Protocol(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        let Some((count, mut consumed)) = parse_number(buf)? else {
            return Ok(None);
        };
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        // Cap the preallocation; a hostile count must not reserve gigabytes.
        let mut elements = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            match self.parse_value(&buf[consumed..], depth + 1)? {
                Some((value, used)) => {
                    elements.push(value);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(elements), consumed)))
    }
}

/// Parses the line after the tag byte as UTF-8 text.
fn parse_text(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    let Some(end) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let s = std::str::from_utf8(&buf[1..1 + end])
        .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    Ok(Some((s.to_string(), 1 + end + CRLF.len())))
}

/// Parses the line after the tag byte as a signed integer.
fn parse_number(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    let Some(end) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let line = &buf[1..1 + end];
    let n = std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(line).into_owned()))?;
    Ok(Some((n, 1 + end + CRLF.len())))
}

/// Returns the offset of the first `\r\n` in `buf`.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Parses a single frame with default limits.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_string() {
        let (value, consumed) = parse_message(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_error() {
        let input = b"-ERR unknown command 'FOO'\r\n";
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(value, RespValue::Error("ERR unknown command 'FOO'".to_string()));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_integer() {
        let (value, _) = parse_message(b":-42\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(-42));
    }

    #[test]
    fn test_parse_bulk_and_null() {
        let (value, consumed) = parse_message(b"$5\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from("hello")));
        assert_eq!(consumed, 11);

        let (value, consumed) = parse_message(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Null);
        assert_eq!(consumed, 5);

        let (value, _) = parse_message(b"$0\r\n\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::new()));
    }

    #[test]
    fn test_bulk_payload_may_contain_crlf() {
        let input = b"$6\r\na\r\nb\r\n\r\n";
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from_static(b"a\r\nb\r\n")));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let (value, _) = parse_message(b"$5\r\nhel\x00o\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(Bytes::from(&b"hel\x00o"[..])));
    }

    #[test]
    fn test_incomplete_frames_need_more_data() {
        for input in [
            &b""[..],
            b"+OK",
            b"$5\r\nhel",
            b"$5\r\nhello",
            b"$5\r\nhello\r",
            b"*2\r\n$3\r\nGET\r\n",
            b"*2\r\n$3\r\nGET\r\n$3\r\nfo",
            b":12",
        ] {
            assert_eq!(parse_message(input), Ok(None), "input {:?}", input);
        }
    }

    #[test]
    fn test_consumes_exactly_one_frame() {
        let input = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let (_, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(consumed, 14);
    }

    #[test]
    fn test_parse_nested_array() {
        let input = b"*2\r\n:1\r\n*2\r\n$-1\r\n+x\r\n";
        let (value, _) = parse_message(input).unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::Integer(1),
                RespValue::Array(vec![RespValue::Null, RespValue::SimpleString("x".into())]),
            ])
        );
    }

    #[test]
    fn test_unknown_prefix_is_rejected() {
        assert_eq!(
            parse_message(b"@invalid\r\n"),
            Err(ParseError::UnknownPrefix(b'@'))
        );
        // Inline commands are not part of the accepted grammar.
        assert_eq!(
            parse_message(b"PING\r\n"),
            Err(ParseError::UnknownPrefix(b'P'))
        );
    }

    #[test]
    fn test_negative_lengths_are_rejected() {
        assert_eq!(
            parse_message(b"$-2\r\n"),
            Err(ParseError::InvalidBulkLength(-2))
        );
        assert_eq!(
            parse_message(b"*-1\r\n"),
            Err(ParseError::InvalidArrayLength(-1))
        );
    }

    #[test]
    fn test_length_inconsistent_with_terminator() {
        let result = parse_message(b"$3\r\nhello\r\n");
        assert!(matches!(result, Err(ParseError::Protocol(_))));
    }

    #[test]
    fn test_parse_invalid_integer() {
        assert!(matches!(
            parse_message(b":not_a_number\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
        assert!(matches!(
            parse_message(b"$abc\r\n"),
            Err(ParseError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_bulk_size_limit() {
        let mut parser = RespParser::with_max_bulk_size(4);
        assert_eq!(
            parser.parse(b"$5\r\nhello\r\n"),
            Err(ParseError::MessageTooLarge { size: 5, max: 4 })
        );
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = Vec::new();
        for _ in 0..=MAX_NESTING_DEPTH {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");
        assert!(matches!(
            parse_message(&input),
            Err(ParseError::Protocol(_))
        ));
    }

    #[test]
    fn test_roundtrip() {
        let values = [
            RespValue::command(["SET", "key", "value"]),
            RespValue::simple_string("OK"),
            RespValue::error("ERR index out of range"),
            RespValue::integer(i64::MIN),
            RespValue::bulk_string(Bytes::from_static(b"\x00\r\n\xff")),
            RespValue::bulk_string(Bytes::new()),
            RespValue::null(),
            RespValue::array(vec![]),
            RespValue::array(vec![
                RespValue::integer(7),
                RespValue::array(vec![RespValue::null(), RespValue::simple_string("x")]),
            ]),
        ];

        for original in values {
            let serialized = original.serialize();
            let (parsed, consumed) = parse_message(&serialized).unwrap().unwrap();
            assert_eq!(parsed, original);
            assert_eq!(consumed, serialized.len());
        }
    }
}
