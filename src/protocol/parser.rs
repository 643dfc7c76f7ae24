use bytes::{Buf, Bytes, BytesMut};

use super::types::RespValue;
use crate::error::{Error, Result};

/// Largest bulk string accepted, as Redis `proto-max-bulk-len`
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest array accepted
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;

/// Nesting limit for arrays
const MAX_DEPTH: usize = 32;

/// Upper bound on preallocated array slots
const PREALLOC_LIMIT: usize = 1024;

/// Streaming RESP2 reply parser
pub struct Parser;

impl Parser {
    /// Parse a complete RESP value from buffer.
    /// Returns None if buffer doesn't contain a complete message.
    /// Advances buffer past the parsed data.
    #[inline]
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match Self::parse_value(buf, 0)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse value, returning (value, bytes_consumed) or None if incomplete
    fn parse_value(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        match buf[0] {
            b'+' => Self::parse_line(buf, RespValue::SimpleString),
            b'-' => Self::parse_line(buf, RespValue::Error),
            b':' => Self::parse_integer(buf),
            b'$' => Self::parse_bulk_string(buf),
            b'*' => Self::parse_array(buf, depth),
            other => Err(Error::Protocol(format!(
                "unexpected type byte 0x{:02x}",
                other
            ))),
        }
    }

    #[inline]
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    fn parse_line(
        buf: &[u8],
        wrap: fn(Bytes) -> RespValue,
    ) -> Result<Option<(RespValue, usize)>> {
        match Self::find_crlf(buf) {
            Some(pos) => {
                let s = Bytes::copy_from_slice(&buf[1..pos]);
                Ok(Some((wrap(s), pos + 2)))
            }
            None => Ok(None),
        }
    }

    fn parse_length(buf: &[u8], what: &str) -> Result<Option<(i64, usize)>> {
        let crlf_pos = match Self::find_crlf(buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let len = std::str::from_utf8(&buf[1..crlf_pos])
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| Error::Protocol(format!("invalid {}", what)))?;

        Ok(Some((len, crlf_pos + 2)))
    }

    fn parse_integer(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        Ok(Self::parse_length(buf, "integer")?.map(|(n, consumed)| (RespValue::Integer(n), consumed)))
    }

    fn parse_bulk_string(buf: &[u8]) -> Result<Option<(RespValue, usize)>> {
        let (len, data_start) = match Self::parse_length(buf, "bulk length")? {
            Some(header) => header,
            None => return Ok(None),
        };

        if len == -1 {
            return Ok(Some((RespValue::Null, data_start)));
        }
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(Error::Protocol(format!("invalid bulk length {}", len)));
        }

        let data_end = data_start + len as usize;
        let total_len = data_end + 2; // +2 for trailing \r\n

        if buf.len() < total_len {
            return Ok(None);
        }
        if &buf[data_end..total_len] != b"\r\n" {
            return Err(Error::Protocol("bulk string not terminated by CRLF".into()));
        }

        let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
        Ok(Some((RespValue::BulkString(data), total_len)))
    }

    fn parse_array(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>> {
        let (len, mut offset) = match Self::parse_length(buf, "array length")? {
            Some(header) => header,
            None => return Ok(None),
        };

        if len == -1 {
            return Ok(Some((RespValue::Null, offset)));
        }
        if !(0..=MAX_ARRAY_LEN).contains(&len) {
            return Err(Error::Protocol(format!("invalid array length {}", len)));
        }
        if depth >= MAX_DEPTH {
            return Err(Error::Protocol("arrays nested too deeply".into()));
        }

        let mut items = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
        for _ in 0..len {
            match Self::parse_value(&buf[offset..], depth + 1)? {
                Some((value, consumed)) => {
                    items.push(value);
                    offset += consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(items), offset)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pubsub_message() {
        let mut buf = BytesMut::from(
            "*3\r\n$7\r\nmessage\r\n$14\r\n+switch-master\r\n$8\r\nmymaster\r\n",
        );
        let value = Parser::parse(&mut buf).unwrap().unwrap();

        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::bulk_string("message"),
                RespValue::bulk_string("+switch-master"),
                RespValue::bulk_string("mymaster"),
            ])
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_incomplete_keeps_buffer() {
        let mut buf = BytesMut::from("*3\r\n$9\r\nsubscribe\r\n$14\r\n+switch");
        let before = buf.len();
        assert_eq!(Parser::parse(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn test_parse_two_frames_back_to_back() {
        let mut buf = BytesMut::from("+OK\r\n:3\r\n");
        assert_eq!(
            Parser::parse(&mut buf).unwrap(),
            Some(RespValue::simple_string("OK"))
        );
        assert_eq!(Parser::parse(&mut buf).unwrap(), Some(RespValue::Integer(3)));
        assert_eq!(Parser::parse(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_parse_error_and_null() {
        let mut buf = BytesMut::from("-ERR unknown command\r\n$-1\r\n*-1\r\n");
        assert_eq!(
            Parser::parse(&mut buf).unwrap(),
            Some(RespValue::error("ERR unknown command"))
        );
        assert_eq!(Parser::parse(&mut buf).unwrap(), Some(RespValue::Null));
        assert_eq!(Parser::parse(&mut buf).unwrap(), Some(RespValue::Null));
    }

    #[test]
    fn test_parse_rejects_oversized_lengths() {
        for frame in [
            "*9223372036854775807\r\n",
            "*4294967296\r\n",
            "*-2\r\n",
            "$9223372036854775807\r\n",
            "$536870913\r\n",
        ] {
            let mut buf = BytesMut::from(frame);
            assert!(
                matches!(Parser::parse(&mut buf), Err(Error::Protocol(_))),
                "frame {:?} should be rejected",
                frame
            );
        }
    }

    #[test]
    fn test_parse_large_array_header_waits_for_items() {
        let mut buf = BytesMut::from("*1000000\r\n$4\r\nping\r\n");
        assert_eq!(Parser::parse(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let mut buf = BytesMut::from("*1\r\n".repeat(100).as_str());
        assert!(matches!(Parser::parse(&mut buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_parse_line_with_bare_cr() {
        let mut buf = BytesMut::from("-ERR bad\rvalue\r\n+OK\r\n");
        assert_eq!(
            Parser::parse(&mut buf).unwrap(),
            Some(RespValue::error("ERR bad\rvalue"))
        );
        assert_eq!(
            Parser::parse(&mut buf).unwrap(),
            Some(RespValue::simple_string("OK"))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let mut buf = BytesMut::from("hello\r\n");
        assert!(matches!(Parser::parse(&mut buf), Err(Error::Protocol(_))));
    }
}
