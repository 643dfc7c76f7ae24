use std::collections::HashMap;

use bytes::Bytes;

/// RESP2 values as seen from the client side of a connection
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string: +OK\r\n
    SimpleString(Bytes),
    /// Error: -ERR message\r\n
    Error(Bytes),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $5\r\nhello\r\n
    BulkString(Bytes),
    /// Null bulk string or null array: $-1\r\n / *-1\r\n
    Null,
    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<RespValue>),
}

impl RespValue {
    #[inline]
    pub fn bulk_string(s: &str) -> Self {
        Self::BulkString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[inline]
    pub fn simple_string(s: &str) -> Self {
        Self::SimpleString(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[inline]
    pub fn error(msg: &str) -> Self {
        Self::Error(Bytes::copy_from_slice(msg.as_bytes()))
    }

    #[inline]
    pub fn array(items: Vec<RespValue>) -> Self {
        Self::Array(items)
    }

    /// Serialize to RESP2 wire format
    pub fn serialize(&self) -> Bytes {
        let mut buf = Vec::with_capacity(64);
        self.write_to(&mut buf);
        Bytes::from(buf)
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Error(e) => {
                buf.push(b'-');
                buf.extend_from_slice(e);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Integer(n) => {
                buf.push(b':');
                buf.extend_from_slice(itoa::Buffer::new().format(*n).as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::BulkString(s) => {
                buf.push(b'$');
                buf.extend_from_slice(itoa::Buffer::new().format(s.len()).as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(s);
                buf.extend_from_slice(b"\r\n");
            }
            RespValue::Null => buf.extend_from_slice(b"$-1\r\n"),
            RespValue::Array(items) => {
                buf.push(b'*');
                buf.extend_from_slice(itoa::Buffer::new().format(items.len()).as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
        }
    }

    /// String value of a simple or bulk string reply
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::BulkString(b) | RespValue::SimpleString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Error message carried by an error reply
    #[inline]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            RespValue::Error(e) => std::str::from_utf8(e).ok(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            RespValue::BulkString(b) | RespValue::SimpleString(b) => {
                std::str::from_utf8(b).ok()?.parse().ok()
            }
            _ => None,
        }
    }

    /// Sub-replies of an array reply; empty for anything else
    pub fn elems(&self) -> &[RespValue] {
        match self {
            RespValue::Array(items) => items,
            _ => &[],
        }
    }

    /// Array of strings, e.g. a `SENTINEL GET-MASTER-ADDR-BY-NAME` reply
    pub fn to_list(&self) -> Option<Vec<String>> {
        match self {
            RespValue::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// Flat `[field, value, field, value, ...]` array as a map
    pub fn to_hash(&self) -> Option<HashMap<String, String>> {
        let items = match self {
            RespValue::Array(items) if items.len() % 2 == 0 => items,
            _ => return None,
        };

        let mut map = HashMap::with_capacity(items.len() / 2);
        for pair in items.chunks(2) {
            map.insert(pair[0].as_str()?.to_string(), pair[1].as_str()?.to_string());
        }
        Some(map)
    }

    /// Turn an error reply into `Err`, pass everything else through
    pub fn into_result(self) -> crate::Result<RespValue> {
        match self {
            RespValue::Error(e) => Err(crate::Error::Reply(String::from_utf8_lossy(&e).into_owned())),
            other => Ok(other),
        }
    }
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(parts: &[&str]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.push(b'*');
    buf.extend_from_slice(itoa::Buffer::new().format(parts.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");

    for part in parts {
        buf.push(b'$');
        buf.extend_from_slice(itoa::Buffer::new().format(part.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(part.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let buf = encode_command(&["SUBSCRIBE", "+switch-master"]);
        assert_eq!(buf, b"*2\r\n$9\r\nSUBSCRIBE\r\n$14\r\n+switch-master\r\n");
    }

    #[test]
    fn test_null_serializes_as_null_bulk() {
        assert_eq!(&RespValue::Null.serialize()[..], b"$-1\r\n");
    }

    #[test]
    fn test_to_hash_flat_array() {
        let reply = RespValue::array(vec![
            RespValue::bulk_string("name"),
            RespValue::bulk_string("mymaster"),
            RespValue::bulk_string("port"),
            RespValue::bulk_string("6379"),
        ]);
        let map = reply.to_hash().unwrap();
        assert_eq!(map["name"], "mymaster");
        assert_eq!(map["port"], "6379");

        let odd = RespValue::array(vec![RespValue::bulk_string("name")]);
        assert!(odd.to_hash().is_none());
    }

    #[test]
    fn test_to_list_rejects_nested_values() {
        let reply = RespValue::array(vec![
            RespValue::bulk_string("10.0.0.1"),
            RespValue::bulk_string("6380"),
        ]);
        assert_eq!(
            reply.to_list().unwrap(),
            vec!["10.0.0.1".to_string(), "6380".to_string()]
        );

        let nested = RespValue::array(vec![RespValue::array(vec![])]);
        assert!(nested.to_list().is_none());
    }

    #[test]
    fn test_error_reply_into_result() {
        let err = RespValue::error("NOAUTH Authentication required.")
            .into_result()
            .unwrap_err();
        assert_eq!(err.to_string(), "NOAUTH Authentication required.");
        assert!(RespValue::simple_string("OK").into_result().is_ok());
    }
}
