//! RESP2 (REdis Serialization Protocol) values, encoder and async reader

use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Default maximum reply size: 64MB
pub const DEFAULT_MAX_REPLY_SIZE: usize = 64 * 1024 * 1024;

/// Upper bound on a single array header
const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// RESP data type
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string: +OK\r\n
    SimpleString(Bytes),
    /// Error: -ERR message\r\n
    Error(Bytes),
    /// Integer: :123\r\n
    Integer(i64),
    /// Bulk string: $5\r\nhello\r\n
    BulkString(Bytes),
    /// Array: *2\r\n...
    Array(Vec<RespValue>),
    /// Null bulk string or null array
    Null,
}

impl RespValue {
    /// Builds a command as an array of bulk strings.
    pub fn command(args: &[&str]) -> Self {
        RespValue::Array(
            args.iter()
                .map(|arg| RespValue::BulkString(Bytes::copy_from_slice(arg.as_bytes())))
                .collect(),
        )
    }

    pub fn bulk(text: impl Into<String>) -> Self {
        RespValue::BulkString(Bytes::from(text.into()))
    }

    pub fn simple(text: &str) -> Self {
        RespValue::SimpleString(Bytes::copy_from_slice(text.as_bytes()))
    }

    pub fn error(text: &str) -> Self {
        RespValue::Error(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Text of a simple or bulk string.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RespValue::SimpleString(b) | RespValue::BulkString(b) => {
                Some(String::from_utf8_lossy(b).into_owned())
            }
            _ => None,
        }
    }

    /// Integer value; bulk strings holding digits are accepted too.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            RespValue::BulkString(b) | RespValue::SimpleString(b) => {
                std::str::from_utf8(b).ok()?.trim().parse().ok()
            }
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Appends the wire form to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s);
                buf.put_slice(b"\r\n");
            }
            RespValue::Error(e) => {
                buf.put_u8(b'-');
                buf.put_slice(e);
                buf.put_slice(b"\r\n");
            }
            RespValue::Integer(i) => {
                buf.put_slice(format!(":{}\r\n", i).as_bytes());
            }
            RespValue::BulkString(bytes) => {
                buf.put_slice(format!("${}\r\n", bytes.len()).as_bytes());
                buf.put_slice(bytes);
                buf.put_slice(b"\r\n");
            }
            RespValue::Array(items) => {
                buf.put_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(buf);
                }
            }
            RespValue::Null => buf.put_slice(b"$-1\r\n"),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// RESP parsing error
#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid RESP format: {0}")]
    InvalidFormat(String),
    #[error("Connection closed")]
    UnexpectedEof,
    #[error("Reply too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),
    #[error("Invalid RESP type: {0}")]
    InvalidType(u8),
}

/// One header line decoded into either a finished value or an array start.
enum Frame {
    Value(RespValue),
    ArrayStart(usize),
}

/// Reads RESP values from an async stream.
///
/// Nested arrays are assembled with an explicit stack, so the reader never
/// recurses.
pub struct RespReader<R: AsyncRead + Unpin> {
    reader: BufReader<R>,
    max_bytes: usize,
    bytes_read: usize,
}

impl<R: AsyncRead + Unpin> RespReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_bytes(reader, DEFAULT_MAX_REPLY_SIZE)
    }

    pub fn with_max_bytes(reader: R, max_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_bytes,
            bytes_read: 0,
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    fn account(&mut self, additional: usize) -> Result<(), RespError> {
        self.bytes_read = self.bytes_read.saturating_add(additional);
        if self.bytes_read > self.max_bytes {
            Err(RespError::TooLarge(self.bytes_read, self.max_bytes))
        } else {
            Ok(())
        }
    }

    /// Reads the next complete value.
    pub async fn read_value(&mut self) -> Result<RespValue, RespError> {
        self.bytes_read = 0;
        let mut stack: Vec<(usize, Vec<RespValue>)> = Vec::new();

        loop {
            let mut completed = match self.read_frame().await? {
                Frame::Value(value) => value,
                Frame::ArrayStart(0) => RespValue::Array(Vec::new()),
                Frame::ArrayStart(len) => {
                    stack.push((len, Vec::with_capacity(len)));
                    continue;
                }
            };

            // Fold finished values into their parents.
            loop {
                let Some((expected, items)) = stack.last_mut() else {
                    return Ok(completed);
                };
                items.push(completed);
                if items.len() < *expected {
                    break;
                }
                let items = stack.pop().map(|(_, items)| items).unwrap_or_default();
                completed = RespValue::Array(items);
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, RespError> {
        let mut line = Vec::new();
        // One byte past the budget so an overlong line trips the size check.
        let budget = self.max_bytes.saturating_sub(self.bytes_read) + 1;
        let n = (&mut self.reader)
            .take(budget as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Err(RespError::UnexpectedEof);
        }
        self.account(n)?;

        if !line.ends_with(b"\r\n") {
            return Err(RespError::InvalidFormat("line not terminated by CRLF".to_string()));
        }
        line.truncate(line.len() - 2);
        if line.is_empty() {
            return Err(RespError::InvalidFormat("Empty line".to_string()));
        }
        Ok(line)
    }

    async fn read_frame(&mut self) -> Result<Frame, RespError> {
        let line = self.read_line().await?;
        let body = &line[1..];

        match line[0] {
            b'+' => Ok(Frame::Value(RespValue::SimpleString(Bytes::copy_from_slice(body)))),
            b'-' => Ok(Frame::Value(RespValue::Error(Bytes::copy_from_slice(body)))),
            b':' => Ok(Frame::Value(RespValue::Integer(parse_number(body)?))),
            b'$' => {
                let len = parse_number(body)?;
                if len == -1 {
                    return Ok(Frame::Value(RespValue::Null));
                }
                let len = usize::try_from(len).map_err(|_| {
                    RespError::InvalidFormat(format!("Invalid bulk string length: {}", len))
                })?;
                self.account(len + 2)?;

                let mut buffer = vec![0u8; len + 2];
                self.reader.read_exact(&mut buffer).await?;
                if !buffer.ends_with(b"\r\n") {
                    return Err(RespError::InvalidFormat(
                        "Expected \\r\\n after bulk string".to_string(),
                    ));
                }
                buffer.truncate(len);
                Ok(Frame::Value(RespValue::BulkString(Bytes::from(buffer))))
            }
            b'*' => {
                let len = parse_number(body)?;
                if len == -1 {
                    return Ok(Frame::Value(RespValue::Null));
                }
                let len = usize::try_from(len).map_err(|_| {
                    RespError::InvalidFormat(format!("Invalid array length: {}", len))
                })?;
                if len > MAX_ARRAY_LEN {
                    return Err(RespError::InvalidFormat(format!(
                        "Array too large: {} elements",
                        len
                    )));
                }
                Ok(Frame::ArrayStart(len))
            }
            other => Err(RespError::InvalidType(other)),
        }
    }
}

fn parse_number(body: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            RespError::InvalidFormat(format!("Invalid integer: {}", String::from_utf8_lossy(body)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_parse_simple_string() {
        let reader = Builder::new().read(b"+PONG\r\n").build();
        let mut parser = RespReader::new(reader);
        assert_eq!(parser.read_value().await.unwrap(), RespValue::simple("PONG"));
    }

    #[tokio::test]
    async fn test_parse_bulk_split_across_reads() {
        let reader = Builder::new()
            .read(b"$12\r\ncluster")
            .read(b"_ok:1\r\n")
            .build();
        let mut parser = RespReader::new(reader);
        assert_eq!(parser.read_value().await.unwrap(), RespValue::bulk("cluster_ok:1"));
    }

    #[tokio::test]
    async fn test_parse_nested_array() {
        let data = b"*1\r\n*3\r\n:0\r\n:5460\r\n*3\r\n$8\r\n10.0.0.1\r\n:6379\r\n$2\r\nid\r\n";
        let reader = Builder::new().read(data).build();
        let mut parser = RespReader::new(reader);
        let value = parser.read_value().await.unwrap();

        let outer = value.as_array().unwrap();
        assert_eq!(outer.len(), 1);
        let entry = outer[0].as_array().unwrap();
        assert_eq!(entry[0], RespValue::Integer(0));
        assert_eq!(entry[1], RespValue::Integer(5460));
        let node = entry[2].as_array().unwrap();
        assert_eq!(node[0].as_text().unwrap(), "10.0.0.1");
        assert_eq!(node[1].as_integer(), Some(6379));
    }

    #[tokio::test]
    async fn test_parse_empty_and_null() {
        let reader = Builder::new().read(b"*0\r\n$-1\r\n").build();
        let mut parser = RespReader::new(reader);
        assert_eq!(parser.read_value().await.unwrap(), RespValue::Array(vec![]));
        assert_eq!(parser.read_value().await.unwrap(), RespValue::Null);
    }

    #[tokio::test]
    async fn test_error_reply() {
        let reader = Builder::new()
            .read(b"-ERR This instance has cluster support disabled\r\n")
            .build();
        let mut parser = RespReader::new(reader);
        assert_eq!(
            parser.read_value().await.unwrap(),
            RespValue::error("ERR This instance has cluster support disabled")
        );
    }

    #[tokio::test]
    async fn test_reply_too_large() {
        let reader = Builder::new().read(b"$9999\r\n").build();
        let mut parser = RespReader::with_max_bytes(reader, 1024);
        assert!(matches!(
            parser.read_value().await,
            Err(RespError::TooLarge(_, 1024))
        ));
    }

    #[tokio::test]
    async fn test_eof() {
        let reader = Builder::new().build();
        let mut parser = RespReader::new(reader);
        assert!(matches!(parser.read_value().await, Err(RespError::UnexpectedEof)));
    }

    #[test]
    fn test_encode_command() {
        let bytes = RespValue::command(&["CLUSTER", "SLOTS"]).to_bytes();
        assert_eq!(&bytes[..], b"*2\r\n$7\r\nCLUSTER\r\n$5\r\nSLOTS\r\n");
    }

    #[tokio::test]
    async fn test_unterminated_line_stops_at_limit() {
        let (mut tx, rx) = tokio::io::duplex(4096);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            tx.write_all(b"+").await?;
            tx.write_all(&vec![b'a'; 8 * 1024 * 1024]).await
        });

        let mut parser = RespReader::with_max_bytes(rx, 1024);
        match parser.read_value().await {
            Err(RespError::TooLarge(read, 1024)) => assert!(read <= 1025, "read {} bytes", read),
            other => panic!("expected TooLarge, got {:?}", other),
        }

        // The writer never gets the whole line through.
        drop(parser);
        assert!(writer.await.unwrap().is_err());
    }
}
