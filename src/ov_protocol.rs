//! Textual request framing.
//!
//! A request is one UTF-8 message `COMMAND:filename`, written fully before the
//! sender reads anything. The response carries no header: it is the raw file
//! content, or nothing at all, and the responder closing the stream marks its
//! end. One request per connection, one connection per request; `fetch` is
//! the client side of that exchange.
//!
//! Commands:
//! - `REQUEST` - plain lookup, carries no hop information.
//! - `RELAY/<n>` - relayed lookup with `n` forwards left. Only emitted by
//!   RandomWalk peers running with a hop limit.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::ov_error::{ProtocolError, QueryError};
use crate::ov_interface::{Address, FileName, READ_CHUNK_SIZE, RELAY_COMMAND, REQUEST_COMMAND};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Request,
    Relay { remaining: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub filename: FileName,
}

impl Request {
    /// Plain `REQUEST:<filename>`
    pub fn new(filename: impl Into<FileName>) -> Result<Self, ProtocolError> {
        Self::with_command(Command::Request, filename.into())
    }

    /// Hop-bounded `RELAY/<remaining>:<filename>`
    pub fn relay(filename: impl Into<FileName>, remaining: u32) -> Result<Self, ProtocolError> {
        Self::with_command(Command::Relay { remaining }, filename.into())
    }

    fn with_command(command: Command, filename: FileName) -> Result<Self, ProtocolError> {
        validate_filename(&filename)?;
        Ok(Self { command, filename })
    }

    /// Hops left for a relayed request, `None` when the walk is unbounded
    pub fn remaining_hops(&self) -> Option<u32> {
        match self.command {
            Command::Request => None,
            Command::Relay { remaining } => Some(remaining),
        }
    }

    pub fn encode(&self) -> String {
        match self.command {
            Command::Request => format!("{}:{}", REQUEST_COMMAND, self.filename),
            Command::Relay { remaining } => {
                format!("{}/{}:{}", RELAY_COMMAND, remaining, self.filename)
            }
        }
    }

    /// Parse one request message. The message must split on `:` into exactly
    /// a command and a filename.
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;

        let parts: Vec<&str> = text.split(':').collect();
        let (command, filename) = match parts.as_slice() {
            [command, filename] => (*command, *filename),
            _ => return Err(ProtocolError::Malformed(text.to_string())),
        };

        let command = if command == REQUEST_COMMAND {
            Command::Request
        } else if let Some(hops) = command
            .strip_prefix(RELAY_COMMAND)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            let remaining = hops
                .parse::<u32>()
                .map_err(|_| ProtocolError::InvalidHopCount(hops.to_string()))?;
            Command::Relay { remaining }
        } else {
            return Err(ProtocolError::UnknownCommand(command.to_string()));
        };

        Self::with_command(command, filename.to_string())
    }
}

pub fn validate_filename(filename: &str) -> Result<(), ProtocolError> {
    if filename.is_empty() || filename.contains(':') {
        return Err(ProtocolError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Write the whole request message
pub async fn send_request<W>(writer: &mut W, request: &Request) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(request.encode().as_bytes()).await?;
    writer.flush().await
}

/// Single bounded read of the request message. Returns the raw bytes so the
/// caller decides how to treat parse errors.
pub async fn read_request_bytes<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let n = reader.read(&mut buf).await?;
    buf.truncate(n);
    Ok(buf)
}

/// Collect the response until the other side closes the stream
pub async fn read_response<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut response = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..n]);
    }
    Ok(response)
}

/// One request on a fresh connection, read until the peer closes.
/// `io_timeout` bounds the whole exchange; `None` waits forever.
pub async fn fetch(
    address: &Address,
    request: &Request,
    io_timeout: Option<Duration>,
) -> Result<Vec<u8>, QueryError> {
    with_timeout(io_timeout, async {
        let mut stream = TcpStream::connect(address.connect_string()).await?;
        send_request(&mut stream, request).await?;
        read_response(&mut stream).await
    })
    .await
}

async fn with_timeout<T, F>(io_timeout: Option<Duration>, future: F) -> Result<T, QueryError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match io_timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| QueryError::Timeout)?
            .map_err(QueryError::from),
        None => future.await.map_err(QueryError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_request() {
        let request = Request::parse(b"REQUEST:file1.txt").unwrap();
        assert_eq!(request.command, Command::Request);
        assert_eq!(request.filename, "file1.txt");
        assert_eq!(request.remaining_hops(), None);
        assert_eq!(request.encode(), "REQUEST:file1.txt");
    }

    #[test]
    fn test_parse_relay() {
        let request = Request::parse(b"RELAY/3:file2.txt").unwrap();
        assert_eq!(request.command, Command::Relay { remaining: 3 });
        assert_eq!(request.filename, "file2.txt");
        assert_eq!(request.remaining_hops(), Some(3));
        assert_eq!(request.encode(), "RELAY/3:file2.txt");
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Request::parse(b""), Err(ProtocolError::Empty));
        assert!(matches!(
            Request::parse(b"REQUEST"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Request::parse(b"REQUEST:a:b"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Request::parse(b"FETCH:file1.txt"),
            Err(ProtocolError::UnknownCommand(_))
        ));
        assert!(matches!(
            Request::parse(b"RELAY/x:file1.txt"),
            Err(ProtocolError::InvalidHopCount(_))
        ));
        assert!(matches!(
            Request::parse(b"REQUEST:"),
            Err(ProtocolError::InvalidFilename(_))
        ));
        assert_eq!(Request::parse(&[0xff, 0xfe]), Err(ProtocolError::NotUtf8));
    }

    #[test]
    fn test_filename_with_colon_cannot_be_encoded() {
        assert!(matches!(
            Request::new("a:b.txt"),
            Err(ProtocolError::InvalidFilename(_))
        ));
    }

    #[tokio::test]
    async fn test_read_response_until_close() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            server.write_all(&payload).await.unwrap();
            // dropping the server half is the end-of-response signal
        });

        let response = read_response(&mut client).await.unwrap();
        writer.await.unwrap();
        assert_eq!(response, expected);
    }

    #[tokio::test]
    async fn test_send_then_read_request_bytes() {
        let (mut client, mut server) = tokio::io::duplex(READ_CHUNK_SIZE);
        let request = Request::new("file7.txt").unwrap();
        send_request(&mut client, &request).await.unwrap();

        let bytes = read_request_bytes(&mut server).await.unwrap();
        assert_eq!(Request::parse(&bytes).unwrap(), request);
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = Address::from(listener.local_addr().unwrap());
        // accept and hold the connection open without answering
        let holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let request = Request::new("file1.txt").unwrap();
        let result = fetch(&address, &request, Some(Duration::from_millis(100))).await;
        assert!(matches!(result, Err(QueryError::Timeout)));
        holder.abort();
    }
}
