//! Framed bidirectional byte transport.
//!
//! Two variants share the same message-in/message-out contract: standard
//! streams, and a named pipe / Unix domain socket for the `--pipe` host
//! flag. Both are expressed as a [`MessageReader`]/[`MessageWriter`] pair
//! rather than a single trait, because a reader is exclusively owned by the
//! dispatcher's read loop while a writer is shared and must serialize
//! concurrent writers itself.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Result, TransportError};

/// Implementation cap on a single message body.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

#[async_trait]
pub trait MessageReader: Send {
	/// Returns the next message body, or `Ok(None)` on clean stream close.
	async fn read_message(&mut self) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait MessageWriter: Send + Sync {
	async fn write_message(&self, body: &[u8]) -> Result<()>;
}

/// Reads `Content-Length`-framed message bodies from any buffered
/// async reader.
pub struct FramedReader<R> {
	reader: BufReader<R>,
	max_len: usize,
}

impl<R: AsyncRead + Unpin + Send> FramedReader<R> {
	pub fn new(inner: R) -> Self {
		Self { reader: BufReader::new(inner), max_len: DEFAULT_MAX_MESSAGE_LEN }
	}

	pub fn with_max_len(inner: R, max_len: usize) -> Self {
		Self { reader: BufReader::new(inner), max_len }
	}
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MessageReader for FramedReader<R> {
	async fn read_message(&mut self) -> Result<Option<Vec<u8>>> {
		let mut content_length: Option<usize> = None;
		let mut line = String::new();

		loop {
			line.clear();
			let bytes_read = self.reader.read_line(&mut line).await?;
			if bytes_read == 0 {
				return Ok(None);
			}
			let trimmed = line.trim_end_matches(['\r', '\n']);
			if trimmed.is_empty() {
				break;
			}

			let (name, value) = trimmed
				.split_once(':')
				.ok_or_else(|| TransportError::MalformedHeader(trimmed.to_string()))?;
			let name = name.trim().to_ascii_lowercase();
			let value = value.trim();

			match name.as_str() {
				"content-length" => {
					let len: usize = value
						.parse()
						.map_err(|_| TransportError::MalformedHeader(format!("non-numeric Content-Length: {value}")))?;
					content_length = Some(len);
				}
				"content-type" => {
					// Tolerated and ignored.
				}
				_ => {
					// Unknown headers are tolerated and ignored.
				}
			}
		}

		let len = content_length.ok_or_else(|| TransportError::MalformedHeader("missing Content-Length".into()))?;
		if len > self.max_len {
			return Err(TransportError::MessageTooLarge { len, cap: self.max_len });
		}

		let mut body = vec![0u8; len];
		tokio::io::AsyncReadExt::read_exact(&mut self.reader, &mut body).await?;
		Ok(Some(body))
	}
}

/// Writes `Content-Length`-framed message bodies to any async writer,
/// serializing concurrent writers behind an internal lock.
pub struct FramedWriter<W> {
	inner: AsyncMutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> FramedWriter<W> {
	pub fn new(inner: W) -> Self {
		Self { inner: AsyncMutex::new(inner) }
	}
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageWriter for FramedWriter<W> {
	async fn write_message(&self, body: &[u8]) -> Result<()> {
		let header = format!("Content-Length: {}\r\n\r\n", body.len());
		let mut writer = self.inner.lock().await;
		writer.write_all(header.as_bytes()).await?;
		writer.write_all(body).await?;
		writer.flush().await?;
		Ok(())
	}
}

/// The stdio transport's reader/writer pair. `start()` is a no-op for this
/// variant.
pub fn stdio() -> (FramedReader<tokio::io::Stdin>, FramedWriter<tokio::io::Stdout>) {
	(FramedReader::new(tokio::io::stdin()), FramedWriter::new(tokio::io::stdout()))
}

#[cfg(unix)]
pub mod pipe {
	use std::path::Path;

	use tokio::net::UnixListener;

	use super::*;

	/// Accepts a single connection on a Unix domain socket, announcing the
	/// socket path via `announce` before blocking for the peer to connect.
	pub async fn listen_once(
		path: &Path,
		announce: impl FnOnce(&str),
	) -> Result<(FramedReader<tokio::net::unix::OwnedReadHalf>, FramedWriter<tokio::net::unix::OwnedWriteHalf>)> {
		let _ = std::fs::remove_file(path);
		let listener = UnixListener::bind(path)?;
		announce(&path.display().to_string());
		let (stream, _addr) = listener.accept().await?;
		let (read_half, write_half) = stream.into_split();
		Ok((FramedReader::new(read_half), FramedWriter::new(write_half)))
	}
}

#[cfg(windows)]
pub mod pipe {
	use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};

	use super::*;

	/// Accepts a single connection on a Windows named pipe, announcing the
	/// pipe name via `announce` before blocking for the peer to connect.
	pub async fn listen_once(
		name: &str,
		announce: impl FnOnce(&str),
	) -> Result<(FramedReader<tokio::io::ReadHalf<NamedPipeServer>>, FramedWriter<tokio::io::WriteHalf<NamedPipeServer>>)>
	{
		let server = ServerOptions::new().first_pipe_instance(true).create(name)?;
		announce(name);
		server.connect().await?;
		let (read_half, write_half) = tokio::io::split(server);
		Ok((FramedReader::new(read_half), FramedWriter::new(write_half)))
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[tokio::test]
	async fn framing_round_trip_preserves_body() {
		let body = br#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
		let mut framed = Vec::new();
		framed.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
		framed.extend_from_slice(body);

		let mut reader = FramedReader::new(Cursor::new(framed));
		let read_back = reader.read_message().await.unwrap().unwrap();
		assert_eq!(read_back, body);
	}

	#[tokio::test]
	async fn unknown_header_is_tolerated() {
		let body = b"{}";
		let mut framed = Vec::new();
		framed.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
		framed.extend_from_slice(b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\n");
		framed.extend_from_slice(b"X-Unknown-Header: whatever\r\n\r\n");
		framed.extend_from_slice(body);

		let mut reader = FramedReader::new(Cursor::new(framed));
		let read_back = reader.read_message().await.unwrap().unwrap();
		assert_eq!(read_back, body);
	}

	#[tokio::test]
	async fn missing_content_length_is_malformed_header() {
		let framed = b"Content-Type: application/json\r\n\r\n{}".to_vec();
		let mut reader = FramedReader::new(Cursor::new(framed));
		let err = reader.read_message().await.unwrap_err();
		assert!(matches!(err, TransportError::MalformedHeader(_)));
	}

	#[tokio::test]
	async fn clean_close_yields_none() {
		let mut reader = FramedReader::new(Cursor::new(Vec::<u8>::new()));
		assert!(reader.read_message().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn oversized_message_is_rejected() {
		let framed = b"Content-Length: 100\r\n\r\n".to_vec();
		let mut reader = FramedReader::with_max_len(Cursor::new(framed), 10);
		let err = reader.read_message().await.unwrap_err();
		assert!(matches!(err, TransportError::MessageTooLarge { .. }));
	}

	#[tokio::test]
	async fn write_message_emits_correct_header() {
		let writer = FramedWriter::new(Cursor::new(Vec::new()));
		writer.write_message(b"{}").await.unwrap();
		let buffer = writer.inner.into_inner().into_inner();
		assert_eq!(buffer, b"Content-Length: 2\r\n\r\n{}");
	}
}
