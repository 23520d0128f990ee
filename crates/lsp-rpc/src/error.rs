use thiserror::Error;

/// Transport-level failures. These are fatal: the caller must terminate the
/// process, unlike codec/handler errors which stay recoverable.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("malformed header: {0}")]
	MalformedHeader(String),
	#[error("message length {len} exceeds cap of {cap} bytes")]
	MessageTooLarge { len: usize, cap: usize },
	#[error("message body was not valid UTF-8: {0}")]
	InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
