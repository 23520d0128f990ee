use thiserror::Error;

/// Document Store failures. Both are recoverable: the offending
/// notification is logged at warning and otherwise ignored, since LSP
/// sync notifications have no reply path.
#[derive(Debug, Error)]
pub enum DocumentError {
	#[error("document already open: {0}")]
	AlreadyOpen(String),
	#[error("document not open: {0}")]
	NotOpen(String),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// An AnalysisProvider call failed. Recoverable: the feature handler that
/// receives this reports it to the client via `window/logMessage` and
/// falls back to the empty/null result for that LSP method.
#[derive(Debug, Error)]
#[error("analysis provider failed: {0}")]
pub struct ProviderError(pub String);

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
