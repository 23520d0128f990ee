use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request id. Preserves whichever shape the peer used — an
/// integer stays an integer, a string stays a string — on the way back out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
	Number(i64),
	String(String),
	/// Only ever used on the *outbound* side, for a response to a request
	/// so malformed its id couldn't be recovered.
	Null,
}

impl std::fmt::Display for Id {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Id::Number(n) => write!(f, "{n}"),
			Id::String(s) => write!(f, "{s}"),
			Id::Null => f.write_str("null"),
		}
	}
}

fn is_v2(v: &str) -> bool {
	v == "2.0"
}

fn default_version() -> String {
	"2.0".to_string()
}

/// A decoded request: has an `id` and a `method`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	#[serde(default = "default_version", skip_serializing_if = "is_v2")]
	pub jsonrpc: String,
	pub id: Id,
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
}

/// A decoded notification: has a `method`, no `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
	#[serde(default = "default_version", skip_serializing_if = "is_v2")]
	pub jsonrpc: String,
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
}

/// A decoded response: has an `id` and exactly one of `result`/`error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	#[serde(default = "default_version", skip_serializing_if = "is_v2")]
	pub jsonrpc: String,
	pub id: Id,
	#[serde(flatten)]
	pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
	Success {
		result: Value,
	},
	Failure {
		error: ResponseError,
	},
}

impl Response {
	pub fn success(id: Id, result: Value) -> Self {
		Self { jsonrpc: default_version(), id, outcome: Outcome::Success { result } }
	}

	pub fn failure(id: Id, error: ResponseError) -> Self {
		Self { jsonrpc: default_version(), id, outcome: Outcome::Failure { error } }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Well-known JSON-RPC / LSP error codes used by this core.
pub mod error_code {
	pub const PARSE_ERROR: i64 = -32700;
	pub const INVALID_REQUEST: i64 = -32600;
	pub const METHOD_NOT_FOUND: i64 = -32601;
	pub const INVALID_PARAMS: i64 = -32602;
	pub const INTERNAL_ERROR: i64 = -32603;
	pub const SERVER_NOT_INITIALIZED: i64 = -32002;
	pub const REQUEST_CANCELLED: i64 = -32800;
	pub const CONTENT_MODIFIED: i64 = -32801;
}

impl ResponseError {
	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), data: None }
	}

	pub fn parse_error(message: impl Into<String>) -> Self {
		Self::new(error_code::PARSE_ERROR, message)
	}

	pub fn method_not_found(method: &str) -> Self {
		Self::new(error_code::METHOD_NOT_FOUND, format!("method not found: {method}"))
	}

	pub fn invalid_params(message: impl Into<String>) -> Self {
		Self::new(error_code::INVALID_PARAMS, message)
	}

	pub fn internal_error(message: impl Into<String>) -> Self {
		Self::new(error_code::INTERNAL_ERROR, message)
	}

	pub fn request_cancelled() -> Self {
		Self::new(error_code::REQUEST_CANCELLED, "request cancelled")
	}

	pub fn server_not_initialized() -> Self {
		Self::new(error_code::SERVER_NOT_INITIALIZED, "server not initialized")
	}

	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::new(error_code::INVALID_REQUEST, message)
	}
}

/// Any inbound message, as distinguished by presence of `id`/`method`.
#[derive(Debug, Clone)]
pub enum Incoming {
	Request(Request),
	Notification(Notification),
	Response(Response),
}

/// Parses a raw JSON body into one of the three JSON-RPC shapes.
///
/// A null `id` on an inbound request is a `ParseError`; everything else
/// that fails to match any shape is also a `ParseError`.
pub fn decode(body: &[u8]) -> Result<Incoming, ResponseError> {
	let value: Value =
		serde_json::from_slice(body).map_err(|e| ResponseError::parse_error(format!("invalid JSON: {e}")))?;

	let has_id = value.get("id").is_some_and(|v| !v.is_null());
	let has_method = value.get("method").is_some();
	let has_result_or_error = value.get("result").is_some() || value.get("error").is_some();

	if value.get("id").is_some_and(|v| v.is_null()) && has_method {
		return Err(ResponseError::parse_error("request id must not be null"));
	}

	if has_method && has_id {
		let request: Request =
			serde_json::from_value(value).map_err(|e| ResponseError::parse_error(format!("malformed request: {e}")))?;
		Ok(Incoming::Request(request))
	} else if has_method {
		let notification: Notification = serde_json::from_value(value)
			.map_err(|e| ResponseError::parse_error(format!("malformed notification: {e}")))?;
		Ok(Incoming::Notification(notification))
	} else if has_result_or_error {
		let response: Response =
			serde_json::from_value(value).map_err(|e| ResponseError::parse_error(format!("malformed response: {e}")))?;
		Ok(Incoming::Response(response))
	} else {
		Err(ResponseError::parse_error("message has neither method nor result/error"))
	}
}
