//! Runtime configuration carried in `initializationOptions` and
//! `workspace/didChangeConfiguration`.

use lsp_types::DiagnosticSeverity;
use serde::Deserialize;

fn default_debounce_ms() -> u64 {
	300
}

fn default_minimum_severity() -> DiagnosticSeverity {
	DiagnosticSeverity::WARNING
}

fn default_true() -> bool {
	true
}

/// Deserialized permissively: every field defaults, so a peer that sends
/// `{}` (or omits `initializationOptions` entirely) gets sensible
/// defaults: a 300ms debounce delay and a Warning minimum severity, both
/// configurable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub debounce_ms: u64,
	#[serde(with = "severity_serde")]
	pub minimum_severity: DiagnosticSeverity,
	pub diagnostics_enabled: bool,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			debounce_ms: default_debounce_ms(),
			minimum_severity: default_minimum_severity(),
			diagnostics_enabled: default_true(),
		}
	}
}

/// `DiagnosticSeverity` serializes as its wire integer by default; accept
/// that here too so configuration payloads can use the same numbers LSP
/// diagnostics use (1=Error .. 4=Hint), with a named-string escape hatch
/// for readability in hand-written `initializationOptions`.
mod severity_serde {
	use lsp_types::DiagnosticSeverity;
	use serde::{Deserialize, Deserializer};
	use serde_json::Value;

	pub fn deserialize<'de, D>(deserializer: D) -> Result<DiagnosticSeverity, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		if let Value::String(s) = &value {
			return Ok(match s.to_ascii_lowercase().as_str() {
				"error" => DiagnosticSeverity::ERROR,
				"information" | "info" => DiagnosticSeverity::INFORMATION,
				"hint" => DiagnosticSeverity::HINT,
				_ => DiagnosticSeverity::WARNING,
			});
		}
		// Falls through to DiagnosticSeverity's own numeric Deserialize impl
		// (LSP's 1=Error .. 4=Hint wire encoding).
		serde_json::from_value(value).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_yields_defaults() {
		let config: ServerConfig = serde_json::from_value(serde_json::json!({})).unwrap();
		assert_eq!(config.debounce_ms, 300);
		assert_eq!(config.minimum_severity, DiagnosticSeverity::WARNING);
		assert!(config.diagnostics_enabled);
	}

	#[test]
	fn named_severity_string_is_accepted() {
		let config: ServerConfig =
			serde_json::from_value(serde_json::json!({"minimum_severity": "error", "debounce_ms": 50})).unwrap();
		assert_eq!(config.debounce_ms, 50);
		assert_eq!(config.minimum_severity, DiagnosticSeverity::ERROR);
	}
}
