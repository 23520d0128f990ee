//! Versioned in-memory text buffers keyed by URI.

use std::collections::HashMap;
use std::sync::Arc;

use lsp_text::{SourceText, TextEdit};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::{DocumentError, Result};

/// `(uri, version, text)`, handed to analysis. Cheap to clone: `SourceText`
/// clones in O(1) and `uri` is an `Arc<str>`.
#[derive(Debug, Clone)]
pub struct DocumentChanged {
	pub uri: Arc<str>,
	pub version: i32,
	pub text: SourceText,
}

struct OpenDocument {
	language_id: String,
	version: i32,
	text: SourceText,
}

/// Capacity of the `DocumentChanged` broadcast channel. The Diagnostics
/// Engine is the only required subscriber; a generous bound just avoids a
/// slow subscriber forcing lagged-receiver errors under a burst of edits
/// across many URIs.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Single-writer-discipline store: reads (`snapshot`, `documents`) may run
/// concurrently with each other; writes (`open`/`change`/`save`/`close`)
/// are serialized by the same lock.
pub struct DocumentStore {
	open: RwLock<HashMap<Arc<str>, OpenDocument>>,
	events: broadcast::Sender<DocumentChanged>,
}

impl Default for DocumentStore {
	fn default() -> Self {
		Self::new()
	}
}

impl DocumentStore {
	pub fn new() -> Self {
		let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self { open: RwLock::new(HashMap::new()), events }
	}

	/// Subscribes to `DocumentChanged` events emitted by `open`/`change`/`save`.
	pub fn subscribe(&self) -> broadcast::Receiver<DocumentChanged> {
		self.events.subscribe()
	}

	pub fn open(&self, uri: Arc<str>, language_id: String, version: i32, text: String) -> Result<()> {
		let mut open = self.open.write();
		if open.contains_key(&uri) {
			return Err(DocumentError::AlreadyOpen(uri.to_string()));
		}
		let text = SourceText::from_str(&text);
		open.insert(uri.clone(), OpenDocument { language_id, version, text: text.clone() });
		drop(open);
		self.emit(uri, version, text);
		Ok(())
	}

	/// Applies `edits` in order, each against the text produced by the
	/// previous one, then stores `version` regardless of its relation to
	/// the previous version — the peer is the version authority.
	pub fn change(&self, uri: &str, version: i32, edits: Vec<TextEdit>) -> Result<()> {
		let mut open = self.open.write();
		let doc = open.get_mut(uri).ok_or_else(|| DocumentError::NotOpen(uri.to_string()))?;
		let mut text = doc.text.clone();
		for edit in edits {
			text = text.apply_edit(&edit);
		}
		doc.version = version;
		doc.text = text.clone();
		let uri: Arc<str> = open.get_key_value(uri).map(|(k, _)| Arc::clone(k)).unwrap_or_else(|| uri.into());
		drop(open);
		self.emit(uri, version, text);
		Ok(())
	}

	/// `optionalText` provided replaces the stored text; otherwise this is
	/// a signal only (still emits `DocumentChanged` with the unchanged text
	/// so the Diagnostics Engine may re-run against the saved state).
	pub fn save(&self, uri: &str, text: Option<String>) -> Result<()> {
		let mut open = self.open.write();
		let doc = open.get_mut(uri).ok_or_else(|| DocumentError::NotOpen(uri.to_string()))?;
		if let Some(text) = text {
			doc.text = SourceText::from_str(&text);
		}
		let version = doc.version;
		let text = doc.text.clone();
		let uri: Arc<str> = open.get_key_value(uri).map(|(k, _)| Arc::clone(k)).unwrap_or_else(|| uri.into());
		drop(open);
		self.emit(uri, version, text);
		Ok(())
	}

	/// Idempotent-on-absent: removing a URI that isn't open is a logged
	/// warning, not an error. Returns whether a document was actually
	/// removed.
	pub fn close(&self, uri: &str) -> bool {
		let removed = self.open.write().remove(uri).is_some();
		if !removed {
			tracing::warn!(uri, "close of document that was not open");
		}
		removed
	}

	pub fn snapshot(&self, uri: &str) -> Option<(i32, SourceText)> {
		self.open.read().get(uri).map(|doc| (doc.version, doc.text.clone()))
	}

	pub fn language_id(&self, uri: &str) -> Option<String> {
		self.open.read().get(uri).map(|doc| doc.language_id.clone())
	}

	pub fn documents(&self) -> Vec<Arc<str>> {
		self.open.read().keys().cloned().collect()
	}

	fn emit(&self, uri: Arc<str>, version: i32, text: SourceText) {
		// No subscribers yet (e.g. during tests that don't wire the
		// Diagnostics Engine) is not an error.
		let _ = self.events.send(DocumentChanged { uri, version, text });
	}
}
