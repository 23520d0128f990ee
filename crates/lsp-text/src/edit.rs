use crate::position::Range;

/// An incoming edit to apply to the current text. When `range` is absent
/// the edit replaces the entire document; when present it is interpreted
/// against the text as it stood *before this edit*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
	pub range: Option<Range>,
	pub new_text: String,
}

impl TextEdit {
	pub fn whole_document(new_text: impl Into<String>) -> Self {
		Self { range: None, new_text: new_text.into() }
	}

	pub fn ranged(range: Range, new_text: impl Into<String>) -> Self {
		Self { range: Some(range), new_text: new_text.into() }
	}
}
