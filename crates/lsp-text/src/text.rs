use ropey::Rope;

use crate::edit::TextEdit;
use crate::position::{Position, Range};

/// An immutable snapshot of a document's text. Cloning is O(1) — `Rope`
/// shares its internal tree structure — so handlers can cheaply hold a
/// snapshot for the lifetime of a request without the store changing
/// underneath them: results are always computed against the snapshot
/// passed in, never the live document.
#[derive(Debug, Clone)]
pub struct SourceText {
	rope: Rope,
}

impl SourceText {
	pub fn from_str(text: &str) -> Self {
		Self { rope: Rope::from_str(text) }
	}

	pub fn to_string(&self) -> String {
		self.rope.to_string()
	}

	pub fn len_utf16(&self) -> usize {
		self.rope.char_to_utf16_cu(self.rope.len_chars())
	}

	pub fn line_count(&self) -> usize {
		self.rope.len_lines()
	}

	/// Applies a single edit, returning the resulting text. Never fails —
	/// out-of-bounds positions clamp rather than raising.
	pub fn apply_edit(&self, edit: &TextEdit) -> Self {
		let Some(range) = edit.range else {
			return Self::from_str(&edit.new_text);
		};

		let (start_char, end_char) = self.char_range_for(range);
		let mut rope = self.rope.clone();
		if start_char < end_char {
			rope.remove(start_char..end_char);
		}
		if !edit.new_text.is_empty() {
			rope.insert(start_char, &edit.new_text);
		}
		Self { rope }
	}

	/// Translates a [`Range`] into a clamped `(start_char, end_char)` pair,
	/// char (Unicode scalar value) indices into the rope.
	fn char_range_for(&self, range: Range) -> (usize, usize) {
		let start = self.char_offset_for(range.start);
		let end = self.char_offset_for(range.end);
		if start > end {
			// start past end collapses to an empty span at end.
			(end, end)
		} else {
			(start, end)
		}
	}

	/// Translates a single [`Position`] into a clamped char offset.
	fn char_offset_for(&self, pos: Position) -> usize {
		let last_line = self.rope.len_lines().saturating_sub(1);
		let line = (pos.line as usize).min(last_line);

		let line_start_char = self.rope.line_to_char(line);
		let line_slice = self.rope.line(line);
		let mut line_len_chars = line_slice.len_chars();
		// Exclude the line terminator itself from "end of line".
		if line_len_chars > 0 {
			let last = line_slice.char(line_len_chars - 1);
			if last == '\n' {
				line_len_chars -= 1;
				if line_len_chars > 0 && line_slice.char(line_len_chars - 1) == '\r' {
					line_len_chars -= 1;
				}
			}
		}
		let line_end_char = line_start_char + line_len_chars;

		let line_start_utf16 = self.rope.char_to_utf16_cu(line_start_char);
		let line_end_utf16 = self.rope.char_to_utf16_cu(line_end_char);
		let target_utf16 = (line_start_utf16 + pos.character as usize).min(line_end_utf16);

		self.rope.utf16_cu_to_char(target_utf16)
	}
}

impl PartialEq for SourceText {
	fn eq(&self, other: &Self) -> bool {
		self.rope == other.rope
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn whole_document_replace() {
		let text = SourceText::from_str("hello");
		let replaced = text.apply_edit(&TextEdit::whole_document("world"));
		assert_eq!(replaced.to_string(), "world");
	}

	#[test]
	fn ranged_edit_replaces_span() {
		let text = SourceText::from_str("hello");
		let range = Range::new(Position::new(0, 0), Position::new(0, 5));
		let replaced = text.apply_edit(&TextEdit::ranged(range, "world"));
		assert_eq!(replaced.to_string(), "world");
	}

	#[test]
	fn sequential_edits_fold_left_to_right() {
		let mut text = SourceText::from_str("hello world");
		let edits = vec![
			TextEdit::ranged(Range::new(Position::new(0, 0), Position::new(0, 5)), "goodbye"),
			TextEdit::ranged(Range::new(Position::new(0, 15), Position::new(0, 20)), "earth"),
		];
		for edit in &edits {
			text = text.apply_edit(edit);
		}
		assert_eq!(text.to_string(), "goodbye world");
	}

	#[test]
	fn line_beyond_last_line_clamps() {
		let text = SourceText::from_str("hello");
		let range = Range::new(Position::new(99, 0), Position::new(99, 0));
		let replaced = text.apply_edit(&TextEdit::ranged(range, "!"));
		assert_eq!(replaced.to_string(), "hello!");
	}

	#[test]
	fn character_beyond_end_of_line_clamps() {
		let text = SourceText::from_str("hi\nthere");
		let range = Range::new(Position::new(0, 99), Position::new(0, 99));
		let replaced = text.apply_edit(&TextEdit::ranged(range, "!"));
		assert_eq!(replaced.to_string(), "hi!\nthere");
	}

	#[test]
	fn start_past_end_collapses_to_empty_span_at_end() {
		let text = SourceText::from_str("hello world");
		let range = Range::new(Position::new(0, 8), Position::new(0, 2));
		let replaced = text.apply_edit(&TextEdit::ranged(range, "X"));
		// Collapsed to an empty span at the (clamped) end position, char 2.
		assert_eq!(replaced.to_string(), "heXllo world");
	}

	#[test]
	fn utf16_surrogate_pairs_count_as_two_units() {
		// U+1F600 (grinning face) is one Unicode scalar value but two UTF-16
		// code units.
		let text = SourceText::from_str("a\u{1F600}b");
		assert_eq!(text.len_utf16(), 4);
		let range = Range::new(Position::new(0, 3), Position::new(0, 4));
		let replaced = text.apply_edit(&TextEdit::ranged(range, "X"));
		assert_eq!(replaced.to_string(), "a\u{1F600}X");
	}

	#[test]
	fn crlf_line_ending_excluded_from_end_of_line() {
		let text = SourceText::from_str("one\r\ntwo");
		let range = Range::new(Position::new(0, 99), Position::new(0, 99));
		let replaced = text.apply_edit(&TextEdit::ranged(range, "!"));
		assert_eq!(replaced.to_string(), "one!\r\ntwo");
	}
}
