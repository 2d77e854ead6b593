//! Conversions between [`ropey`] char offsets and LSP [`lsp_types::Position`]
//! values under each offset encoding a server may negotiate (spec §9 OQ-1).

use lsp_types::Position;
use ropey::Rope;

use crate::client::OffsetEncoding;

/// Converts a rope char index to an LSP position, encoding the column in
/// the units the server negotiated.
pub fn char_to_lsp_position(rope: &Rope, char_idx: usize, encoding: OffsetEncoding) -> Option<Position> {
	let char_idx = char_idx.min(rope.len_chars());
	let line = rope.char_to_line(char_idx);
	let line_start = rope.line_to_char(line);
	let col_chars = char_idx - line_start;
	let line_slice = rope.line(line);

	let column = match encoding {
		OffsetEncoding::Utf32 => col_chars as u32,
		OffsetEncoding::Utf8 => line_slice.slice(..col_chars).len_bytes() as u32,
		OffsetEncoding::Utf16 => line_slice
			.slice(..col_chars)
			.chars()
			.map(|c| c.len_utf16())
			.sum::<usize>() as u32,
	};

	Some(Position {
		line: line as u32,
		character: column,
	})
}

/// Number of trailing chars `rope.line(..)` includes for the line break
/// itself (0, 1 for `"\n"`/`"\r"`, or 2 for `"\r\n"`), since ropey's line
/// slices include the terminator.
fn line_ending_len(line: &ropey::RopeSlice) -> usize {
	let len = line.len_chars();
	if len >= 2 && line.char(len - 2) == '\r' && line.char(len - 1) == '\n' {
		2
	} else if len >= 1 && matches!(line.char(len - 1), '\n' | '\r') {
		1
	} else {
		0
	}
}

/// Converts an LSP position back to a rope char index. Positions past the
/// end of a line clamp to the line's length (excluding its line break); positions
/// past the end of the document clamp to `rope.len_chars()`.
pub fn lsp_position_to_char(rope: &Rope, position: Position, encoding: OffsetEncoding) -> usize {
	let line_idx = (position.line as usize).min(rope.len_lines().saturating_sub(1));
	let line_start = rope.line_to_char(line_idx);
	let full_line_slice = rope.line(line_idx);
	let content_len = full_line_slice.len_chars() - line_ending_len(&full_line_slice);
	let line_slice = full_line_slice.slice(..content_len);

	let target = position.character as usize;
	let col_chars = match encoding {
		OffsetEncoding::Utf32 => target.min(line_slice.len_chars()),
		OffsetEncoding::Utf8 => {
			let mut bytes = 0usize;
			let mut chars = 0usize;
			for c in line_slice.chars() {
				if bytes >= target {
					break;
				}
				bytes += c.len_utf8();
				chars += 1;
			}
			chars
		}
		OffsetEncoding::Utf16 => {
			let mut units = 0usize;
			let mut chars = 0usize;
			for c in line_slice.chars() {
				if units >= target {
					break;
				}
				units += c.len_utf16();
				chars += 1;
			}
			chars
		}
	};

	line_start + col_chars
}

/// Converts an inclusive-exclusive char range to an LSP `Range`.
pub fn char_range_to_lsp(rope: &Rope, range: std::ops::Range<usize>, encoding: OffsetEncoding) -> Option<lsp_types::Range> {
	Some(lsp_types::Range {
		start: char_to_lsp_position(rope, range.start, encoding)?,
		end: char_to_lsp_position(rope, range.end, encoding)?,
	})
}

pub fn lsp_range_to_char(rope: &Rope, range: lsp_types::Range, encoding: OffsetEncoding) -> std::ops::Range<usize> {
	lsp_position_to_char(rope, range.start, encoding)..lsp_position_to_char(rope, range.end, encoding)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ascii_positions_are_encoding_agnostic() {
		let rope = Rope::from_str("fn main() {\n    println!(\"hi\");\n}\n");
		for encoding in [OffsetEncoding::Utf8, OffsetEncoding::Utf16, OffsetEncoding::Utf32] {
			let pos = char_to_lsp_position(&rope, 15, encoding).unwrap();
			assert_eq!(pos.line, 1);
			let back = lsp_position_to_char(&rope, pos, encoding);
			assert_eq!(back, 15);
		}
	}

	#[test]
	fn utf16_surrogate_pair_counts_two_units() {
		// U+1F600 (grinning face) needs a surrogate pair in UTF-16 but is one char.
		let rope = Rope::from_str("a\u{1F600}b\n");
		let pos_b = char_to_lsp_position(&rope, 2, OffsetEncoding::Utf16).unwrap();
		assert_eq!(pos_b.character, 3); // 'a' (1) + surrogate pair (2)
		let pos_b_utf32 = char_to_lsp_position(&rope, 2, OffsetEncoding::Utf32).unwrap();
		assert_eq!(pos_b_utf32.character, 2);
	}

	#[test]
	fn position_past_end_of_line_clamps() {
		let rope = Rope::from_str("ab\ncd\n");
		let pos = Position { line: 0, character: 100 };
		let idx = lsp_position_to_char(&rope, pos, OffsetEncoding::Utf16);
		assert_eq!(idx, 2);
	}
}
