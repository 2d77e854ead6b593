//! Symbol-aware source editing: locate a symbol by name path, compute the
//! edit, apply it inside a buffer scope (spec §4.7).

use std::sync::Arc;

use lsp_types::{DocumentChangeOperation, DocumentChanges, OneOf, Position, ResourceOp, TextEdit, WorkspaceEdit};

use crate::error::{Error, Result};
use crate::manager::LanguageServerManager;
use crate::pathutil;
use crate::symbol::{SymbolInfoBudget, SymbolRetriever, SymbolSource};

/// High-level editing operations over a [`LanguageServerManager`], grounded
/// on `editor.py::Editor` (spec §4.7).
pub struct CodeEditor {
	manager: Arc<LanguageServerManager>,
	retriever: SymbolRetriever,
}

impl CodeEditor {
	pub fn new(manager: Arc<LanguageServerManager>, symbol_info_budget: SymbolInfoBudget) -> Self {
		let retriever = SymbolRetriever::new(manager.clone(), symbol_info_budget);
		Self { manager, retriever }
	}

	/// Deletes `[body_start, body_end)` and inserts `new_body.trim()` at
	/// `body_start`. Surrounding newlines survive untouched because only the
	/// interior range is removed (spec §4.7).
	pub async fn replace_body(&self, name_path: &str, relative_path: &str, new_body: &str) -> Result<()> {
		let matched = self.retriever.find_unique(relative_path, name_path).await?;
		let range = matched.symbol().range;
		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let buffers = self.manager.buffers_for(relative_path)?;
		buffers.delete_text_between(&handle, range.start, range.end).await?;
		buffers.insert_text_at(&handle, range.start, new_body.trim()).await?;
		handle.close().await
	}

	/// Inserts `body` on its own line(s) after the symbol's closing line,
	/// preserving or widening the blank-line gap per spec §4.7 step 2-4.
	pub async fn insert_after_symbol(&self, name_path: &str, relative_path: &str, body: &str) -> Result<()> {
		let matched = self.retriever.find_unique(relative_path, name_path).await?;
		let symbol = matched.symbol();
		let min_empty_lines = if symbol.kind.is_definition_separated() { 1 } else { 0 };
		let position = Position { line: symbol.range.end.line + 1, character: 0 };

		let leading = leading_newline_count(body);
		let stripped = strip_leading_newlines(body).trim_end_matches('\n');
		let blank_lines = leading.max(min_empty_lines);
		let text = format!("{}{stripped}\n", "\n".repeat(blank_lines));

		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let buffers = self.manager.buffers_for(relative_path)?;
		buffers.insert_text_at(&handle, position, &text).await?;
		handle.close().await
	}

	/// Symmetric to [`Self::insert_after_symbol`]: inserts `body` on the
	/// symbol's own starting line, pushing the symbol down (spec §4.7).
	pub async fn insert_before_symbol(&self, name_path: &str, relative_path: &str, body: &str) -> Result<()> {
		let matched = self.retriever.find_unique(relative_path, name_path).await?;
		let symbol = matched.symbol();
		let min_empty_lines = if symbol.kind.is_definition_separated() { 1 } else { 0 };
		let position = Position { line: symbol.range.start.line, character: 0 };

		let trailing = trailing_newline_count(body).saturating_sub(1);
		let stripped = strip_trailing_newlines(body).trim_start_matches('\n');
		let blank_lines = trailing.max(min_empty_lines);
		let text = format!("{stripped}\n{}", "\n".repeat(blank_lines));

		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let buffers = self.manager.buffers_for(relative_path)?;
		buffers.insert_text_at(&handle, position, &text).await?;
		handle.close().await
	}

	/// Raw line insertion at column 0 of `line`, no symbol lookup (spec §4.7).
	pub async fn insert_at_line(&self, relative_path: &str, line: u32, content: &str) -> Result<()> {
		let text = if content.ends_with('\n') { content.to_string() } else { format!("{content}\n") };
		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let buffers = self.manager.buffers_for(relative_path)?;
		buffers.insert_text_at(&handle, Position { line, character: 0 }, &text).await?;
		handle.close().await
	}

	/// Deletes `[{start,0}, {end+1,0})` (spec §4.7).
	pub async fn delete_lines(&self, relative_path: &str, start: u32, end: u32) -> Result<()> {
		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let buffers = self.manager.buffers_for(relative_path)?;
		buffers
			.delete_text_between(&handle, Position { line: start, character: 0 }, Position { line: end + 1, character: 0 })
			.await?;
		handle.close().await
	}

	/// Deletes `[body_start, body_end)` (spec §4.7).
	pub async fn delete_symbol(&self, name_path: &str, relative_path: &str) -> Result<()> {
		let matched = self.retriever.find_unique(relative_path, name_path).await?;
		let range = matched.symbol().range;
		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let buffers = self.manager.buffers_for(relative_path)?;
		buffers.delete_text_between(&handle, range.start, range.end).await?;
		handle.close().await
	}

	/// Calls `textDocument/rename` at the symbol's selection range and
	/// applies the resulting `WorkspaceEdit`, returning the number of
	/// distinct edit operations applied. An empty result means the server
	/// declined to rename the symbol, which is an error (spec §4.7).
	pub async fn rename_symbol(&self, name_path: &str, relative_path: &str, new_name: &str) -> Result<usize> {
		let matched = self.retriever.find_unique(relative_path, name_path).await?;
		let position = matched.symbol().selection_range.start;
		let client = self.manager.client_for(relative_path)?;
		let (_instance, handle) = self.manager.open_buffer(relative_path).await?;
		let uri = handle.buffer().uri.clone();
		handle.close().await?;

		let edit = client
			.rename(uri.clone(), position, new_name.to_string())
			.await?
			.ok_or_else(|| Error::InvalidEdit {
				uri: uri.as_str().to_string(),
				reason: format!("server returned no rename edit for '{name_path}'; symbol does not support renaming"),
			})?;
		self.apply_workspace_edit(edit).await
	}

	/// Applies a `WorkspaceEdit`, understanding both the legacy `changes` map
	/// and the modern `documentChanges` shapes (spec §4.7
	/// "Workspace-edit application"). Returns the number of distinct edit
	/// operations applied (one per `TextEdits` group or resource operation).
	pub async fn apply_workspace_edit(&self, edit: WorkspaceEdit) -> Result<usize> {
		let mut operations = 0usize;

		if let Some(changes) = edit.changes {
			for (uri, edits) in changes {
				self.apply_text_edit_group(&uri, edits).await?;
				operations += 1;
			}
		}

		match edit.document_changes {
			None => {}
			Some(DocumentChanges::Edits(edits)) => {
				for text_document_edit in edits {
					let uri = text_document_edit.text_document.uri;
					let edits = text_document_edit.edits.into_iter().map(flatten_annotated).collect();
					self.apply_text_edit_group(&uri, edits).await?;
					operations += 1;
				}
			}
			Some(DocumentChanges::Operations(ops)) => {
				for op in ops {
					match op {
						DocumentChangeOperation::Edit(text_document_edit) => {
							let uri = text_document_edit.text_document.uri;
							let edits = text_document_edit.edits.into_iter().map(flatten_annotated).collect();
							self.apply_text_edit_group(&uri, edits).await?;
						}
						DocumentChangeOperation::Op(ResourceOp::Rename(rename)) => {
							let old_path = pathutil::path_from_uri(&rename.old_uri)
								.ok_or_else(|| Error::Protocol(format!("rename old_uri {} has no filesystem path", rename.old_uri.as_str())))?;
							let new_path = pathutil::path_from_uri(&rename.new_uri)
								.ok_or_else(|| Error::Protocol(format!("rename new_uri {} has no filesystem path", rename.new_uri.as_str())))?;
							self.manager.rename_file_on_disk(&old_path, &new_path).await?;
						}
						DocumentChangeOperation::Op(ResourceOp::Create(_)) => {
							return Err(Error::UnhandledEdit { kind: "create".to_string() });
						}
						DocumentChangeOperation::Op(ResourceOp::Delete(_)) => {
							return Err(Error::UnhandledEdit { kind: "delete".to_string() });
						}
					}
					operations += 1;
				}
			}
		}

		Ok(operations)
	}

	async fn apply_text_edit_group(&self, uri: &lsp_types::Uri, edits: Vec<TextEdit>) -> Result<()> {
		let relative_path = self
			.manager
			.relative_path_for_uri(uri)
			.ok_or_else(|| Error::Protocol(format!("edit uri {} is outside the project root", uri.as_str())))?;
		let (_instance, handle) = self.manager.open_buffer(&relative_path).await?;
		let buffers = self.manager.buffers_for(&relative_path)?;
		buffers.apply_text_edits(&handle, &edits).await?;
		handle.close().await
	}
}

fn flatten_annotated(edit: OneOf<TextEdit, lsp_types::AnnotatedTextEdit>) -> TextEdit {
	match edit {
		OneOf::Left(edit) => edit,
		OneOf::Right(annotated) => annotated.text_edit,
	}
}

fn leading_newline_count(s: &str) -> usize {
	s.chars().take_while(|&c| c == '\n').count()
}

fn strip_leading_newlines(s: &str) -> &str {
	s.trim_start_matches('\n')
}

fn trailing_newline_count(s: &str) -> usize {
	s.chars().rev().take_while(|&c| c == '\n').count()
}

fn strip_trailing_newlines(s: &str) -> &str {
	s.trim_end_matches('\n')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn after_insertion_text_gets_min_one_blank_line_for_definitions() {
		let body = "def baz():\n    pass\n";
		let leading = leading_newline_count(body);
		let stripped = strip_leading_newlines(body).trim_end_matches('\n');
		let blank_lines = leading.max(1);
		let text = format!("{}{stripped}\n", "\n".repeat(blank_lines));
		assert_eq!(text, "\ndef baz():\n    pass\n");
	}

	#[test]
	fn after_insertion_preserves_extra_caller_supplied_blank_lines() {
		let body = "\n\ndef baz():\n    pass\n";
		let leading = leading_newline_count(body);
		let stripped = strip_leading_newlines(body).trim_end_matches('\n');
		let blank_lines = leading.max(1);
		let text = format!("{}{stripped}\n", "\n".repeat(blank_lines));
		assert_eq!(text, "\n\ndef baz():\n    pass\n");
	}

	#[test]
	fn before_insertion_mirrors_after_on_the_trailing_side() {
		let body = "def baz():\n    pass";
		let trailing = trailing_newline_count(body).saturating_sub(1);
		let stripped = strip_trailing_newlines(body).trim_start_matches('\n');
		let blank_lines = trailing.max(1);
		let text = format!("{stripped}\n{}", "\n".repeat(blank_lines));
		assert_eq!(text, "def baz():\n    pass\n\n");
	}

	#[test]
	fn before_insertion_does_not_double_count_a_caller_trailing_blank_line() {
		// body already ends in one blank line (two trailing newlines); the
		// final newline is the line terminator, not a blank line to preserve.
		let body = "def foo():\n    pass\n\n";
		let trailing = trailing_newline_count(body).saturating_sub(1);
		let stripped = strip_trailing_newlines(body).trim_start_matches('\n');
		let blank_lines = trailing.max(1);
		let text = format!("{stripped}\n{}", "\n".repeat(blank_lines));
		assert_eq!(text, "def foo():\n    pass\n\n");
	}
}
