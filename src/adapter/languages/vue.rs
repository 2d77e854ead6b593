//! Vue language server profile: reuses the TypeScript server's startup
//! behavior but post-processes `documentSymbol` responses to drop a
//! duplicate `Property` symbol Vue's template compiler emits for `<script
//! setup>` shorthand properties (e.g. `defineExpose({ count })`), grounded
//! on `vue_language_server.py::_filter_shorthand_property_duplicates`.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use lsp_types::{DocumentSymbol, DocumentSymbolResponse};

use super::{CompanionSpec, LanguageProfile};
use crate::symbol::SymbolKind;

pub struct VueProfile;

impl LanguageProfile for VueProfile {
	fn language_id(&self) -> &str {
		"vue"
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&["dist", "build", ".nuxt"]
	}

	/// Vue's server also owns the `.ts`/`.js` files it needs for template
	/// type-checking, hosted by the TypeScript companion in hybrid mode
	/// (spec §4.3).
	fn file_extensions(&self) -> &'static [&'static str] {
		&["vue", "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
	}

	/// `.vue` single-file components open as `vue`; their plain TS/JS
	/// siblings open under the `languageId` the companion TypeScript server
	/// expects (spec §4.3 `language_id_for_file`).
	fn language_id_for_path(&self, relative_path: &Path) -> Option<String> {
		match relative_path.extension().and_then(|e| e.to_str())?.to_ascii_lowercase().as_str() {
			"ts" | "tsx" | "mts" | "cts" => Some("typescript".to_string()),
			"js" | "jsx" | "mjs" | "cjs" => Some("javascript".to_string()),
			_ => None,
		}
	}

	fn postprocess_document_symbols(&self, response: DocumentSymbolResponse) -> DocumentSymbolResponse {
		match response {
			DocumentSymbolResponse::Nested(symbols) => DocumentSymbolResponse::Nested(filter_shorthand_duplicates(symbols)),
			flat => flat,
		}
	}

	/// Runs a second TypeScript LSP process in hybrid mode alongside the
	/// primary Vue server (spec §4.3 "Companion servers").
	fn companion(&self) -> Option<CompanionSpec> {
		Some(CompanionSpec {
			language_id: "typescript".to_string(),
			binary_name: "typescript-language-server".to_string(),
			args: vec!["--stdio".to_string()],
		})
	}

	fn forwards_to_companion(&self, method: &str) -> bool {
		method == "tsserver/request"
	}
}

/// A `Property` symbol that shares a name with a `Variable` symbol defined
/// at a *different* line is the shorthand-reference duplicate; everything
/// else is kept.
fn filter_shorthand_duplicates(symbols: Vec<DocumentSymbol>) -> Vec<DocumentSymbol> {
	let mut variable_lines: HashMap<String, HashSet<u32>> = HashMap::new();
	for symbol in &symbols {
		if SymbolKind::from(symbol.kind) == SymbolKind::Variable {
			variable_lines.entry(symbol.name.clone()).or_default().insert(symbol.range.start.line);
		}
	}

	symbols
		.into_iter()
		.filter_map(|mut symbol| {
			let is_shorthand_duplicate = SymbolKind::from(symbol.kind) == SymbolKind::Property
				&& variable_lines.get(&symbol.name).is_some_and(|lines| lines.iter().any(|&line| line != symbol.range.start.line));
			if is_shorthand_duplicate {
				return None;
			}
			if let Some(children) = symbol.children.take() {
				symbol.children = Some(filter_shorthand_duplicates(children));
			}
			Some(symbol)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use lsp_types::{Position, Range};

	#[allow(deprecated)]
	fn symbol(name: &str, kind: lsp_types::SymbolKind, line: u32) -> DocumentSymbol {
		let range = Range { start: Position { line, character: 0 }, end: Position { line, character: 10 } };
		DocumentSymbol {
			name: name.to_string(),
			detail: None,
			kind,
			tags: None,
			deprecated: None,
			range,
			selection_range: range,
			children: None,
		}
	}

	#[test]
	fn filters_property_duplicate_of_variable_at_another_line() {
		let symbols = vec![symbol("count", lsp_types::SymbolKind::VARIABLE, 2), symbol("count", lsp_types::SymbolKind::PROPERTY, 10)];
		let filtered = filter_shorthand_duplicates(symbols);
		assert_eq!(filtered.len(), 1);
		assert_eq!(filtered[0].name, "count");
		assert_eq!(SymbolKind::from(filtered[0].kind), SymbolKind::Variable);
	}

	#[test]
	fn keeps_property_with_no_matching_variable() {
		let symbols = vec![symbol("label", lsp_types::SymbolKind::PROPERTY, 5)];
		let filtered = filter_shorthand_duplicates(symbols);
		assert_eq!(filtered.len(), 1);
	}

	#[test]
	fn keeps_variable_and_property_declared_at_the_same_line() {
		// Not a shorthand duplicate if they coincide on the same line.
		let symbols = vec![symbol("x", lsp_types::SymbolKind::VARIABLE, 3), symbol("x", lsp_types::SymbolKind::PROPERTY, 3)];
		let filtered = filter_shorthand_duplicates(symbols);
		assert_eq!(filtered.len(), 2);
	}

	#[test]
	fn routes_script_siblings_to_the_typescript_companion_language_id() {
		let profile = VueProfile;
		assert_eq!(profile.language_id_for_path(Path::new("src/App.vue")), None);
		assert_eq!(profile.language_id_for_path(Path::new("src/util.ts")), Some("typescript".to_string()));
		assert_eq!(profile.language_id_for_path(Path::new("src/Widget.tsx")), Some("typescript".to_string()));
		assert_eq!(profile.language_id_for_path(Path::new("src/util.js")), Some("javascript".to_string()));
		assert_eq!(profile.language_id_for_path(Path::new("src/util.mjs")), Some("javascript".to_string()));
	}

	#[test]
	fn declares_a_typescript_companion_forwarding_tsserver_requests() {
		let profile = VueProfile;
		let companion = profile.companion().expect("vue profile owns a companion spec");
		assert_eq!(companion.language_id, "typescript");
		assert!(profile.forwards_to_companion("tsserver/request"));
		assert!(!profile.forwards_to_companion("textDocument/publishDiagnostics"));
	}
}
