//! OmniSharp/Roslyn profile. Roslyn's `documentSymbol` names embed type
//! signatures (`"Name : string"`, `"Add(int, int) : int"`); this profile
//! splits that back into a plain name plus a `detail` string so name-path
//! matching keeps working, grounded on
//! `csharp_language_server.py::_extract_base_name_and_type`.

use std::path::Path;

use lsp_types::{DocumentSymbol, DocumentSymbolResponse};

use super::LanguageProfile;

pub struct CSharpProfile;

impl LanguageProfile for CSharpProfile {
	fn language_id(&self) -> &str {
		"csharp"
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&["bin", "obj", "packages", ".vs"]
	}

	fn file_extensions(&self) -> &'static [&'static str] {
		&["cs", "razor", "cshtml"]
	}

	/// Razor views are a distinct `languageId` from plain C# even though
	/// this same server owns both (spec §4.3).
	fn language_id_for_path(&self, relative_path: &Path) -> Option<String> {
		match relative_path.extension().and_then(|e| e.to_str()) {
			Some("razor") | Some("cshtml") => Some("aspnetcorerazor".to_string()),
			_ => None,
		}
	}

	fn postprocess_document_symbols(&self, response: DocumentSymbolResponse) -> DocumentSymbolResponse {
		match response {
			DocumentSymbolResponse::Nested(symbols) => DocumentSymbolResponse::Nested(symbols.into_iter().map(normalize).collect()),
			flat => flat,
		}
	}
}

fn normalize(mut symbol: DocumentSymbol) -> DocumentSymbol {
	let (name, detail) = extract_base_name_and_type(&symbol.name);
	if name != symbol.name {
		if symbol.detail.is_none() && !detail.is_empty() {
			symbol.detail = Some(detail);
		}
		symbol.name = name;
	}
	if let Some(children) = symbol.children.take() {
		symbol.children = Some(children.into_iter().map(normalize).collect());
	}
	symbol
}

/// Splits a Roslyn symbol name into `(base_name, type_info)`:
/// - `"Name : string"` -> `("Name", ": string")`
/// - `"Add(int, int) : int"` -> `("Add", "(int, int) : int")`
/// - `"ToString()"` -> `("ToString", "()")`
/// - `"SimpleMethod"` -> `("SimpleMethod", "")` (no paren, no colon: unchanged)
fn extract_base_name_and_type(roslyn_name: &str) -> (String, String) {
	if roslyn_name.contains(" : ") && !roslyn_name.contains('(') {
		let (base_name, type_part) = roslyn_name.split_once(" : ").expect("checked contains above");
		return (base_name.trim().to_string(), format!(": {}", type_part.trim()));
	}
	if let Some(paren_idx) = roslyn_name.find('(') {
		let base_name = roslyn_name[..paren_idx].trim().to_string();
		let signature = roslyn_name[paren_idx..].trim().to_string();
		return (base_name, signature);
	}
	(roslyn_name.to_string(), String::new())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_property_pattern() {
		let (name, detail) = extract_base_name_and_type("Name : string");
		assert_eq!(name, "Name");
		assert_eq!(detail, ": string");
	}

	#[test]
	fn splits_method_pattern_with_return_type() {
		let (name, detail) = extract_base_name_and_type("Add(int, int) : int");
		assert_eq!(name, "Add");
		assert_eq!(detail, "(int, int) : int");
	}

	#[test]
	fn splits_parameterless_method() {
		let (name, detail) = extract_base_name_and_type("ToString()");
		assert_eq!(name, "ToString");
		assert_eq!(detail, "()");
	}

	#[test]
	fn leaves_plain_identifiers_unchanged() {
		let (name, detail) = extract_base_name_and_type("SimpleMethod");
		assert_eq!(name, "SimpleMethod");
		assert_eq!(detail, "");
	}
}
