//! The closed symbol-kind enumeration mirroring LSP's `SymbolKind` (spec §3).

/// Mirrors the LSP `SymbolKind` set one-for-one, including its numbering,
/// so conversions to/from [`lsp_types::SymbolKind`] are infallible in the
/// direction this crate actually needs (LSP -> ours); the reverse direction
/// only needs a handful of constructors for tests and is provided too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum SymbolKind {
	File = 1,
	Module = 2,
	Namespace = 3,
	Package = 4,
	Class = 5,
	Method = 6,
	Property = 7,
	Field = 8,
	Constructor = 9,
	Enum = 10,
	Interface = 11,
	Function = 12,
	Variable = 13,
	Constant = 14,
	String = 15,
	Number = 16,
	Boolean = 17,
	Array = 18,
	Object = 19,
	Key = 20,
	Null = 21,
	EnumMember = 22,
	Struct = 23,
	Event = 24,
	Operator = 25,
	TypeParameter = 26,
}

impl SymbolKind {
	/// Kinds at or past `Variable` represent data rather than structure and
	/// are filtered out of a high-level overview (spec §3, §9 supplement
	/// grounded on `symbol.py::LanguageServerSymbol.is_low_level`).
	pub fn is_low_level(self) -> bool {
		self as i32 >= SymbolKind::Variable as i32
	}

	/// Kinds for which convention requires at least one blank line of
	/// separation from a neighbouring definition (spec §4.7, §9 GLOSSARY
	/// "Definition-separated kind").
	pub fn is_definition_separated(self) -> bool {
		matches!(
			self,
			SymbolKind::Function | SymbolKind::Method | SymbolKind::Class | SymbolKind::Interface | SymbolKind::Struct
		)
	}
}

impl From<lsp_types::SymbolKind> for SymbolKind {
	fn from(kind: lsp_types::SymbolKind) -> Self {
		match kind {
			lsp_types::SymbolKind::FILE => SymbolKind::File,
			lsp_types::SymbolKind::MODULE => SymbolKind::Module,
			lsp_types::SymbolKind::NAMESPACE => SymbolKind::Namespace,
			lsp_types::SymbolKind::PACKAGE => SymbolKind::Package,
			lsp_types::SymbolKind::CLASS => SymbolKind::Class,
			lsp_types::SymbolKind::METHOD => SymbolKind::Method,
			lsp_types::SymbolKind::PROPERTY => SymbolKind::Property,
			lsp_types::SymbolKind::FIELD => SymbolKind::Field,
			lsp_types::SymbolKind::CONSTRUCTOR => SymbolKind::Constructor,
			lsp_types::SymbolKind::ENUM => SymbolKind::Enum,
			lsp_types::SymbolKind::INTERFACE => SymbolKind::Interface,
			lsp_types::SymbolKind::FUNCTION => SymbolKind::Function,
			lsp_types::SymbolKind::CONSTANT => SymbolKind::Constant,
			lsp_types::SymbolKind::STRING => SymbolKind::String,
			lsp_types::SymbolKind::NUMBER => SymbolKind::Number,
			lsp_types::SymbolKind::BOOLEAN => SymbolKind::Boolean,
			lsp_types::SymbolKind::ARRAY => SymbolKind::Array,
			lsp_types::SymbolKind::OBJECT => SymbolKind::Object,
			lsp_types::SymbolKind::KEY => SymbolKind::Key,
			lsp_types::SymbolKind::NULL => SymbolKind::Null,
			lsp_types::SymbolKind::ENUM_MEMBER => SymbolKind::EnumMember,
			lsp_types::SymbolKind::STRUCT => SymbolKind::Struct,
			lsp_types::SymbolKind::EVENT => SymbolKind::Event,
			lsp_types::SymbolKind::OPERATOR => SymbolKind::Operator,
			lsp_types::SymbolKind::TYPE_PARAMETER => SymbolKind::TypeParameter,
			_ => SymbolKind::Variable,
		}
	}
}

impl From<SymbolKind> for lsp_types::SymbolKind {
	fn from(kind: SymbolKind) -> Self {
		lsp_types::SymbolKind::from(kind as i32)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn low_level_threshold_matches_spec() {
		assert!(!SymbolKind::Class.is_low_level());
		assert!(!SymbolKind::Function.is_low_level());
		assert!(SymbolKind::Variable.is_low_level());
		assert!(SymbolKind::Constant.is_low_level());
		assert!(SymbolKind::TypeParameter.is_low_level());
	}

	#[test]
	fn definition_separated_kinds() {
		for kind in [SymbolKind::Function, SymbolKind::Method, SymbolKind::Class, SymbolKind::Interface, SymbolKind::Struct] {
			assert!(kind.is_definition_separated());
		}
		for kind in [SymbolKind::Variable, SymbolKind::Field, SymbolKind::Property, SymbolKind::Module] {
			assert!(!kind.is_definition_separated());
		}
	}

	#[test]
	fn lsp_round_trip_for_closed_set() {
		let kinds = [
			SymbolKind::File, SymbolKind::Module, SymbolKind::Namespace, SymbolKind::Package,
			SymbolKind::Class, SymbolKind::Method, SymbolKind::Property, SymbolKind::Field,
			SymbolKind::Constructor, SymbolKind::Enum, SymbolKind::Interface, SymbolKind::Function,
			SymbolKind::Variable, SymbolKind::Constant, SymbolKind::Struct, SymbolKind::TypeParameter,
		];
		for kind in kinds {
			let lsp: lsp_types::SymbolKind = kind.into();
			assert_eq!(SymbolKind::from(lsp), kind);
		}
	}
}
