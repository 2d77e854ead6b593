//! The unified symbol tree produced from an LSP `documentSymbol` result
//! (spec §3 "Unified Symbol", §9 "Cyclic symbol references").
//!
//! Parent/child links in the source are cyclic (a child's `parent` points
//! back at its owner). This crate uses an arena-and-index scheme instead:
//! every node lives in one owned [`SymbolArena`] vector, and parent/child
//! relations are plain `usize` indices into it. Iteration APIs borrow from
//! the arena's lifetime rather than handing out `Rc`/`Weak` pairs.

use lsp_types::{DocumentSymbol, DocumentSymbolResponse, Range};

use super::kind::SymbolKind;
use super::namepath::{NamePathComponent, join};

/// Index of a symbol within its owning [`SymbolArena`].
pub type SymbolId = usize;

/// A file-relative location: the file itself plus a span within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLocation {
	pub relative_path: String,
	pub range: Range,
}

/// One node of the unified symbol tree (spec §3).
#[derive(Debug, Clone)]
pub struct UnifiedSymbol {
	pub name: String,
	pub kind: SymbolKind,
	pub detail: Option<String>,
	/// Body span: declaration through the last token.
	pub range: Range,
	/// Identifier-only span, always contained in `range`.
	pub selection_range: Range,
	pub location: SymbolLocation,
	pub parent: Option<SymbolId>,
	pub children: Vec<SymbolId>,
	pub overload_idx: Option<u32>,
	/// Populated lazily by a caller that snapshots the body text; this
	/// arena never reads file contents itself.
	pub body: Option<String>,
}

impl UnifiedSymbol {
	pub fn name_path_component(&self) -> NamePathComponent {
		NamePathComponent::new(self.name.clone(), self.overload_idx)
	}
}

/// An owned collection of [`UnifiedSymbol`] nodes for a single file,
/// addressed by [`SymbolId`]. Roots are the symbols with `parent == None`.
#[derive(Debug, Clone, Default)]
pub struct SymbolArena {
	nodes: Vec<UnifiedSymbol>,
	roots: Vec<SymbolId>,
}

impl SymbolArena {
	/// Builds an arena from one file's `textDocument/documentSymbol`
	/// result. `DocumentSymbolResponse::Flat` (the legacy
	/// `SymbolInformation[]` shape) has no nesting, so every entry becomes
	/// a root with no children.
	pub fn from_lsp(relative_path: &str, response: DocumentSymbolResponse) -> Self {
		let mut arena = Self::default();
		match response {
			DocumentSymbolResponse::Nested(symbols) => {
				for symbol in symbols {
					let id = arena.insert_nested(relative_path, symbol, None);
					arena.roots.push(id);
				}
			}
			DocumentSymbolResponse::Flat(symbols) => {
				for symbol in symbols {
					let id = arena.nodes.len();
					arena.nodes.push(UnifiedSymbol {
						name: symbol.name,
						kind: symbol.kind.into(),
						detail: None,
						range: symbol.location.range,
						selection_range: symbol.location.range,
						location: SymbolLocation {
							relative_path: relative_path.to_string(),
							range: symbol.location.range,
						},
						parent: None,
						children: Vec::new(),
						overload_idx: None,
						body: None,
					});
					arena.roots.push(id);
				}
			}
		}
		arena.assign_overload_indices();
		arena
	}

	fn insert_nested(&mut self, relative_path: &str, symbol: DocumentSymbol, parent: Option<SymbolId>) -> SymbolId {
		let id = self.nodes.len();
		self.nodes.push(UnifiedSymbol {
			name: symbol.name,
			kind: symbol.kind.into(),
			detail: symbol.detail,
			range: symbol.range,
			selection_range: symbol.selection_range,
			location: SymbolLocation {
				relative_path: relative_path.to_string(),
				range: symbol.range,
			},
			parent,
			children: Vec::new(),
			overload_idx: None,
			body: None,
		});
		let child_ids: Vec<SymbolId> = symbol
			.children
			.unwrap_or_default()
			.into_iter()
			.map(|child| self.insert_nested(relative_path, child, Some(id)))
			.collect();
		self.nodes[id].children = child_ids;
		id
	}

	/// Assigns dense, append-order overload indices to sibling symbols that
	/// share a name under the same parent (spec §3 invariant). Symbols
	/// without a same-named sibling keep `overload_idx = None`.
	fn assign_overload_indices(&mut self) {
		let sibling_groups: Vec<Vec<SymbolId>> = {
			let mut groups = Vec::new();
			groups.push(self.roots.clone());
			for node in &self.nodes {
				if !node.children.is_empty() {
					groups.push(node.children.clone());
				}
			}
			groups
		};

		for siblings in sibling_groups {
			let mut seen: rustc_hash::FxHashMap<String, u32> = rustc_hash::FxHashMap::default();
			let mut counts: rustc_hash::FxHashMap<String, u32> = rustc_hash::FxHashMap::default();
			for &id in &siblings {
				*counts.entry(self.nodes[id].name.clone()).or_default() += 1;
			}
			for &id in &siblings {
				let name = self.nodes[id].name.clone();
				if counts[&name] > 1 {
					let next = seen.entry(name).or_insert(0);
					self.nodes[id].overload_idx = Some(*next);
					*next += 1;
				}
			}
		}
	}

	pub fn get(&self, id: SymbolId) -> &UnifiedSymbol {
		&self.nodes[id]
	}

	pub fn get_mut(&mut self, id: SymbolId) -> &mut UnifiedSymbol {
		&mut self.nodes[id]
	}

	pub fn roots(&self) -> &[SymbolId] {
		&self.roots
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Depth-first iteration over every symbol in the arena, roots first.
	pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
		let mut stack: Vec<SymbolId> = self.roots.iter().rev().copied().collect();
		std::iter::from_fn(move || {
			let id = stack.pop()?;
			for &child in self.nodes[id].children.iter().rev() {
				stack.push(child);
			}
			Some(id)
		})
	}

	/// Yields `id`'s ancestor chain leaf-first: `id` itself, then its
	/// parent, grandparent, and so on up to (excluding) the file root's
	/// non-existent parent.
	pub fn ancestors_leaf_first(&self, id: SymbolId) -> impl Iterator<Item = SymbolId> + '_ {
		let mut current = Some(id);
		std::iter::from_fn(move || {
			let id = current?;
			current = self.nodes[id].parent;
			Some(id)
		})
	}

	pub fn name_path(&self, id: SymbolId) -> String {
		let components: Vec<NamePathComponent> = self.ancestors_leaf_first(id).map(|id| self.nodes[id].name_path_component()).collect();
		join(&components.into_iter().rev().collect::<Vec<_>>())
	}

	/// Finds the smallest symbol whose `range` contains `position`,
	/// searching depth-first so a child is preferred over its parent
	/// (spec §3 "Reference" — enclosing symbol lookup).
	pub fn smallest_enclosing(&self, position: lsp_types::Position) -> Option<SymbolId> {
		fn search(arena: &SymbolArena, id: SymbolId, position: lsp_types::Position) -> Option<SymbolId> {
			let node = arena.get(id);
			if !range_contains(node.range, position) {
				return None;
			}
			for &child in &node.children {
				if let Some(found) = search(arena, child, position) {
					return Some(found);
				}
			}
			Some(id)
		}
		self.roots.iter().find_map(|&root| search(self, root, position))
	}
}

fn range_contains(range: Range, position: lsp_types::Position) -> bool {
	(range.start.line, range.start.character) <= (position.line, position.character)
		&& (position.line, position.character) <= (range.end.line, range.end.character)
}

#[cfg(test)]
mod tests {
	use super::*;
	use lsp_types::{Position, Range};

	fn pos(line: u32, character: u32) -> Position {
		Position { line, character }
	}

	fn range(start: (u32, u32), end: (u32, u32)) -> Range {
		Range { start: pos(start.0, start.1), end: pos(end.0, end.1) }
	}

	#[allow(deprecated)]
	fn doc_symbol(name: &str, kind: lsp_types::SymbolKind, range: Range, children: Vec<DocumentSymbol>) -> DocumentSymbol {
		DocumentSymbol {
			name: name.to_string(),
			detail: None,
			kind,
			tags: None,
			deprecated: None,
			range,
			selection_range: range,
			children: if children.is_empty() { None } else { Some(children) },
		}
	}

	#[test]
	fn overload_indices_are_dense_and_ordered_by_appearance() {
		let inner = vec![
			doc_symbol("getName", lsp_types::SymbolKind::METHOD, range((1, 0), (1, 1)), vec![]),
			doc_symbol("getName", lsp_types::SymbolKind::METHOD, range((2, 0), (2, 1)), vec![]),
			doc_symbol("setName", lsp_types::SymbolKind::METHOD, range((3, 0), (3, 1)), vec![]),
		];
		let root = doc_symbol("Model", lsp_types::SymbolKind::CLASS, range((0, 0), (4, 0)), inner);
		let arena = SymbolArena::from_lsp("m.py", DocumentSymbolResponse::Nested(vec![root]));

		let model = arena.roots()[0];
		let children = arena.get(model).children.clone();
		assert_eq!(arena.get(children[0]).overload_idx, Some(0));
		assert_eq!(arena.get(children[1]).overload_idx, Some(1));
		assert_eq!(arena.get(children[2]).overload_idx, None);
	}

	#[test]
	fn name_path_joins_ancestors_root_to_leaf() {
		let inner = vec![doc_symbol("foo", lsp_types::SymbolKind::METHOD, range((1, 0), (1, 1)), vec![])];
		let root = doc_symbol("Outer", lsp_types::SymbolKind::CLASS, range((0, 0), (2, 0)), inner);
		let arena = SymbolArena::from_lsp("m.py", DocumentSymbolResponse::Nested(vec![root]));
		let outer = arena.roots()[0];
		let foo = arena.get(outer).children[0];
		assert_eq!(arena.name_path(foo), "Outer/foo");
	}

	#[test]
	fn smallest_enclosing_prefers_child_over_parent() {
		let inner = vec![doc_symbol("foo", lsp_types::SymbolKind::METHOD, range((1, 0), (1, 10)), vec![])];
		let root = doc_symbol("Outer", lsp_types::SymbolKind::CLASS, range((0, 0), (5, 0)), inner);
		let arena = SymbolArena::from_lsp("m.py", DocumentSymbolResponse::Nested(vec![root]));
		let found = arena.smallest_enclosing(pos(1, 5)).unwrap();
		assert_eq!(arena.get(found).name, "foo");

		let found_outer = arena.smallest_enclosing(pos(3, 0)).unwrap();
		assert_eq!(arena.get(found_outer).name, "Outer");
	}

	#[test]
	fn parent_range_contains_every_child_range() {
		let inner = vec![doc_symbol("foo", lsp_types::SymbolKind::METHOD, range((1, 0), (1, 10)), vec![])];
		let root = doc_symbol("Outer", lsp_types::SymbolKind::CLASS, range((0, 0), (5, 0)), inner);
		let arena = SymbolArena::from_lsp("m.py", DocumentSymbolResponse::Nested(vec![root]));
		let outer = arena.get(arena.roots()[0]);
		let foo = arena.get(outer.children[0]);
		assert!(range_contains(outer.range, foo.range.start));
		assert!(range_contains(outer.range, foo.range.end));
	}
}
