//! Symbol retrieval: name-path matching with uniqueness resolution,
//! cross-file reference gathering, and the budgeted hover-info batch
//! (spec §4.5, §8 P8/S6), grounded on `symbol.py::LanguageServerSymbolRetriever`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lsp_types::{Hover, HoverContents, Location, MarkedString, Position};

use super::arena::{SymbolArena, SymbolId, UnifiedSymbol};
use super::namepath::NamePathPattern;
use crate::error::{Error, Result};

/// The boundary this module needs from whatever routes a relative path to
/// the correct language server — implemented by
/// [`crate::manager::LanguageServerManager`]. Kept as a trait (rather than
/// a direct dependency on `manager`) so `symbol` stays a leaf relative to
/// it in the module graph.
#[async_trait]
pub trait SymbolSource: Send + Sync {
	fn project_root(&self) -> &std::path::Path;

	/// Full document-symbol tree for one file, already run through the
	/// owning adapter's `document_symbols_post` hook.
	async fn document_symbols(&self, relative_path: &str) -> Result<Arc<SymbolArena>>;

	async fn references(&self, relative_path: &str, position: Position) -> Result<Vec<Location>>;

	/// Hover info at a position, already run through `hover_post`.
	async fn hover(&self, relative_path: &str, position: Position) -> Result<Option<Hover>>;

	/// Translates a server-returned URI into a path relative to the
	/// project root, or `None` if it falls outside the root or is ignored
	/// (spec §4.5 step 3, §8 P9).
	fn relative_path_for_uri(&self, uri: &lsp_types::Uri) -> Option<String>;
}

/// One matched symbol: the arena it was found in (so callers can navigate
/// to siblings/ancestors) plus its id within that arena.
#[derive(Clone)]
pub struct Match {
	pub relative_path: String,
	pub arena: Arc<SymbolArena>,
	pub id: SymbolId,
}

impl Match {
	pub fn symbol(&self) -> &UnifiedSymbol {
		self.arena.get(self.id)
	}

	pub fn name_path(&self) -> String {
		self.arena.name_path(self.id)
	}
}

/// A detached snapshot of a symbol enclosing a reference (spec §3
/// "Reference"). Not a [`SymbolId`] into any particular arena: a reference
/// can point into a different file's arena than the one the caller started
/// from, so the enclosing symbol is captured by value instead.
#[derive(Debug, Clone)]
pub struct EnclosingSymbol {
	pub name: String,
	pub kind: super::kind::SymbolKind,
	pub range: lsp_types::Range,
	pub selection_range: lsp_types::Range,
}

impl From<&UnifiedSymbol> for EnclosingSymbol {
	fn from(symbol: &UnifiedSymbol) -> Self {
		Self {
			name: symbol.name.clone(),
			kind: symbol.kind,
			range: symbol.range,
			selection_range: symbol.selection_range,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Reference {
	pub relative_path: String,
	pub range: lsp_types::Range,
	pub enclosing_symbol: Option<EnclosingSymbol>,
}

/// Wall-clock budget for the batched hover-info gatherer (spec §4.5,
/// §8 S6). `0` disables the budget (every symbol gets looked up).
#[derive(Debug, Clone, Copy)]
pub struct SymbolInfoBudget(Option<Duration>);

impl SymbolInfoBudget {
	pub fn from_secs_f64(secs: f64) -> Self {
		if secs <= 0.0 { Self(None) } else { Self(Some(Duration::from_secs_f64(secs))) }
	}

	pub fn unlimited() -> Self {
		Self(None)
	}

	pub const DEFAULT_SECS: f64 = 5.0;
}

impl Default for SymbolInfoBudget {
	fn default() -> Self {
		Self::from_secs_f64(Self::DEFAULT_SECS)
	}
}

pub struct SymbolRetriever {
	source: Arc<dyn SymbolSource>,
	budget: SymbolInfoBudget,
}

impl SymbolRetriever {
	pub fn new(source: Arc<dyn SymbolSource>, budget: SymbolInfoBudget) -> Self {
		Self { source, budget }
	}

	/// All symbols in `relative_path` whose name path matches `pattern`
	/// (spec §4.5, §9 "find vs find_unique" supplement).
	pub async fn find_all(&self, relative_path: &str, pattern: &str, substring_matching: bool) -> Result<Vec<Match>> {
		let arena = self.source.document_symbols(relative_path).await?;
		let parsed = NamePathPattern::parse(pattern, substring_matching);
		let matches = arena
			.iter()
			.filter(|&id| {
				let components: Vec<_> = arena.ancestors_leaf_first(id).map(|a| arena.get(a).name_path_component()).collect();
				parsed.matches(components.iter())
			})
			.map(|id| Match { relative_path: relative_path.to_string(), arena: arena.clone(), id })
			.collect();
		Ok(matches)
	}

	/// Resolves `pattern` to exactly one symbol, applying the spec §4.5
	/// uniqueness rules in order: single candidate; exact full-name-path
	/// match; strictly larger range (definition vs. shorthand/reference
	/// duplicate, spec §8 P8); otherwise `Ambiguous`.
	pub async fn find_unique(&self, relative_path: &str, pattern: &str) -> Result<Match> {
		let candidates = self.find_all(relative_path, pattern, false).await?;
		match candidates.len() {
			0 => Err(Error::SymbolNotFound {
				name_path: pattern.to_string(),
				relative_path: relative_path.to_string(),
			}),
			1 => Ok(candidates.into_iter().next().unwrap()),
			_ => resolve_ambiguity(candidates, pattern, relative_path),
		}
	}

	/// Finds the symbol at `name_path` in `relative_path`, calls
	/// `textDocument/references` at its selection range, then attaches the
	/// smallest enclosing symbol to every result (spec §4.5).
	pub async fn references(&self, name_path: &str, relative_path: &str) -> Result<Vec<Reference>> {
		let matched = self.find_unique(relative_path, name_path).await?;
		let selection_start = matched.symbol().selection_range.start;
		let locations = self.source.references(relative_path, selection_start).await?;

		let mut arena_cache: HashMap<String, Arc<SymbolArena>> = HashMap::new();
		arena_cache.insert(relative_path.to_string(), matched.arena.clone());

		let mut results = Vec::with_capacity(locations.len());
		for location in locations {
			let Some(rel) = self.source.relative_path_for_uri(&location.uri) else {
				continue;
			};
			let arena = match arena_cache.get(&rel) {
				Some(a) => a.clone(),
				None => {
					let fetched = self.source.document_symbols(&rel).await?;
					arena_cache.insert(rel.clone(), fetched.clone());
					fetched
				}
			};
			let enclosing = arena.smallest_enclosing(location.range.start).map(|id| EnclosingSymbol::from(arena.get(id)));
			results.push(Reference {
				relative_path: rel,
				range: location.range,
				enclosing_symbol: enclosing,
			});
		}
		Ok(results)
	}

	/// Hover info for one symbol, through the same budgeted path as
	/// [`Self::request_info_for_symbols`] (spec §9 supplement).
	pub async fn request_info_for_symbol(&self, relative_path: &str, target: SymbolId, arena: &SymbolArena) -> Result<Option<String>> {
		let position = arena.get(target).selection_range.start;
		let hover = self.source.hover(relative_path, position).await?;
		Ok(hover.map(flatten_hover))
	}

	/// Gathers hover info for many symbols, grouped by file, under a total
	/// wall-clock budget. Once the budget is exhausted every remaining
	/// symbol receives `None` without issuing further requests (spec §4.5,
	/// §8 S6).
	pub async fn request_info_for_symbols(&self, symbols: &[Match]) -> Result<Vec<Option<String>>> {
		let started = Instant::now();
		let mut by_file: HashMap<&str, Vec<usize>> = HashMap::new();
		for (idx, m) in symbols.iter().enumerate() {
			by_file.entry(m.relative_path.as_str()).or_default().push(idx);
		}

		let mut results: Vec<Option<String>> = vec![None; symbols.len()];
		'outer: for (_file, indices) in by_file {
			for idx in indices {
				if self.is_exhausted(started) {
					break 'outer;
				}
				let m = &symbols[idx];
				let position = m.symbol().selection_range.start;
				let hover = self.source.hover(&m.relative_path, position).await?;
				results[idx] = hover.map(flatten_hover);
			}
		}
		Ok(results)
	}

	fn is_exhausted(&self, started: Instant) -> bool {
		match self.budget.0 {
			Some(limit) => started.elapsed() >= limit,
			None => false,
		}
	}
}

fn resolve_ambiguity(candidates: Vec<Match>, pattern: &str, relative_path: &str) -> Result<Match> {
	if let Some(exact) = candidates.iter().find(|m| m.name_path() == pattern) {
		let exact_count = candidates.iter().filter(|m| m.name_path() == pattern).count();
		if exact_count == 1 {
			return Ok(exact.clone());
		}
	}

	if let Some(largest) = strictly_largest_range(&candidates) {
		return Ok(largest);
	}

	let names = candidates.iter().map(|m| format!("{} ({:?})", m.name_path(), m.symbol().range)).collect();
	Err(Error::Ambiguous {
		name_path: pattern.to_string(),
		relative_path: relative_path.to_string(),
		candidates: names,
	})
}

/// Returns the sole candidate whose range strictly contains every other
/// candidate's range (spec §4.5 rule 3, §8 P8), or `None` if no candidate
/// dominates all the others this way.
fn strictly_largest_range(candidates: &[Match]) -> Option<Match> {
	fn span(range: lsp_types::Range) -> (u32, u32, u32, u32) {
		(range.start.line, range.start.character, range.end.line, range.end.character)
	}
	fn contains(outer: lsp_types::Range, inner: lsp_types::Range) -> bool {
		(outer.start.line, outer.start.character) <= (inner.start.line, inner.start.character)
			&& (inner.end.line, inner.end.character) <= (outer.end.line, outer.end.character)
	}

	let mut best: Option<&Match> = None;
	for candidate in candidates {
		let range = candidate.symbol().range;
		let dominates_all_others = candidates.iter().all(|other| {
			std::ptr::eq(other, candidate) || (contains(range, other.symbol().range) && span(range) != span(other.symbol().range))
		});
		if dominates_all_others {
			if best.is_some() {
				return None; // more than one dominator: not a valid tie-break
			}
			best = Some(candidate);
		}
	}
	best.cloned()
}

fn flatten_hover(hover: Hover) -> String {
	match hover.contents {
		HoverContents::Scalar(marked) => flatten_marked_string(marked),
		HoverContents::Array(items) => items.into_iter().map(flatten_marked_string).collect::<Vec<_>>().join("\n\n"),
		HoverContents::Markup(content) => content.value,
	}
}

fn flatten_marked_string(marked: MarkedString) -> String {
	match marked {
		MarkedString::String(s) => s,
		MarkedString::LanguageString(ls) => format!("```{}\n{}\n```", ls.language, ls.value),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::symbol::arena::SymbolArena;
	use lsp_types::{DocumentSymbol, DocumentSymbolResponse, Position, Range};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration as StdDuration;

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

	struct StubSource {
		arenas: HashMap<String, Arc<SymbolArena>>,
		hover_delay: StdDuration,
		hover_calls: AtomicUsize,
	}

	#[async_trait]
	impl SymbolSource for StubSource {
		fn project_root(&self) -> &std::path::Path {
			std::path::Path::new("/project")
		}

		async fn document_symbols(&self, relative_path: &str) -> Result<Arc<SymbolArena>> {
			self.arenas
				.get(relative_path)
				.cloned()
				.ok_or_else(|| Error::SymbolNotFound { name_path: String::new(), relative_path: relative_path.to_string() })
		}

		async fn references(&self, _relative_path: &str, _position: Position) -> Result<Vec<Location>> {
			Ok(vec![])
		}

		async fn hover(&self, _relative_path: &str, _position: Position) -> Result<Option<Hover>> {
			self.hover_calls.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(self.hover_delay).await;
			Ok(Some(Hover {
				contents: HoverContents::Scalar(MarkedString::String("info".into())),
				range: None,
			}))
		}

		fn relative_path_for_uri(&self, _uri: &lsp_types::Uri) -> Option<String> {
			None
		}
	}

	fn single_file_source(name: &str) -> Arc<StubSource> {
		let overloaded = vec![
			doc_symbol("getName", lsp_types::SymbolKind::METHOD, range((1, 0), (1, 5)), vec![]),
			doc_symbol("getName", lsp_types::SymbolKind::METHOD, range((2, 0), (2, 5)), vec![]),
		];
		let root = doc_symbol("Model", lsp_types::SymbolKind::CLASS, range((0, 0), (5, 0)), overloaded);
		let arena = Arc::new(SymbolArena::from_lsp(name, DocumentSymbolResponse::Nested(vec![root])));
		let mut arenas = HashMap::new();
		arenas.insert(name.to_string(), arena);
		Arc::new(StubSource { arenas, hover_delay: StdDuration::ZERO, hover_calls: AtomicUsize::new(0) })
	}

	#[tokio::test]
	async fn ambiguous_overloads_require_a_bracket() {
		let source = single_file_source("m.py");
		let retriever = SymbolRetriever::new(source, SymbolInfoBudget::unlimited());
		let err = retriever.find_unique("m.py", "Model/getName").await.unwrap_err();
		assert!(matches!(err, Error::Ambiguous { .. }));
	}

	#[tokio::test]
	async fn overload_bracket_disambiguates() {
		let source = single_file_source("m.py");
		let retriever = SymbolRetriever::new(source, SymbolInfoBudget::unlimited());
		let found = retriever.find_unique("m.py", "Model/getName[0]").await.unwrap();
		assert_eq!(found.symbol().range, range((1, 0), (1, 5)));
	}

	#[tokio::test]
	async fn larger_range_wins_tie_break() {
		let shorthand = doc_symbol("pressCount", lsp_types::SymbolKind::PROPERTY, range((3, 0), (3, 10)), vec![]);
		let definition = doc_symbol("pressCount", lsp_types::SymbolKind::VARIABLE, range((1, 0), (1, 30)), vec![]);
		let arena = Arc::new(SymbolArena::from_lsp("v.vue", DocumentSymbolResponse::Nested(vec![definition, shorthand])));
		let mut arenas = HashMap::new();
		arenas.insert("v.vue".to_string(), arena);
		let source = Arc::new(StubSource { arenas, hover_delay: StdDuration::ZERO, hover_calls: AtomicUsize::new(0) });
		let retriever = SymbolRetriever::new(source, SymbolInfoBudget::unlimited());
		let found = retriever.find_unique("v.vue", "pressCount").await.unwrap();
		assert_eq!(found.symbol().range, range((1, 0), (1, 30)));
	}

	#[tokio::test]
	async fn hover_budget_exhaustion_nulls_remaining_symbols() {
		let overloaded = vec![
			doc_symbol("a", lsp_types::SymbolKind::FUNCTION, range((0, 0), (0, 1)), vec![]),
			doc_symbol("b", lsp_types::SymbolKind::FUNCTION, range((1, 0), (1, 1)), vec![]),
			doc_symbol("c", lsp_types::SymbolKind::FUNCTION, range((2, 0), (2, 1)), vec![]),
			doc_symbol("d", lsp_types::SymbolKind::FUNCTION, range((3, 0), (3, 1)), vec![]),
			doc_symbol("e", lsp_types::SymbolKind::FUNCTION, range((4, 0), (4, 1)), vec![]),
		];
		let arena = Arc::new(SymbolArena::from_lsp("m.py", DocumentSymbolResponse::Nested(overloaded)));
		let mut arenas = HashMap::new();
		arenas.insert("m.py".to_string(), arena.clone());
		let source = Arc::new(StubSource {
			arenas,
			hover_delay: StdDuration::from_millis(50),
			hover_calls: AtomicUsize::new(0),
		});
		let retriever = SymbolRetriever::new(source, SymbolInfoBudget::from_secs_f64(0.1));
		let matches: Vec<Match> = arena.roots().iter().map(|&id| Match { relative_path: "m.py".into(), arena: arena.clone(), id }).collect();
		let infos = retriever.request_info_for_symbols(&matches).await.unwrap();
		let non_null = infos.iter().filter(|i| i.is_some()).count();
		assert_eq!(non_null, 2);
	}

	#[tokio::test]
	async fn zero_budget_is_unlimited() {
		let overloaded = vec![
			doc_symbol("a", lsp_types::SymbolKind::FUNCTION, range((0, 0), (0, 1)), vec![]),
			doc_symbol("b", lsp_types::SymbolKind::FUNCTION, range((1, 0), (1, 1)), vec![]),
		];
		let arena = Arc::new(SymbolArena::from_lsp("m.py", DocumentSymbolResponse::Nested(overloaded)));
		let mut arenas = HashMap::new();
		arenas.insert("m.py".to_string(), arena.clone());
		let source = Arc::new(StubSource {
			arenas,
			hover_delay: StdDuration::from_millis(10),
			hover_calls: AtomicUsize::new(0),
		});
		let retriever = SymbolRetriever::new(source, SymbolInfoBudget::from_secs_f64(0.0));
		let matches: Vec<Match> = arena.roots().iter().map(|&id| Match { relative_path: "m.py".into(), arena: arena.clone(), id }).collect();
		let infos = retriever.request_info_for_symbols(&matches).await.unwrap();
		assert!(infos.iter().all(|i| i.is_some()));
	}
}
