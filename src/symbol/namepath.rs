//! Name-path parsing and matching (spec §4.5, §8 P5), grounded on
//! `symbol.py::NamePathMatcher`.
//!
//! A name path is a `/`-separated walk through the symbol tree of a single
//! file. `NamePath::parse` splits a pattern into components, stripping an
//! optional overload bracket (`foo[1]`) off each; [`NamePath::matches`]
//! then walks a symbol's ancestor chain leaf-first, pairing the pattern's
//! *last* component with the symbol itself.

pub const SEPARATOR: char = '/';

/// One slash-delimited segment of a name path, with its optional overload
/// index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePathComponent {
	pub name: String,
	pub overload_idx: Option<u32>,
}

impl NamePathComponent {
	pub fn new(name: impl Into<String>, overload_idx: Option<u32>) -> Self {
		Self { name: name.into(), overload_idx }
	}

	fn parse(raw: &str) -> Self {
		if let Some(open) = raw.rfind('[')
			&& raw.ends_with(']')
			&& let Ok(idx) = raw[open + 1..raw.len() - 1].parse::<u32>()
		{
			return Self::new(&raw[..open], Some(idx));
		}
		Self::new(raw, None)
	}
}

impl std::fmt::Display for NamePathComponent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.overload_idx {
			Some(idx) => write!(f, "{}[{idx}]", self.name),
			None => write!(f, "{}", self.name),
		}
	}
}

/// A parsed name-path pattern, ready to match against a symbol's ancestor
/// chain.
#[derive(Debug, Clone)]
pub struct NamePathPattern {
	components: Vec<NamePathComponent>,
	is_absolute: bool,
	substring_matching: bool,
	source: String,
}

impl NamePathPattern {
	/// Parses `pattern`. A leading `/` marks an absolute pattern (spec §3
	/// "Name Path"). `substring_matching` applies only to the last (leaf)
	/// component (spec §4.5, §8 P5).
	pub fn parse(pattern: &str, substring_matching: bool) -> Self {
		let is_absolute = pattern.starts_with(SEPARATOR);
		let trimmed = pattern.trim_matches(SEPARATOR);
		let components = trimmed.split(SEPARATOR).map(NamePathComponent::parse).collect();
		Self {
			components,
			is_absolute,
			substring_matching,
			source: pattern.to_string(),
		}
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn is_absolute(&self) -> bool {
		self.is_absolute
	}

	/// Matches against a symbol's ancestor chain, leaf (the symbol itself)
	/// first. `ancestors_leaf_first` yields the symbol, then its parent,
	/// then its grandparent, and so on up to (and not including) the file
	/// root.
	pub fn matches<'a>(&self, mut ancestors_leaf_first: impl Iterator<Item = &'a NamePathComponent>) -> bool {
		for (i, pattern_component) in self.components.iter().rev().enumerate() {
			let Some(symbol_component) = ancestors_leaf_first.next() else {
				return false;
			};
			let use_substring = self.substring_matching && i == 0;
			if !component_matches(pattern_component, symbol_component, use_substring) {
				return false;
			}
		}
		if self.is_absolute && ancestors_leaf_first.next().is_some() {
			return false;
		}
		true
	}
}

fn component_matches(pattern: &NamePathComponent, candidate: &NamePathComponent, substring: bool) -> bool {
	let name_matches = if substring { candidate.name.contains(&pattern.name) } else { candidate.name == pattern.name };
	if !name_matches {
		return false;
	}
	match pattern.overload_idx {
		Some(idx) => candidate.overload_idx == Some(idx),
		None => true,
	}
}

/// Joins a chain of name-path components (root to leaf) into the canonical
/// string form, e.g. `Outer/Inner/foo[1]`.
pub fn join(components: &[NamePathComponent]) -> String {
	components.iter().map(ToString::to_string).collect::<Vec<_>>().join(&SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn comp(name: &str) -> NamePathComponent {
		NamePathComponent::new(name, None)
	}

	#[test]
	fn absolute_pattern_matches_exact_chain_only() {
		let pattern = NamePathPattern::parse("/A/B", false);
		let chain = vec![comp("B"), comp("A")];
		assert!(pattern.matches(chain.iter()));

		let too_long = vec![comp("B"), comp("A"), comp("Root")];
		assert!(!pattern.matches(too_long.iter()));
	}

	#[test]
	fn relative_pattern_matches_any_suffix() {
		let pattern = NamePathPattern::parse("A/B", false);
		let chain = vec![comp("B"), comp("A"), comp("Outer"), comp("Root")];
		assert!(pattern.matches(chain.iter()));
	}

	#[test]
	fn substring_matching_applies_only_to_last_component() {
		let pattern = NamePathPattern::parse("Outer/get", true);
		let matches = vec![comp("getName"), comp("Outer")];
		assert!(pattern.matches(matches.iter()));

		// "Out" is a substring of "Outer" but substring matching must not
		// apply to the non-leaf component.
		let pattern2 = NamePathPattern::parse("Out/getName", true);
		let chain = vec![comp("getName"), comp("Outer")];
		assert!(!pattern2.matches(chain.iter()));
	}

	#[test]
	fn overload_bracket_matches_only_that_index() {
		let pattern = NamePathPattern::parse("Model/getName[0]", false);
		let matches = vec![NamePathComponent::new("getName", Some(0)), comp("Model")];
		assert!(pattern.matches(matches.iter()));

		let wrong_overload = vec![NamePathComponent::new("getName", Some(1)), comp("Model")];
		assert!(!pattern.matches(wrong_overload.iter()));
	}

	#[test]
	fn missing_bracket_matches_any_overload() {
		let pattern = NamePathPattern::parse("Model/getName", false);
		for idx in [None, Some(0), Some(1)] {
			let chain = vec![NamePathComponent::new("getName", idx), comp("Model")];
			assert!(pattern.matches(chain.iter()));
		}
	}

	#[test]
	fn join_renders_overload_bracket() {
		let components = vec![comp("Outer"), NamePathComponent::new("foo", Some(1))];
		assert_eq!(join(&components), "Outer/foo[1]");
	}
}
