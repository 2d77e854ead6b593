//! Per-language behavioral differences layered on top of the generic
//! [`super::LanguageServerAdapter`] state machine (spec §4.3, §9 "Language
//! profile").
//!
//! Every concrete language server in the original implementation subclasses
//! a common base and overrides a handful of hooks: which directories to
//! skip while walking a project, how to shape `initialize`'s
//! `initializationOptions`, how long a slow-starting server needs before
//! its first request, and the occasional response-shape quirk. This module
//! is that seam: [`LanguageProfile`] is the trait, one struct per language
//! family implements it, and [`super::LanguageServerAdapter`] holds a
//! `Box<dyn LanguageProfile>` instead of hardcoding any of this.

mod csharp;
mod java;
mod python;
mod rust;
mod typescript;
mod vue;

pub use csharp::CSharpProfile;
pub use java::JavaProfile;
pub use python::PythonProfile;
pub use rust::RustProfile;
pub use typescript::TypeScriptProfile;
pub use vue::VueProfile;

use std::path::Path;
use std::time::Duration;

use lsp_types::{DocumentSymbolResponse, Hover, InitializeParams};

use crate::adapter::stderr::LogLevelOverride;

/// A secondary LSP process a profile starts alongside its primary server
/// and tears down with it (spec §4.3 "Companion servers" — the Vue adapter
/// running a TypeScript server in hybrid mode). Resolved PATH-only, the way
/// every other companion/toolchain binary in this crate's profiles is.
pub struct CompanionSpec {
	pub language_id: String,
	pub binary_name: String,
	pub args: Vec<String>,
}

/// Per-language behavior a [`super::LanguageServerAdapter`] defers to.
/// Every method has a sensible default so a profile only needs to override
/// what actually differs for its language.
pub trait LanguageProfile: Send + Sync {
	/// The `languageId` sent in `textDocument/didOpen` for files this
	/// profile owns.
	fn language_id(&self) -> &str;

	/// Extra directory names to prune while walking the project, beyond the
	/// crate-wide defaults (`.git`, `target`, `node_modules`; see
	/// [`crate::pathutil::build_ignore_matcher`]). Mirrors each language
	/// server's `is_ignored_dirname` override.
	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&[]
	}

	/// File extensions (without the leading `.`, lowercase) this language's
	/// server owns, used by [`crate::manager::LanguageServerManager::for_file`]
	/// to route a relative path to the right server (spec §4.6).
	fn file_extensions(&self) -> &'static [&'static str] {
		&[]
	}

	/// How long to wait after spawning before sending `initialize`, for
	/// servers whose indexer needs to settle first (spec §9 OQ-3).
	fn warm_up(&self) -> Duration {
		Duration::ZERO
	}

	/// Mutates the generic `InitializeParams` this crate builds, e.g. to set
	/// `initializationOptions` a particular server requires.
	fn customize_initialize_params(&self, _params: &mut InitializeParams) {}

	/// A classifier consulted before the default stderr-severity heuristic,
	/// for servers that write known-benign chatter to stderr.
	fn stderr_override(&self) -> Option<LogLevelOverride> {
		None
	}

	/// Overrides the `languageId` for a specific file this profile is
	/// otherwise responsible for (e.g. a Vue server's single-file
	/// components living alongside plain `.ts` files it also serves).
	fn language_id_for_path(&self, _relative_path: &Path) -> Option<String> {
		None
	}

	/// Post-processes a raw `documentSymbol` response before it becomes a
	/// [`crate::symbol::SymbolArena`] (spec §9 supplement). Default is the
	/// identity transform.
	fn postprocess_document_symbols(&self, response: DocumentSymbolResponse) -> DocumentSymbolResponse {
		response
	}

	/// Post-processes a hover response. Default is the identity transform.
	fn postprocess_hover(&self, hover: Option<Hover>) -> Option<Hover> {
		hover
	}

	/// A secondary server this profile needs started in `on_start` and
	/// stopped alongside its own shutdown (spec §4.3). Default: none.
	fn companion(&self) -> Option<CompanionSpec> {
		None
	}

	/// Whether a notification method observed from the primary server
	/// should be forwarded verbatim to the companion server (spec §4.3
	/// "forwards `tsserver/request` notifications to it"). Only consulted
	/// when [`Self::companion`] returns `Some`.
	fn forwards_to_companion(&self, _method: &str) -> bool {
		false
	}
}

/// A profile for languages whose server needs nothing beyond the generic
/// adapter behavior: no extra ignored directories, no response-shape
/// quirks, optionally a fixed warm-up wait for a slow-starting server
/// (spec §9 OQ-3 — e.g. JVM- or Haskell-toolchain-hosted servers).
pub struct GenericProfile {
	language_id: String,
	extra_ignored_dirnames: &'static [&'static str],
	file_extensions: &'static [&'static str],
	warm_up: Duration,
}

impl GenericProfile {
	pub fn new(language_id: impl Into<String>) -> Self {
		Self {
			language_id: language_id.into(),
			extra_ignored_dirnames: &[],
			file_extensions: &[],
			warm_up: Duration::ZERO,
		}
	}

	pub fn with_ignored_dirnames(mut self, dirnames: &'static [&'static str]) -> Self {
		self.extra_ignored_dirnames = dirnames;
		self
	}

	pub fn with_file_extensions(mut self, extensions: &'static [&'static str]) -> Self {
		self.file_extensions = extensions;
		self
	}

	pub fn with_warm_up(mut self, warm_up: Duration) -> Self {
		self.warm_up = warm_up;
		self
	}
}

impl LanguageProfile for GenericProfile {
	fn language_id(&self) -> &str {
		&self.language_id
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		self.extra_ignored_dirnames
	}

	fn file_extensions(&self) -> &'static [&'static str] {
		self.file_extensions
	}

	fn warm_up(&self) -> Duration {
		self.warm_up
	}
}

/// Fixed warm-up constants for known slow-starting servers not otherwise
/// given a dedicated profile (spec §9 OQ-3), grounded on each server's own
/// startup-probe loop in the original implementation.
pub mod warm_up {
	use std::time::Duration;

	pub const GOPLS: Duration = Duration::from_millis(500);
	pub const RUBY_LSP: Duration = Duration::ZERO;
	pub const HASKELL_LANGUAGE_SERVER: Duration = Duration::from_secs(5);
	pub const SOURCEKIT_LSP: Duration = Duration::from_millis(500);
	pub const KOTLIN_LANGUAGE_SERVER: Duration = Duration::from_secs(2);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generic_profile_defaults_are_inert() {
		let profile = GenericProfile::new("go");
		assert_eq!(profile.language_id(), "go");
		assert!(profile.extra_ignored_dirnames().is_empty());
		assert_eq!(profile.warm_up(), Duration::ZERO);
	}

	#[test]
	fn generic_profile_builder_applies_overrides() {
		let profile = GenericProfile::new("ruby").with_ignored_dirnames(&["vendor", ".bundle"]).with_warm_up(warm_up::RUBY_LSP);
		assert_eq!(profile.extra_ignored_dirnames(), &["vendor", ".bundle"]);
	}
}
