//! Filesystem path helpers shared across the crate: URI translation,
//! project-root containment, and gitignore-style exclusion (spec §8 P9).

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use lsp_types::Uri;

/// Converts an absolute filesystem path to a `file://` URI. Returns `None`
/// for relative paths or paths that fail URL percent-encoding.
pub fn uri_from_path(path: &Path) -> Option<Uri> {
	let absolute = if path.is_absolute() {
		path.to_path_buf()
	} else {
		return None;
	};
	let url = url::Url::from_file_path(&absolute).ok()?;
	url.as_str().parse().ok()
}

/// Converts a `file://` URI back to a filesystem path.
pub fn path_from_uri(uri: &Uri) -> Option<PathBuf> {
	let url = url::Url::parse(uri.as_str()).ok()?;
	url.to_file_path().ok()
}

/// True if `candidate` is `root` or a descendant of it, after resolving
/// `..`/symlinks on both sides. Used to reject workspace edits or path
/// parameters that would escape the project root (spec §8 P9).
pub fn is_contained_within(root: &Path, candidate: &Path) -> bool {
	let Ok(root) = std::fs::canonicalize(root) else {
		return false;
	};
	let Ok(candidate) = std::fs::canonicalize(candidate) else {
		return false;
	};
	candidate == root || candidate.starts_with(&root)
}

/// Compiles a `.gitignore`-style matcher for a project root from its
/// `.gitignore` file (if present) plus any always-excluded defaults
/// (`.git`, `target`, `node_modules`).
pub fn build_ignore_matcher(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let _ = builder.add(root.join(".gitignore"));
	for default in [".git", "target", "node_modules"] {
		let _ = builder.add_line(None, default);
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

pub fn is_ignored(matcher: &Gitignore, path: &Path, is_dir: bool) -> bool {
	matcher.matched(path, is_dir).is_ignore()
}

/// Filesystem locations this crate writes to: where downloaded language
/// servers get installed and where their stderr logs are kept. Passed by
/// value at construction time rather than read from a process-wide global,
/// replacing the teacher's `SERENA_MANAGED_DIR_NAME`-under-home-directory
/// convention (spec §9 OQ, B.3).
#[derive(Debug, Clone)]
pub struct Paths {
	install_root: PathBuf,
	log_dir: PathBuf,
}

impl Paths {
	/// Builds `Paths` rooted under the user's data/cache directory
	/// (`~/.local/share/lsp-symbol-core` on Linux, the platform equivalent
	/// elsewhere), falling back to `.lsp-symbol-core` under the current
	/// directory if no home directory can be resolved.
	pub fn discover() -> Self {
		let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("lsp-symbol-core");
		Self::with_base(base)
	}

	/// Builds `Paths` rooted under an explicit base directory, for tests and
	/// hosts that want full control over where this crate writes.
	pub fn with_base(base: impl Into<PathBuf>) -> Self {
		let base = base.into();
		Self { install_root: base.join("servers"), log_dir: base.join("logs") }
	}

	pub fn install_root(&self) -> &Path {
		&self.install_root
	}

	pub fn log_dir(&self) -> &Path {
		&self.log_dir
	}

	/// Ensures both managed directories exist, creating them if necessary.
	pub fn ensure_created(&self) -> std::io::Result<()> {
		std::fs::create_dir_all(&self.install_root)?;
		std::fs::create_dir_all(&self.log_dir)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn uri_roundtrips_through_path() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("a.rs");
		fs::write(&file, "").unwrap();
		let uri = uri_from_path(&file).expect("uri");
		let back = path_from_uri(&uri).expect("path");
		assert_eq!(back, file.canonicalize().unwrap());
	}

	#[test]
	fn relative_path_has_no_uri() {
		assert!(uri_from_path(Path::new("relative/a.rs")).is_none());
	}

	#[test]
	fn contained_path_detects_escape() {
		let dir = tempfile::tempdir().unwrap();
		let root = dir.path();
		let inside = root.join("src");
		fs::create_dir(&inside).unwrap();
		assert!(is_contained_within(root, &inside));
		assert!(!is_contained_within(&inside, root));
	}

	#[test]
	fn ignore_matcher_respects_gitignore() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
		let matcher = build_ignore_matcher(dir.path());
		assert!(is_ignored(&matcher, &dir.path().join("debug.log"), false));
		assert!(!is_ignored(&matcher, &dir.path().join("main.rs"), false));
		assert!(is_ignored(&matcher, &dir.path().join("target"), true));
	}

	#[test]
	fn paths_creates_install_root_and_log_dir() {
		let dir = tempfile::tempdir().unwrap();
		let paths = Paths::with_base(dir.path().join("state"));
		paths.ensure_created().unwrap();
		assert!(paths.install_root().is_dir());
		assert!(paths.log_dir().is_dir());
	}
}
