//! Python profile (pyright/pylsp), grounded on the ignored-directory
//! conventions shared across the original implementation's Python tooling.

use super::LanguageProfile;

pub struct PythonProfile;

impl LanguageProfile for PythonProfile {
	fn language_id(&self) -> &str {
		"python"
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&["__pycache__", ".venv", "venv", ".mypy_cache", ".pytest_cache", ".tox"]
	}

	fn file_extensions(&self) -> &'static [&'static str] {
		&["py", "pyi"]
	}
}
