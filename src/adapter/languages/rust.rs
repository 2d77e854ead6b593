//! rust-analyzer profile, grounded on `rust_analyzer.py`.

use super::LanguageProfile;
use crate::adapter::stderr::{LogLevelOverride, rust_analyzer_override};

pub struct RustProfile;

impl LanguageProfile for RustProfile {
	fn language_id(&self) -> &str {
		"rust"
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&["target"]
	}

	fn file_extensions(&self) -> &'static [&'static str] {
		&["rs"]
	}

	fn stderr_override(&self) -> Option<LogLevelOverride> {
		Some(rust_analyzer_override)
	}
}
