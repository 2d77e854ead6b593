//! Eclipse JDT Language Server profile, grounded on `eclipse_jdtls.py`.
//! JDTLS is JVM-hosted and needs noticeably longer than a native binary to
//! finish its own startup probing before the first request lands
//! (spec §9 OQ-3).

use std::time::Duration;

use super::LanguageProfile;

pub struct JavaProfile;

impl LanguageProfile for JavaProfile {
	fn language_id(&self) -> &str {
		"java"
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&["target", "build", "bin", "out", "classes", "dist", "lib", ".settings", ".idea"]
	}

	fn file_extensions(&self) -> &'static [&'static str] {
		&["java"]
	}

	fn warm_up(&self) -> Duration {
		Duration::from_secs(10)
	}
}
