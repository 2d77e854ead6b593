//! typescript-language-server profile, covering both `.ts`/`.tsx` and
//! `.js`/`.jsx` projects.

use super::LanguageProfile;

pub struct TypeScriptProfile;

impl LanguageProfile for TypeScriptProfile {
	fn language_id(&self) -> &str {
		"typescript"
	}

	fn extra_ignored_dirnames(&self) -> &'static [&'static str] {
		&["dist", "build", ".next", ".nuxt"]
	}

	fn file_extensions(&self) -> &'static [&'static str] {
		&["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
	}
}
