//! `PATH`-only dependency resolution: the simplest provider, for language
//! servers the user is expected to have already installed.

use std::path::PathBuf;

use async_trait::async_trait;

use super::DependencyProvider;
use crate::error::{Error, Result};

pub struct PathProvider {
	language: String,
	binary_name: String,
	install_hint: Option<String>,
}

impl PathProvider {
	pub fn new(language: impl Into<String>, binary_name: impl Into<String>) -> Self {
		Self {
			language: language.into(),
			binary_name: binary_name.into(),
			install_hint: None,
		}
	}

	pub fn with_install_hint(mut self, hint: impl Into<String>) -> Self {
		self.install_hint = Some(hint.into());
		self
	}
}

#[async_trait]
impl DependencyProvider for PathProvider {
	fn language(&self) -> &str {
		&self.language
	}

	async fn resolve(&self) -> Result<PathBuf> {
		let binary_name = self.binary_name.clone();
		let found = tokio::task::spawn_blocking(move || which::which(&binary_name))
			.await
			.map_err(|e| Error::Join(e.to_string()))?;

		found.map_err(|_| Error::ServerNotFound {
			language: self.language.clone(),
			searched: std::env::var_os("PATH")
				.map(|p| std::env::split_paths(&p).collect())
				.unwrap_or_default(),
			install_hint: self.install_hint.clone(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn missing_binary_surfaces_server_not_found() {
		let provider = PathProvider::new("nonexistent-lang", "definitely-not-a-real-binary-xyz");
		let err = provider.resolve().await.unwrap_err();
		assert!(matches!(err, Error::ServerNotFound { .. }));
	}

	#[tokio::test]
	async fn finds_a_binary_known_to_exist_on_ci_and_dev_machines() {
		// `sh` is present on every unix CI runner and dev machine this crate
		// targets; this just exercises the happy path without depending on
		// an actual language server being installed.
		if cfg!(unix) {
			let provider = PathProvider::new("shell-probe", "sh");
			assert!(provider.resolve().await.is_ok());
		}
	}
}
