//! Locating or installing the language-server binary a [`crate::adapter::LanguageServerAdapter`]
//! needs to spawn (spec §4.2).

#[cfg(feature = "install")]
mod install;
mod path_provider;

#[cfg(feature = "install")]
pub use install::{InstallProvider, ReleaseAsset};
pub use path_provider::PathProvider;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// Resolves the executable for one language server. Implementations may hit
/// the network (install) or only the filesystem/`PATH` (lookup); both are
/// async so a caller can run several resolutions concurrently.
#[async_trait]
pub trait DependencyProvider: Send + Sync {
	/// Language this provider resolves a binary for, e.g. `"rust"`.
	fn language(&self) -> &str;

	/// Returns the absolute path to a runnable server binary, installing it
	/// first if this provider supports installation and none is found.
	async fn resolve(&self) -> Result<PathBuf>;
}

/// Metadata recorded in a `.meta/<language>.json` sidecar next to an
/// installed binary, so future runs can skip a redundant install and know
/// when to check for updates (spec §6 "on-disk artifacts").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InstallMeta {
	pub version: String,
	pub last_checked: chrono::DateTime<chrono::Utc>,
}
