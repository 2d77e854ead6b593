//! Multi-language server manager: owns one running adapter per language,
//! routes a file to the server that claims it, and is the concrete
//! [`crate::symbol::SymbolSource`] the symbol retriever talks to (spec
//! §4.6).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lsp_types::{ClientCapabilities, Hover, Location, Position};
use parking_lot::Mutex;

use crate::adapter::{LanguageProfile, LanguageServerAdapter, LanguageServerConfig};
use crate::buffer::BufferRegistry;
use crate::client::{ClientHandle, LspTransport, StdioTransport};
use crate::dependency::DependencyProvider;
use crate::error::{Error, Result};
use crate::pathutil;
use crate::symbol::SymbolSource;

/// One running language server plus the state this manager layers on top of
/// it: its profile (for routing and response post-processing) and its own
/// file buffer registry.
#[derive(Clone)]
pub(crate) struct LanguageInstance {
	adapter: Arc<LanguageServerAdapter>,
	client: ClientHandle,
	buffers: Arc<BufferRegistry>,
	profile: Arc<dyn LanguageProfile>,
}

/// Holds `map<Language, LanguageServer>` (spec §4.6) and implements
/// [`SymbolSource`] over whichever server a given file routes to.
pub struct LanguageServerManager {
	project_root: PathBuf,
	paths: pathutil::Paths,
	capabilities: ClientCapabilities,
	/// Registration order, consulted as the tie-break priority when more
	/// than one language claims the same extension (spec §4.6).
	order: Mutex<Vec<String>>,
	languages: Mutex<HashMap<String, LanguageInstance>>,
}

impl LanguageServerManager {
	pub fn new(project_root: PathBuf, paths: pathutil::Paths, capabilities: ClientCapabilities) -> Self {
		Self {
			project_root,
			paths,
			capabilities,
			order: Mutex::new(Vec::new()),
			languages: Mutex::new(HashMap::new()),
		}
	}

	pub fn project_root(&self) -> &Path {
		&self.project_root
	}

	pub fn paths(&self) -> &pathutil::Paths {
		&self.paths
	}

	pub fn languages(&self) -> Vec<String> {
		self.order.lock().clone()
	}

	/// Resolves `profile`'s binary through `dependency`, spawns it, and runs
	/// it through the full `initialize`/`initialized` handshake, without
	/// disturbing any already-running language (spec §4.6). A second call
	/// for an already-registered language is a no-op.
	pub async fn add_language(
		&self,
		profile: Arc<dyn LanguageProfile>,
		dependency: Arc<dyn DependencyProvider>,
		args: Vec<String>,
		env: HashMap<String, String>,
	) -> Result<()> {
		let language = profile.language_id().to_string();
		if self.languages.lock().contains_key(&language) {
			return Ok(());
		}

		let command = dependency.resolve().await?;
		let config = LanguageServerConfig {
			command,
			args,
			env,
			initialize_timeout: Duration::from_secs(30),
			request_timeout: Duration::from_secs(30),
		};
		let transport: Arc<dyn LspTransport> = Arc::new(StdioTransport::new());
		let adapter = Arc::new(LanguageServerAdapter::new(transport, profile.clone(), config));
		let client = adapter.start(self.project_root.clone(), self.capabilities.clone()).await?;
		let buffers = BufferRegistry::new(client.clone());

		let instance = LanguageInstance { adapter, client, buffers, profile };
		self.languages.lock().insert(language.clone(), instance);
		self.order.lock().push(language);
		Ok(())
	}

	/// Stops `language`'s server and releases every buffer it holds, leaving
	/// every other language untouched (spec §4.6).
	pub async fn remove_language(&self, language: &str) -> Result<()> {
		let instance = {
			self.order.lock().retain(|l| l != language);
			self.languages.lock().remove(language)
		};
		let Some(instance) = instance else {
			return Ok(());
		};
		instance.buffers.close_all().await?;
		instance.adapter.shutdown().await
	}

	/// Cooperative shutdown of every running server (spec §4.6). `save_cache`
	/// is accepted for interface parity with the original implementation's
	/// per-project symbol-index cache; this crate persists no such cache of
	/// its own, so it is presently unused.
	pub async fn stop_all(&self, _save_cache: bool, _timeout: Duration) -> Result<()> {
		let instances: Vec<LanguageInstance> = {
			let mut languages = self.languages.lock();
			self.order.lock().clear();
			languages.drain().map(|(_, instance)| instance).collect()
		};
		for instance in instances {
			instance.buffers.close_all().await?;
			instance.adapter.shutdown().await?;
		}
		Ok(())
	}

	/// Routes `relative_path` to the language whose [`LanguageProfile::file_extensions`]
	/// claims it, in registration-priority order (spec §4.6).
	pub fn for_file(&self, relative_path: &str) -> Option<String> {
		self.instance_for_path(relative_path).map(|i| i.profile.language_id().to_string())
	}

	fn instance_for_path(&self, relative_path: &str) -> Option<LanguageInstance> {
		let extension = Path::new(relative_path).extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
		let extension = extension.as_deref()?;
		let order = self.order.lock();
		let languages = self.languages.lock();
		order.iter().filter_map(|lang| languages.get(lang)).find(|instance| instance.profile.file_extensions().contains(&extension)).cloned()
	}

	fn all_instances(&self) -> Vec<LanguageInstance> {
		self.languages.lock().values().cloned().collect()
	}

	fn require_instance(&self, relative_path: &str) -> Result<LanguageInstance> {
		self.instance_for_path(relative_path).ok_or_else(|| Error::Protocol(format!("no language server registered for {relative_path}")))
	}

	/// Opens `relative_path` in its owning server's buffer registry, using
	/// the per-file `languageId` override when the profile declares one
	/// (e.g. a Vue server's `.ts` siblings, a C# server's `.razor` views).
	pub(crate) async fn open_buffer(&self, relative_path: &str) -> Result<(LanguageInstance, crate::buffer::BufferHandle)> {
		let instance = self.require_instance(relative_path)?;
		let full_path = self.project_root.join(relative_path);
		let language_id = instance.profile.language_id_for_path(Path::new(relative_path)).unwrap_or_else(|| instance.profile.language_id().to_string());
		let handle = instance.buffers.open(&full_path, &language_id).await?;
		Ok((instance, handle))
	}

	pub(crate) fn client_for(&self, relative_path: &str) -> Result<ClientHandle> {
		Ok(self.require_instance(relative_path)?.client)
	}

	pub(crate) fn buffers_for(&self, relative_path: &str) -> Result<Arc<BufferRegistry>> {
		Ok(self.require_instance(relative_path)?.buffers)
	}

	/// Renames a file on disk and atomically rekeys its buffer entry in
	/// whichever language's registry had it open (spec §4.7 "Workspace-edit
	/// application"). A no-op registry rekey if the file was not open.
	pub(crate) async fn rename_file_on_disk(&self, old_path: &Path, new_path: &Path) -> Result<()> {
		let old_canonical = old_path.canonicalize().map_err(|e| Error::io(old_path, e))?;
		if let Some(parent) = new_path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
		}
		std::fs::rename(&old_canonical, new_path).map_err(|e| Error::io(&old_canonical, e))?;
		let new_canonical = new_path.canonicalize().map_err(|e| Error::io(new_path, e))?;
		for instance in self.all_instances() {
			instance.buffers.rename(&old_canonical, &new_canonical).await?;
		}
		Ok(())
	}
}

#[async_trait]
impl SymbolSource for LanguageServerManager {
	fn project_root(&self) -> &Path {
		&self.project_root
	}

	async fn document_symbols(&self, relative_path: &str) -> Result<Arc<crate::symbol::SymbolArena>> {
		let (instance, handle) = self.open_buffer(relative_path).await?;
		let uri = handle.buffer().uri.clone();
		let response = instance.client.document_symbol(uri).await?;
		handle.close().await?;
		let response = response.unwrap_or(lsp_types::DocumentSymbolResponse::Nested(Vec::new()));
		let response = instance.profile.postprocess_document_symbols(response);
		Ok(Arc::new(crate::symbol::SymbolArena::from_lsp(relative_path, response)))
	}

	async fn references(&self, relative_path: &str, position: Position) -> Result<Vec<Location>> {
		let (instance, handle) = self.open_buffer(relative_path).await?;
		let uri = handle.buffer().uri.clone();
		let locations = instance.client.references(uri, position, true).await?;
		handle.close().await?;
		Ok(locations.unwrap_or_default())
	}

	async fn hover(&self, relative_path: &str, position: Position) -> Result<Option<Hover>> {
		let (instance, handle) = self.open_buffer(relative_path).await?;
		let uri = handle.buffer().uri.clone();
		let hover = instance.client.hover(uri, position).await?;
		handle.close().await?;
		Ok(instance.profile.postprocess_hover(hover))
	}

	fn relative_path_for_uri(&self, uri: &lsp_types::Uri) -> Option<String> {
		let path = pathutil::path_from_uri(uri)?;
		if !pathutil::is_contained_within(&self.project_root, &path) {
			return None;
		}
		let matcher = pathutil::build_ignore_matcher(&self.project_root);
		if pathutil::is_ignored(&matcher, &path, false) {
			return None;
		}
		let canonical_root = self.project_root.canonicalize().ok()?;
		let canonical_path = path.canonicalize().ok()?;
		let relative = canonical_path.strip_prefix(&canonical_root).ok()?;
		Some(relative.to_string_lossy().replace('\\', "/"))
	}
}
