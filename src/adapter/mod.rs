//! Per-language server lifecycle: spawn, initialize handshake, readiness,
//! and cooperative shutdown (spec §4.3).

pub mod languages;
mod state;
mod stderr;

pub use languages::{CompanionSpec, LanguageProfile};
pub use state::AdapterState;
pub use stderr::{LogLevel, classify_stderr_line};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::{ClientCapabilities, InitializeParams, InitializeResult, WorkspaceFolder};
use parking_lot::RwLock;

use crate::client::{ClientHandle, LanguageServerId, LspTransport, OffsetEncoding, ServerConfig, StdioTransport, TransportEvent};
use crate::dependency::{DependencyProvider, PathProvider};
use crate::error::{Error, Result};
use crate::protocol::Message;

/// Static, per-language-instance configuration a [`LanguageServerAdapter`]
/// is built from (spec §6 "Configuration surface"). What differs between
/// *languages* (ignored dirnames, initialize quirks, warm-up) lives on the
/// [`LanguageProfile`] instead, so this only carries what differs between
/// *installations* of the same language server.
#[derive(Debug, Clone)]
pub struct LanguageServerConfig {
	pub command: PathBuf,
	pub args: Vec<String>,
	pub env: std::collections::HashMap<String, String>,
	pub initialize_timeout: Duration,
	pub request_timeout: Duration,
}

impl LanguageServerConfig {
	pub fn new(command: impl Into<PathBuf>) -> Self {
		Self {
			command: command.into(),
			args: Vec::new(),
			env: std::collections::HashMap::new(),
			initialize_timeout: Duration::from_secs(30),
			request_timeout: Duration::from_secs(30),
		}
	}
}

/// One language server's lifecycle, wrapping a transport-level server id
/// with the `initialize` handshake and a [`AdapterState`] guard.
///
/// This crate starts exactly one OS process per adapter (spec §9 OQ-2): a
/// language that wants to shard work across multiple processes does so
/// behind its own [`LspTransport`] implementation, not by this type holding
/// more than one [`LanguageServerId`].
pub struct LanguageServerAdapter {
	transport: Arc<dyn LspTransport>,
	profile: Arc<dyn LanguageProfile>,
	config: LanguageServerConfig,
	state: RwLock<AdapterState>,
	server_id: RwLock<Option<LanguageServerId>>,
	encoding: RwLock<OffsetEncoding>,
	companion: RwLock<Option<CompanionServer>>,
}

/// A profile-owned secondary process, plus the task forwarding qualifying
/// notifications from the primary server onto it (spec §4.3 "Companion
/// servers"). Torn down alongside the primary adapter in [`LanguageServerAdapter::shutdown`].
struct CompanionServer {
	transport: Arc<dyn LspTransport>,
	id: LanguageServerId,
	handle: ClientHandle,
	forward_task: tokio::task::JoinHandle<()>,
}

impl LanguageServerAdapter {
	pub fn new(transport: Arc<dyn LspTransport>, profile: Arc<dyn LanguageProfile>, config: LanguageServerConfig) -> Self {
		Self {
			transport,
			profile,
			config,
			state: RwLock::new(AdapterState::Uninitialized),
			server_id: RwLock::new(None),
			encoding: RwLock::new(OffsetEncoding::Utf16),
			companion: RwLock::new(None),
		}
	}

	/// The companion server's own handle, if this language's profile
	/// declares one (spec §4.3) and it has been started.
	pub fn companion_client(&self) -> Option<ClientHandle> {
		self.companion.read().as_ref().map(|c| c.handle.clone())
	}

	pub fn language(&self) -> &str {
		self.profile.language_id()
	}

	pub fn profile(&self) -> &Arc<dyn LanguageProfile> {
		&self.profile
	}

	pub fn state(&self) -> AdapterState {
		*self.state.read()
	}

	pub fn is_ready(&self) -> bool {
		self.state() == AdapterState::Ready
	}

	/// Spawns the process and runs `initialize`/`initialized`, transitioning
	/// `Uninitialized -> Starting -> Initialized -> Ready`, or `-> Failed` on
	/// any error along the way (spec §4.3 state diagram).
	pub async fn start(&self, root_path: PathBuf, capabilities: ClientCapabilities) -> Result<ClientHandle> {
		{
			let mut state = self.state.write();
			if *state != AdapterState::Uninitialized {
				return Err(Error::Protocol(format!(
					"adapter for {} already started (state {:?})",
					self.profile.language_id(),
					*state
				)));
			}
			*state = AdapterState::Starting;
		}

		let start_result = self.start_inner(root_path, capabilities).await;
		match start_result {
			Ok(handle) => {
				*self.state.write() = AdapterState::Ready;
				Ok(handle)
			}
			Err(e) => {
				*self.state.write() = AdapterState::Failed;
				Err(e)
			}
		}
	}

	async fn start_inner(&self, root_path: PathBuf, capabilities: ClientCapabilities) -> Result<ClientHandle> {
		let language = self.profile.language_id().to_string();
		let cfg = ServerConfig {
			language: language.clone(),
			command: self.config.command.clone(),
			args: self.config.args.clone(),
			env: self.config.env.clone(),
			root_path: root_path.clone(),
		};
		let started = self.transport.start(cfg).await?;
		*self.server_id.write() = Some(started.id);

		let warm_up = self.profile.warm_up();
		if !warm_up.is_zero() {
			tokio::time::sleep(warm_up).await;
		}

		let handle = ClientHandle::new(self.transport.clone(), started.id, language.clone(), OffsetEncoding::Utf16);

		let root_uri = crate::pathutil::uri_from_path(&root_path)
			.ok_or_else(|| Error::Protocol(format!("root path is not a valid URI: {}", root_path.display())))?;

		let mut params = InitializeParams {
			process_id: Some(std::process::id()),
			root_uri: Some(root_uri.clone()),
			capabilities: capabilities.clone(),
			workspace_folders: Some(vec![WorkspaceFolder {
				uri: root_uri,
				name: root_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
			}]),
			..Default::default()
		};
		self.profile.customize_initialize_params(&mut params);

		let result: InitializeResult = handle.initialize(params, Some(self.config.initialize_timeout)).await?;
		*self.state.write() = AdapterState::Initialized;

		let encoding = negotiate_offset_encoding(&result);
		*self.encoding.write() = encoding;
		let handle = ClientHandle::new(self.transport.clone(), started.id, language, encoding);

		handle.initialized().await?;

		if let Some(spec) = self.profile.companion() {
			self.start_companion(spec, &root_path, capabilities).await?;
		}

		Ok(handle)
	}

	/// Starts the profile's companion process (spec §4.3), performs its own
	/// `initialize`/`initialized` handshake, and spawns the task that
	/// forwards qualifying notifications from the primary server onto it.
	async fn start_companion(&self, spec: languages::CompanionSpec, root_path: &Path, capabilities: ClientCapabilities) -> Result<()> {
		let provider = PathProvider::new(spec.language_id.clone(), spec.binary_name.clone());
		let command = provider.resolve().await?;

		let transport: Arc<dyn LspTransport> = Arc::new(StdioTransport::new());
		let cfg = ServerConfig {
			language: spec.language_id.clone(),
			command,
			args: spec.args,
			env: std::collections::HashMap::new(),
			root_path: root_path.to_path_buf(),
		};
		let started = transport.start(cfg).await?;
		let handle = ClientHandle::new(transport.clone(), started.id, spec.language_id.clone(), OffsetEncoding::Utf16);

		let root_uri = crate::pathutil::uri_from_path(root_path)
			.ok_or_else(|| Error::Protocol(format!("root path is not a valid URI: {}", root_path.display())))?;
		let params = InitializeParams {
			process_id: Some(std::process::id()),
			root_uri: Some(root_uri.clone()),
			capabilities,
			workspace_folders: Some(vec![WorkspaceFolder {
				uri: root_uri,
				name: root_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
			}]),
			..Default::default()
		};
		let _: InitializeResult = handle.initialize(params, Some(self.config.initialize_timeout)).await?;
		handle.initialized().await?;

		let mut primary_events = self.transport.events();
		let profile = self.profile.clone();
		let companion_handle = handle.clone();
		let forward_task = tokio::spawn(async move {
			while let Some(event) = primary_events.recv().await {
				if let TransportEvent::Message {
					message: Message::Notification(notif),
					..
				} = event
				{
					if profile.forwards_to_companion(&notif.method) {
						let _ = companion_handle.notify_raw(notif.method.clone(), notif.params.clone()).await;
					}
				}
			}
		});

		*self.companion.write() = Some(CompanionServer {
			transport,
			id: started.id,
			handle,
			forward_task,
		});
		Ok(())
	}

	pub async fn shutdown(&self) -> Result<()> {
		let Some(id) = *self.server_id.read() else {
			return Ok(());
		};
		*self.state.write() = AdapterState::ShuttingDown;
		let handle = ClientHandle::new(self.transport.clone(), id, self.profile.language_id().to_string(), *self.encoding.read());
		let graceful = handle.shutdown(Some(Duration::from_secs(5))).await;
		if graceful.is_ok() {
			let _ = handle.exit().await;
		}
		self.transport.stop(id).await?;

		let companion = self.companion.write().take();
		if let Some(companion) = companion {
			companion.forward_task.abort();
			let graceful = companion.handle.shutdown(Some(Duration::from_secs(5))).await;
			if graceful.is_ok() {
				let _ = companion.handle.exit().await;
			}
			companion.transport.stop(companion.id).await?;
		}

		*self.state.write() = AdapterState::Stopped;
		Ok(())
	}
}

/// Picks the richest offset encoding both the client and server accept
/// (spec §9 OQ-1): UTF-32 > UTF-16 > UTF-8, falling back to the protocol
/// default (UTF-16) when the server's `initialize` response omits the
/// `positionEncoding` capability entirely.
fn negotiate_offset_encoding(result: &InitializeResult) -> OffsetEncoding {
	match result.capabilities.position_encoding.as_ref().map(|pe| pe.as_str()) {
		Some("utf-32") => OffsetEncoding::Utf32,
		Some("utf-8") => OffsetEncoding::Utf8,
		_ => OffsetEncoding::Utf16,
	}
}
