//! Process transport: spawns a language-server binary as a child process and
//! speaks length-framed JSON-RPC over its stdio (spec §4.1, §5, §9).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout as tokio_timeout;

use super::pending::PendingTable;
use super::{IdAllocator, LanguageServerId};
use crate::error::{Error, Result};
use crate::protocol::{AnyNotification, AnyRequest, AnyResponse, FramedReader, JsonValue, Message, ResponseError, RequestId, encode_message};

/// Everything needed to spawn one language-server process (spec §3 "Pending Request" sibling type).
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub language: String,
	pub command: PathBuf,
	pub args: Vec<String>,
	pub env: HashMap<String, String>,
	pub root_path: PathBuf,
}

/// Handle returned once a server has been spawned and is ready to receive messages.
#[derive(Debug, Clone, Copy)]
pub struct StartedServer {
	pub id: LanguageServerId,
}

/// Coarse lifecycle status broadcast alongside the adapter's own state
/// machine (spec §4.3); the transport only knows "alive / gone", the
/// adapter layers the richer Uninitialized/.../Ready states on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
	Starting,
	Running,
	Stopped,
	Crashed,
}

/// Out-of-band events the transport pushes to whoever is driving a server,
/// decoupled from the request/response call-and-response path.
#[derive(Debug)]
pub enum TransportEvent {
	Status {
		server: LanguageServerId,
		status: TransportStatus,
	},
	/// A request or notification the server sent unprompted (e.g.
	/// `window/logMessage`, `workspace/configuration`, or a server->client
	/// request this crate must reply to via [`LspTransport::reply`]).
	Message {
		server: LanguageServerId,
		message: Message,
	},
	/// One line of stderr output, already classified by the adapter's log
	/// level policy is NOT this transport's job — callers get the raw line
	/// and classify it themselves (spec §4.3 "stderr log-level classifier").
	StderrLine { server: LanguageServerId, line: String },
	Disconnected { server: LanguageServerId },
}

/// The seam between the typed request surface ([`super::handle::ClientHandle`])
/// and however bytes actually reach a language server. `StdioTransport` is
/// the only implementation this crate ships; it exists as a trait so a host
/// application can substitute a multiplexed broker process without touching
/// anything above this layer.
#[async_trait]
pub trait LspTransport: Send + Sync {
	/// Takes the event receiver. Panics if called more than once — there is
	/// exactly one event consumer per transport instance.
	fn events(&self) -> mpsc::UnboundedReceiver<TransportEvent>;

	async fn start(&self, cfg: ServerConfig) -> Result<StartedServer>;

	async fn notify(&self, server: LanguageServerId, notif: AnyNotification) -> Result<()>;

	async fn request(
		&self,
		server: LanguageServerId,
		req: AnyRequest,
		timeout: Option<Duration>,
	) -> Result<AnyResponse>;

	/// Replies to a request the server itself sent (e.g.
	/// `workspace/configuration`, `window/workDoneProgress/create`). The
	/// caller supplies the id from the `TransportEvent::Message` that
	/// carried the original request.
	async fn reply(&self, server: LanguageServerId, id: RequestId, resp: std::result::Result<JsonValue, ResponseError>) -> Result<()>;

	async fn stop(&self, server: LanguageServerId) -> Result<()>;
}

struct RunningServer {
	child: Child,
	stdin: Mutex<tokio::process::ChildStdin>,
	pending: PendingTable,
	language: String,
}

/// The default [`LspTransport`]: one OS child process per language server,
/// started in its own process group so shutdown can signal the whole
/// process tree rather than only the direct child (spec §4.1, grounded in
/// the original implementation's `psutil`-based process-tree signaling).
pub struct StdioTransport {
	ids: IdAllocator,
	servers: SyncMutex<HashMap<LanguageServerId, Arc<RunningServer>>>,
	events_tx: mpsc::UnboundedSender<TransportEvent>,
	events_rx: SyncMutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl Default for StdioTransport {
	fn default() -> Self {
		Self::new()
	}
}

impl StdioTransport {
	pub fn new() -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self {
			ids: IdAllocator::default(),
			servers: SyncMutex::new(HashMap::new()),
			events_tx: tx,
			events_rx: SyncMutex::new(Some(rx)),
		}
	}

	fn server(&self, id: LanguageServerId) -> Result<Arc<RunningServer>> {
		self.servers
			.lock()
			.get(&id)
			.cloned()
			.ok_or_else(|| Error::Protocol(format!("no running server for {id:?}")))
	}

	fn spawn_process_group(cfg: &ServerConfig) -> std::io::Result<Child> {
		let mut command = Command::new(&cfg.command);
		command
			.args(&cfg.args)
			.current_dir(&cfg.root_path)
			.envs(&cfg.env)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		#[cfg(unix)]
		{
			use std::os::unix::process::CommandExt;
			// Starts the server in a new session/process group (setsid) so
			// `stop` can signal its entire descendant tree (e.g. a wrapper
			// script that forks the real analyzer) rather than only this
			// direct child.
			unsafe {
				command.pre_exec(|| {
					rustix::process::setsid().map_err(std::io::Error::from)?;
					Ok(())
				});
			}
		}

		command.spawn()
	}

	#[cfg(unix)]
	fn signal_group(pid: u32, signal: rustix::process::Signal) {
		let pid = rustix::process::Pid::from_raw(pid as i32);
		if let Some(pid) = pid {
			// Negative pid targets the process group; we started the child
			// as its own group leader via `setsid` so group pid == child pid.
			let _ = rustix::process::kill_process_group(pid, signal);
		}
	}
}

#[async_trait]
impl LspTransport for StdioTransport {
	fn events(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
		self.events_rx.lock().take().expect("events() called twice")
	}

	async fn start(&self, cfg: ServerConfig) -> Result<StartedServer> {
		let language = cfg.language.clone();
		let mut child = Self::spawn_process_group(&cfg).map_err(|e| Error::ServerStartFailed {
			language: language.clone(),
			reason: e.to_string(),
		})?;

		// Spec §4.1: verify the process is still alive immediately after
		// spawn, since exec of a missing/broken binary surfaces as an early
		// exit rather than a spawn error on some platforms.
		if let Ok(Some(status)) = child.try_wait() {
			return Err(Error::ServerStartFailed {
				language,
				reason: format!("process exited immediately with {status}"),
			});
		}

		let stdin = child.stdin.take().expect("piped stdin");
		let stdout = child.stdout.take().expect("piped stdout");
		let stderr = child.stderr.take().expect("piped stderr");

		let slot = self.ids.next();
		let id = LanguageServerId::new(slot, 0);

		let running = Arc::new(RunningServer {
			child,
			stdin: Mutex::new(stdin),
			pending: PendingTable::new(),
			language: language.clone(),
		});
		self.servers.lock().insert(id, running.clone());

		spawn_stdout_reader(id, stdout, running.clone(), self.events_tx.clone());
		spawn_stderr_reader(id, stderr, self.events_tx.clone());

		let _ = self.events_tx.send(TransportEvent::Status {
			server: id,
			status: TransportStatus::Running,
		});

		Ok(StartedServer { id })
	}

	async fn notify(&self, server: LanguageServerId, notif: AnyNotification) -> Result<()> {
		let running = self.server(server)?;
		write_message(&running, &Message::Notification(notif)).await
	}

	async fn request(
		&self,
		server: LanguageServerId,
		req: AnyRequest,
		timeout: Option<Duration>,
	) -> Result<AnyResponse> {
		let running = self.server(server)?;
		let method = req.method.clone();
		let (id, rx) = running.pending.register(method.clone());
		let wire_req = AnyRequest {
			id: RequestId::Number(id),
			method: method.clone(),
			params: req.params,
		};

		if let Err(e) = write_message(&running, &Message::Request(wire_req)).await {
			running.pending.remove(id);
			return Err(e);
		}

		let wait = timeout.unwrap_or(Duration::from_secs(30));
		match tokio_timeout(wait, rx).await {
			Ok(Ok(response)) => Ok(response),
			// Channel closed without a response: the reader task drained
			// the pending table because the server died (spec §8 P3).
			Ok(Err(_)) => Err(Error::ServerTerminated {
				language: running.language.clone(),
			}),
			Err(_) => {
				running.pending.remove(id);
				Err(Error::Timeout {
					method,
					id,
					elapsed_ms: wait.as_millis() as u64,
				})
			}
		}
	}

	async fn reply(&self, server: LanguageServerId, id: RequestId, resp: std::result::Result<JsonValue, ResponseError>) -> Result<()> {
		let running = self.server(server)?;
		let message = match resp {
			Ok(value) => Message::Response(AnyResponse::new_ok(id, value)),
			Err(err) => Message::Response(AnyResponse::new_err(id, err)),
		};
		write_message(&running, &message).await
	}

	async fn stop(&self, server: LanguageServerId) -> Result<()> {
		let running = {
			let mut servers = self.servers.lock();
			servers.remove(&server)
		};
		let Some(running) = running else {
			return Ok(());
		};

		let count = running.pending.drain_on_death(&running.language);
		tracing::info!(language = %running.language, drained = count, "stopping language server");

		#[cfg(unix)]
		{
			if let Some(pid) = running.child.id() {
				Self::signal_group(pid, rustix::process::Signal::TERM);
			}
		}

		let mut child = running.child;
		match tokio_timeout(Duration::from_secs(5), child.wait()).await {
			Ok(_) => {}
			Err(_) => {
				#[cfg(unix)]
				if let Some(pid) = child.id() {
					Self::signal_group(pid, rustix::process::Signal::KILL);
				}
				let _ = child.kill().await;
			}
		}

		let _ = self.events_tx.send(TransportEvent::Status {
			server,
			status: TransportStatus::Stopped,
		});
		Ok(())
	}
}

async fn write_message(running: &RunningServer, message: &Message) -> Result<()> {
	let bytes = encode_message(message)?;
	let mut stdin = running.stdin.lock().await;
	stdin.write_all(&bytes).await.map_err(|e| {
		tracing::debug!(error = %e, language = %running.language, "write to server stdin failed");
		Error::ServerTerminated {
			language: running.language.clone(),
		}
	})
}

fn spawn_stdout_reader(
	id: LanguageServerId,
	stdout: tokio::process::ChildStdout,
	running: Arc<RunningServer>,
	events_tx: mpsc::UnboundedSender<TransportEvent>,
) {
	tokio::spawn(async move {
		let mut reader = FramedReader::new(BufReader::new(stdout));
		loop {
			match reader.read_message().await {
				Ok(Some(Message::Response(resp))) => {
					running.pending.resolve(resp);
				}
				Ok(Some(other)) => {
					let _ = events_tx.send(TransportEvent::Message { server: id, message: other });
				}
				Ok(None) => break,
				Err(e) => {
					tracing::warn!(error = %e, "reader task terminating");
					break;
				}
			}
		}
		running.pending.drain_on_death(&running.language);
		let _ = events_tx.send(TransportEvent::Status {
			server: id,
			status: TransportStatus::Crashed,
		});
		let _ = events_tx.send(TransportEvent::Disconnected { server: id });
	});
}

fn spawn_stderr_reader(
	id: LanguageServerId,
	stderr: tokio::process::ChildStderr,
	events_tx: mpsc::UnboundedSender<TransportEvent>,
) {
	use tokio::io::AsyncBufReadExt;
	tokio::spawn(async move {
		let mut lines = BufReader::new(stderr).lines();
		while let Ok(Some(line)) = lines.next_line().await {
			let _ = events_tx.send(TransportEvent::StderrLine { server: id, line });
		}
	});
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_config_carries_root_path() {
		let cfg = ServerConfig {
			language: "rust".into(),
			command: PathBuf::from("rust-analyzer"),
			args: vec![],
			env: HashMap::new(),
			root_path: PathBuf::from("/tmp/project"),
		};
		assert_eq!(cfg.root_path, PathBuf::from("/tmp/project"));
	}
}
