//! The closed error taxonomy surfaced across the crate (see spec §7).

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::ResponseError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Language-neutral error tags. Every fallible public entry point in this
/// crate returns one of these; there is no ad-hoc `anyhow`-style error type
/// because callers (an agent, a dashboard, a CLI) need to pattern-match on
/// the failure kind to decide whether to restart a server, retry, or give up.
#[derive(Debug, Error)]
pub enum Error {
	/// The dependency provider could not locate or install the server binary.
	#[error("language server not found for {language}: searched {searched:?}{hint}", hint = .install_hint.as_deref().map(|h| format!("; {h}")).unwrap_or_default())]
	ServerNotFound {
		language: String,
		searched: Vec<PathBuf>,
		install_hint: Option<String>,
	},

	/// The child process died during or immediately after spawn.
	#[error("language server for {language} failed to start: {reason}")]
	ServerStartFailed { language: String, reason: String },

	/// The server died after having started; every pending request for it
	/// is failed with this variant.
	#[error("language server for {language} terminated unexpectedly")]
	ServerTerminated { language: String },

	/// A single request exceeded its timeout.
	#[error("request {method} (id {id}) timed out after {elapsed_ms}ms")]
	Timeout {
		method: String,
		id: u64,
		elapsed_ms: u64,
	},

	/// The server returned a JSON-RPC error response.
	#[error("server error {code} for {method}: {message}")]
	Lsp {
		method: String,
		code: i64,
		message: String,
		data: Option<serde_json::Value>,
	},

	/// Name-path resolution found nothing.
	#[error("no symbol matching '{name_path}' in {relative_path}")]
	SymbolNotFound {
		name_path: String,
		relative_path: String,
	},

	/// Name-path resolution found more than one candidate and none could be
	/// preferred by the uniqueness rules of §4.5.
	#[error("'{name_path}' in {relative_path} is ambiguous: {candidates:?}")]
	Ambiguous {
		name_path: String,
		relative_path: String,
		candidates: Vec<String>,
	},

	/// Edits overlap, or reference a range outside the document.
	#[error("invalid edit in {uri}: {reason}")]
	InvalidEdit { uri: String, reason: String },

	/// A `WorkspaceEdit` contained a document-change kind this crate does
	/// not implement (e.g. `create`/`delete` file operations).
	#[error("unhandled workspace edit operation: {kind}")]
	UnhandledEdit { kind: String },

	/// Filesystem failure during buffer flush, rename, or install.
	#[error("io error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Malformed JSON-RPC framing or an unexpected message shape.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// A spawned task (reader thread, install task) panicked or was cancelled.
	#[error("background task failed: {0}")]
	Join(String),
}

impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Error::Io {
			path: path.into(),
			source,
		}
	}

	/// True if this error should make a caller consider the server dead
	/// (as opposed to a per-request failure it can safely retry).
	pub fn is_server_terminated(&self) -> bool {
		matches!(self, Error::ServerTerminated { .. })
	}
}

impl From<ResponseError> for Error {
	fn from(err: ResponseError) -> Self {
		Error::Lsp {
			method: String::new(),
			code: err.code,
			message: err.message,
			data: err.data,
		}
	}
}
