//! Per-URI file buffer registry (spec §4.4).
//!
//! Buffers are reference-counted rather than owned by a single caller: the
//! symbol retriever, the code editor, and an LSP `didChange` notifier may
//! all be looking at the same file concurrently. A buffer is evicted only
//! when its last handle closes.
//!
//! One registry is scoped to one running language server: opening a buffer
//! sends `textDocument/didOpen` on that server's connection, and every edit
//! made through the returned handle keeps that server in sync.

mod entry;

pub use entry::{BufferHandle, FileBuffer};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use lsp_types::{
	DidChangeTextDocumentParams, Position, TextDocumentContentChangeEvent, TextDocumentItem,
	TextEdit, VersionedTextDocumentIdentifier,
};
use parking_lot::Mutex;

use crate::client::ClientHandle;
use crate::error::{Error, Result};
use crate::pathutil;

/// Registry of open file buffers for one language server, keyed by
/// canonical absolute path.
///
/// Always held behind an `Arc` by callers (see [`BufferRegistry::open`]):
/// a [`BufferHandle`] keeps a [`Weak`](std::sync::Weak) reference back to it
/// so the last handle for a buffer can trigger eviction without the
/// registry needing to track handles itself.
pub struct BufferRegistry {
	client: ClientHandle,
	buffers: Mutex<HashMap<PathBuf, Arc<FileBuffer>>>,
}

impl BufferRegistry {
	pub fn new(client: ClientHandle) -> Arc<Self> {
		Arc::new(Self { client, buffers: Mutex::new(HashMap::new()) })
	}

	/// Opens (or returns the already-open) buffer for `path`, bumping its
	/// reference count. On a cold open this reads the file from disk and
	/// sends `textDocument/didOpen`; on a subsequent open it reloads from
	/// disk if the file's mtime has advanced, re-synchronizing the server
	/// with a whole-document `didChange` so it never diverges silently.
	///
	/// The returned [`BufferHandle`] must be released with
	/// [`BufferHandle::close`]; see that method's docs for why `Drop` alone
	/// cannot do this.
	pub async fn open(self: &Arc<Self>, path: &Path, language_id: &str) -> Result<BufferHandle> {
		let canonical = path.canonicalize().map_err(|e| Error::io(path, e))?;
		let existing = {
			let buffers = self.buffers.lock();
			buffers.get(&canonical).cloned()
		};

		let buffer = match existing {
			Some(buffer) => {
				if buffer.reload_if_stale()? {
					self.resync_whole_document(&buffer).await?;
				}
				buffer
			}
			None => {
				let uri = pathutil::uri_from_path(&canonical)
					.ok_or_else(|| Error::Protocol(format!("{} has no file:// URI", canonical.display())))?;
				let buffer = Arc::new(FileBuffer::load(&canonical, uri.clone(), language_id)?);
				self.client
					.did_open(TextDocumentItem {
						uri,
						language_id: language_id.to_string(),
						version: buffer.version() as i32,
						text: buffer.text().to_string(),
					})
					.await?;
				self.buffers.lock().insert(canonical.clone(), buffer.clone());
				buffer
			}
		};

		buffer.refcount.fetch_add(1, Ordering::SeqCst);
		Ok(BufferHandle::new(buffer, Arc::downgrade(self), canonical))
	}

	async fn resync_whole_document(&self, buffer: &FileBuffer) -> Result<()> {
		self.client
			.did_change(DidChangeTextDocumentParams {
				text_document: VersionedTextDocumentIdentifier { uri: buffer.uri.clone(), version: buffer.version() as i32 },
				content_changes: vec![TextDocumentContentChangeEvent { range: None, range_length: None, text: buffer.text().to_string() }],
			})
			.await
	}

	/// Inserts text at `position`, notifying the server with an incremental
	/// `didChange` covering just the inserted point range (spec §4.4).
	pub async fn insert_text_at(&self, handle: &BufferHandle, position: Position, text: &str) -> Result<()> {
		let buffer = handle.buffer();
		let (range, version) = buffer.apply_insert(position, text, self.client.offset_encoding());
		self.notify_change(buffer, range, version, text.to_string()).await
	}

	/// Deletes `[start, end)`, notifying the server with an incremental
	/// `didChange` covering the deleted range (spec §4.4).
	pub async fn delete_text_between(&self, handle: &BufferHandle, start: Position, end: Position) -> Result<()> {
		let buffer = handle.buffer();
		let (range, version) = buffer.apply_delete(start, end, self.client.offset_encoding())?;
		self.notify_change(buffer, range, version, String::new()).await
	}

	/// Applies a batch of `TextEdit`s (spec §3 "Workspace Edit Operation"),
	/// sending one incremental `didChange` content-change event per edit, in
	/// the same reverse-start-position order they were applied in.
	pub async fn apply_text_edits(&self, handle: &BufferHandle, edits: &[TextEdit]) -> Result<()> {
		let buffer = handle.buffer();
		let (applied, version) = buffer.apply_text_edits(edits, self.client.offset_encoding())?;
		if applied.is_empty() {
			return Ok(());
		}
		let content_changes = applied
			.into_iter()
			.map(|edit| TextDocumentContentChangeEvent {
				range: Some(edit.range),
				range_length: None,
				text: edit.new_text,
			})
			.collect();
		self.client
			.did_change(DidChangeTextDocumentParams {
				text_document: VersionedTextDocumentIdentifier { uri: buffer.uri.clone(), version: version as i32 },
				content_changes,
			})
			.await
	}

	async fn notify_change(&self, buffer: &FileBuffer, range: lsp_types::Range, version: u64, text: String) -> Result<()> {
		self.client
			.did_change(DidChangeTextDocumentParams {
				text_document: VersionedTextDocumentIdentifier { uri: buffer.uri.clone(), version: version as i32 },
				content_changes: vec![TextDocumentContentChangeEvent { range: Some(range), range_length: None, text }],
			})
			.await
	}

	/// Releases one reference to `path`'s buffer. If it was the last
	/// reference, flushes unwritten edits to disk and sends
	/// `textDocument/didClose`. This is what [`BufferHandle::close`] calls;
	/// exposed here too so a caller holding only a path can force-close.
	pub async fn close(&self, mut handle: BufferHandle) -> Result<()> {
		let buffer = handle.buffer.clone();
		let remaining = buffer.refcount.fetch_sub(1, Ordering::SeqCst) - 1;
		handle.closed = true;
		if remaining == 0 {
			if buffer.is_dirty() {
				buffer.flush()?;
			}
			self.client.did_close(buffer.uri.clone()).await?;
			self.evict_if_unreferenced(&handle.path);
		}
		Ok(())
	}

	/// Returns a currently-open buffer without opening it, if present.
	pub fn get(&self, path: &Path) -> Option<Arc<FileBuffer>> {
		let canonical = path.canonicalize().ok()?;
		self.buffers.lock().get(&canonical).cloned()
	}

	pub fn len(&self) -> usize {
		self.buffers.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub(crate) fn evict_if_unreferenced(&self, path: &Path) {
		let mut buffers = self.buffers.lock();
		if let Some(buffer) = buffers.get(path)
			&& buffer.refcount.load(Ordering::SeqCst) == 0
		{
			buffers.remove(path);
		}
	}

	/// Drops a path's entry without flushing or notifying the server, for
	/// when the caller has already handled the file's disk state itself
	/// (e.g. a workspace edit's `RenameFile`/`DeleteFile` resource
	/// operation, spec §4.7). Outstanding handles remain valid but will no
	/// longer be found by [`BufferRegistry::get`] or a later [`open`](Self::open).
	pub(crate) fn forget(&self, path: &Path) {
		self.buffers.lock().remove(path);
	}

	/// Rekeys an open buffer from `old_canonical` to `new_canonical` after the
	/// caller has already renamed the file on disk (spec §4.7 `RenameFile`
	/// resource operation): flushes any unsaved edits to the new location,
	/// sends `didClose` for the old URI and `didOpen` for the new one, and
	/// swaps the map entry. A no-op if `old_canonical` was not open.
	pub(crate) async fn rename(&self, old_canonical: &Path, new_canonical: &Path) -> Result<()> {
		let existing = self.buffers.lock().remove(old_canonical);
		let Some(buffer) = existing else {
			return Ok(());
		};
		if buffer.is_dirty() {
			buffer.flush_to(new_canonical)?;
		}
		self.client.did_close(buffer.uri.clone()).await?;

		let new_uri = pathutil::uri_from_path(new_canonical)
			.ok_or_else(|| Error::Protocol(format!("{} has no file:// URI", new_canonical.display())))?;
		let refreshed = Arc::new(FileBuffer::load(new_canonical, new_uri.clone(), buffer.language_id.clone())?);
		self.client
			.did_open(TextDocumentItem {
				uri: new_uri,
				language_id: refreshed.language_id.clone(),
				version: refreshed.version() as i32,
				text: refreshed.text().to_string(),
			})
			.await?;
		self.buffers.lock().insert(new_canonical.to_path_buf(), refreshed);
		Ok(())
	}

	/// Flushes and closes every open buffer, sending `textDocument/didClose`
	/// for each, regardless of outstanding reference counts. Used when a
	/// language server is being torn down entirely (spec §4.6
	/// `remove_language`/`stop_all`).
	pub async fn close_all(&self) -> Result<()> {
		let buffers: Vec<Arc<FileBuffer>> = self.buffers.lock().drain().map(|(_, buffer)| buffer).collect();
		for buffer in buffers {
			if buffer.is_dirty() {
				buffer.flush()?;
			}
			self.client.did_close(buffer.uri.clone()).await?;
		}
		Ok(())
	}
}

pub(crate) type RegistryRef = std::sync::Weak<BufferRegistry>;

impl entry::BufferHandle {
	/// Releases this handle through its owning registry: flushes and sends
	/// `textDocument/didClose` if this was the last reference. Prefer this
	/// over letting the handle drop, since `Drop` cannot await the server
	/// notification.
	pub async fn close(self) -> Result<()> {
		let registry = self
			.registry
			.upgrade()
			.ok_or_else(|| Error::Protocol("buffer registry dropped before handle closed".to_string()))?;
		registry.close(self).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::transport::{LspTransport, ServerConfig, StartedServer, TransportEvent};
	use crate::client::{LanguageServerId, OffsetEncoding};
	use crate::protocol::{AnyNotification, AnyRequest, AnyResponse, JsonValue, RequestId, ResponseError};
	use async_trait::async_trait;
	use std::fs;
	use tokio::sync::{Mutex as AsyncMutex, mpsc};

	/// A transport double that just records every notification it receives,
	/// used to assert on the `didOpen`/`didChange`/`didClose` sequence a
	/// buffer registry sends without needing a real server process.
	struct RecordingTransport {
		notifications: AsyncMutex<Vec<AnyNotification>>,
	}

	impl RecordingTransport {
		fn new() -> Arc<Self> {
			Arc::new(Self { notifications: AsyncMutex::new(Vec::new()) })
		}
	}

	#[async_trait]
	impl LspTransport for RecordingTransport {
		fn events(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
			let (_tx, rx) = mpsc::unbounded_channel();
			rx
		}

		async fn start(&self, _cfg: ServerConfig) -> Result<StartedServer> {
			unreachable!("not used in buffer registry tests")
		}

		async fn notify(&self, _server: LanguageServerId, notif: AnyNotification) -> Result<()> {
			self.notifications.lock().await.push(notif);
			Ok(())
		}

		async fn request(&self, _server: LanguageServerId, _req: AnyRequest, _timeout: Option<std::time::Duration>) -> Result<AnyResponse> {
			unreachable!("not used in buffer registry tests")
		}

		async fn reply(&self, _server: LanguageServerId, _id: RequestId, _resp: std::result::Result<JsonValue, ResponseError>) -> Result<()> {
			Ok(())
		}

		async fn stop(&self, _server: LanguageServerId) -> Result<()> {
			Ok(())
		}
	}

	fn test_client(transport: Arc<RecordingTransport>) -> ClientHandle {
		ClientHandle::new(transport, LanguageServerId::new(0, 0), "rust", OffsetEncoding::Utf16)
	}

	#[tokio::test]
	async fn open_sends_did_open_and_close_sends_did_close() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("a.rs");
		fs::write(&file, "fn main() {}\n").unwrap();

		let transport = RecordingTransport::new();
		let registry = BufferRegistry::new(test_client(transport.clone()));
		let handle = registry.open(&file, "rust").await.unwrap();
		assert_eq!(registry.len(), 1);

		handle.close().await.unwrap();
		assert_eq!(registry.len(), 0);

		let notifications = transport.notifications.lock().await;
		assert_eq!(notifications[0].method, "textDocument/didOpen");
		assert_eq!(notifications.last().unwrap().method, "textDocument/didClose");
	}

	#[tokio::test]
	async fn second_open_shares_buffer_and_skips_did_open() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("a.rs");
		fs::write(&file, "fn main() {}\n").unwrap();

		let transport = RecordingTransport::new();
		let registry = BufferRegistry::new(test_client(transport.clone()));
		let h1 = registry.open(&file, "rust").await.unwrap();
		let h2 = registry.open(&file, "rust").await.unwrap();
		assert_eq!(registry.len(), 1);

		h1.close().await.unwrap();
		assert_eq!(registry.len(), 1, "buffer stays open while h2 is alive");
		h2.close().await.unwrap();
		assert_eq!(registry.len(), 0);

		let did_opens = transport.notifications.lock().await.iter().filter(|n| n.method == "textDocument/didOpen").count();
		assert_eq!(did_opens, 1);
	}

	#[tokio::test]
	async fn insert_text_at_sends_incremental_did_change() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("a.rs");
		fs::write(&file, "fn main() {}\n").unwrap();

		let transport = RecordingTransport::new();
		let registry = BufferRegistry::new(test_client(transport.clone()));
		let handle = registry.open(&file, "rust").await.unwrap();

		registry.insert_text_at(&handle, Position { line: 0, character: 0 }, "// hi\n").await.unwrap();
		assert_eq!(handle.buffer().text().to_string(), "// hi\nfn main() {}\n");
		assert!(handle.buffer().is_dirty());

		let notifications = transport.notifications.lock().await;
		let did_change = notifications.iter().find(|n| n.method == "textDocument/didChange").unwrap();
		let params: DidChangeTextDocumentParams = serde_json::from_value(did_change.params.clone()).unwrap();
		assert_eq!(params.content_changes.len(), 1);
		assert_eq!(params.content_changes[0].text, "// hi\n");
		drop(notifications);

		handle.close().await.unwrap();
	}

	#[tokio::test]
	async fn apply_text_edits_rejects_overlap_without_mutating() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("a.rs");
		fs::write(&file, "abcdef\n").unwrap();

		let transport = RecordingTransport::new();
		let registry = BufferRegistry::new(test_client(transport.clone()));
		let handle = registry.open(&file, "rust").await.unwrap();

		let edits = vec![
			TextEdit {
				range: lsp_types::Range {
					start: Position { line: 0, character: 0 },
					end: Position { line: 0, character: 3 },
				},
				new_text: "XYZ".to_string(),
			},
			TextEdit {
				range: lsp_types::Range {
					start: Position { line: 0, character: 2 },
					end: Position { line: 0, character: 5 },
				},
				new_text: "QQQ".to_string(),
			},
		];
		let err = registry.apply_text_edits(&handle, &edits).await.unwrap_err();
		assert!(matches!(err, Error::InvalidEdit { .. }));
		assert_eq!(handle.buffer().text().to_string(), "abcdef\n", "rejected batch must not mutate");

		handle.close().await.unwrap();
	}

	#[tokio::test]
	async fn reload_after_external_disk_change_resyncs_with_full_document_change() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("a.rs");
		fs::write(&file, "one\n").unwrap();

		let transport = RecordingTransport::new();
		let registry = BufferRegistry::new(test_client(transport.clone()));
		let h1 = registry.open(&file, "rust").await.unwrap();

		std::thread::sleep(std::time::Duration::from_millis(10));
		fs::write(&file, "two\n").unwrap();

		let h2 = registry.open(&file, "rust").await.unwrap();
		assert_eq!(h2.buffer().text().to_string(), "two\n");

		let did_changes = transport.notifications.lock().await.iter().filter(|n| n.method == "textDocument/didChange").count();
		assert_eq!(did_changes, 1, "stale reload on second open should resync once");

		h1.close().await.unwrap();
		h2.close().await.unwrap();
	}
}
