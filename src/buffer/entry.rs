use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::SystemTime;

use lsp_types::{Position, Range, TextEdit, Uri};
use parking_lot::RwLock;
use ropey::Rope;

use super::RegistryRef;
use crate::client::OffsetEncoding;
use crate::error::{Error, Result};
use crate::text;

/// One open file's content, with the bookkeeping needed to detect an
/// out-of-band disk change and to version LSP `didChange` notifications
/// (spec §3 "File Buffer", §4.4).
pub struct FileBuffer {
	pub path: PathBuf,
	pub uri: Uri,
	pub language_id: String,
	rope: RwLock<Rope>,
	/// Bumped on every in-memory edit; sent as `TextDocumentItem::version`.
	version: AtomicU64,
	disk_mtime_nanos: AtomicI64,
	dirty: AtomicBool,
	pub(crate) refcount: AtomicU32,
}

impl FileBuffer {
	pub(crate) fn load(path: &Path, uri: Uri, language_id: impl Into<String>) -> Result<Self> {
		let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
		let mtime = mtime_nanos(path)?;
		Ok(Self {
			path: path.to_path_buf(),
			uri,
			language_id: language_id.into(),
			rope: RwLock::new(Rope::from_str(&contents)),
			version: AtomicU64::new(1),
			disk_mtime_nanos: AtomicI64::new(mtime),
			dirty: AtomicBool::new(false),
			refcount: AtomicU32::new(0),
		})
	}

	pub fn text(&self) -> Rope {
		self.rope.read().clone()
	}

	pub fn version(&self) -> u64 {
		self.version.load(Ordering::SeqCst)
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty.load(Ordering::SeqCst)
	}

	/// Replaces the buffer's content with an in-memory edit, bumping the
	/// version. Does not touch the file on disk.
	pub fn set_text(&self, new_text: Rope) -> u64 {
		*self.rope.write() = new_text;
		self.dirty.store(true, Ordering::SeqCst);
		self.version.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// Inserts `text_to_insert` at `position`, returning the point range that
	/// was touched (for the `didChange` notification) and the new version
	/// (spec §4.4 `insert_text_at`).
	pub fn apply_insert(&self, position: Position, text_to_insert: &str, encoding: OffsetEncoding) -> (Range, u64) {
		let mut rope = self.rope.write();
		let char_idx = text::lsp_position_to_char(&rope, position, encoding);
		rope.insert(char_idx, text_to_insert);
		drop(rope);
		self.dirty.store(true, Ordering::SeqCst);
		let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
		(Range { start: position, end: position }, version)
	}

	/// Deletes `[start, end)`, returning the deleted range and new version
	/// (spec §4.4 `delete_text_between`). Fails if `start` is after `end`.
	pub fn apply_delete(&self, start: Position, end: Position, encoding: OffsetEncoding) -> Result<(Range, u64)> {
		if (start.line, start.character) > (end.line, end.character) {
			return Err(Error::InvalidEdit {
				uri: self.uri.as_str().to_string(),
				reason: format!("delete range start {start:?} is after end {end:?}"),
			});
		}
		let mut rope = self.rope.write();
		let start_idx = text::lsp_position_to_char(&rope, start, encoding);
		let end_idx = text::lsp_position_to_char(&rope, end, encoding);
		rope.remove(start_idx..end_idx);
		drop(rope);
		self.dirty.store(true, Ordering::SeqCst);
		let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
		Ok((Range { start, end }, version))
	}

	/// Applies a batch of `TextEdit`s in reverse start-position order so
	/// earlier offsets stay valid while later-in-document edits are applied
	/// first (spec §3 "Workspace Edit Operation", §4.4, §8 P6). Overlapping
	/// edits are rejected before any mutation happens, so a rejected batch
	/// leaves the buffer untouched. Returns the edits in the order they were
	/// applied plus the new version.
	pub fn apply_text_edits(&self, edits: &[TextEdit], encoding: OffsetEncoding) -> Result<(Vec<TextEdit>, u64)> {
		if edits.is_empty() {
			return Ok((Vec::new(), self.version()));
		}
		let snapshot = self.rope.read().clone();
		let mut spans: Vec<(std::ops::Range<usize>, &TextEdit)> =
			edits.iter().map(|edit| (text::lsp_range_to_char(&snapshot, edit.range, encoding), edit)).collect();
		spans.sort_by(|a, b| b.0.start.cmp(&a.0.start));

		for pair in spans.windows(2) {
			let (later, earlier) = (&pair[0].0, &pair[1].0);
			if later.start < earlier.end {
				return Err(Error::InvalidEdit {
					uri: self.uri.as_str().to_string(),
					reason: format!("overlapping edits at {earlier:?} and {later:?}"),
				});
			}
		}

		let mut rope = self.rope.write();
		let mut applied = Vec::with_capacity(spans.len());
		for (range, edit) in &spans {
			rope.remove(range.clone());
			rope.insert(range.start, &edit.new_text);
			applied.push((*edit).clone());
		}
		drop(rope);
		self.dirty.store(true, Ordering::SeqCst);
		let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
		Ok((applied, version))
	}

	/// Writes the current in-memory content to disk and refreshes the
	/// tracked mtime so the next `reload_if_stale` doesn't mistake our own
	/// write for an external change.
	pub fn flush(&self) -> Result<()> {
		let text = self.rope.read().to_string();
		fs::write(&self.path, text).map_err(|e| Error::io(&self.path, e))?;
		let mtime = mtime_nanos(&self.path)?;
		self.disk_mtime_nanos.store(mtime, Ordering::SeqCst);
		self.dirty.store(false, Ordering::SeqCst);
		Ok(())
	}

	/// Writes the current in-memory content to a *different* path, for a
	/// `RenameFile` resource operation where the buffer's own path no longer
	/// exists by the time this runs (spec §4.7). Does not touch this
	/// buffer's own tracked mtime; the caller discards this instance after.
	pub(crate) fn flush_to(&self, path: &Path) -> Result<()> {
		let text = self.rope.read().to_string();
		fs::write(path, text).map_err(|e| Error::io(path, e))
	}

	/// Reloads from disk if the file's mtime has advanced past what this
	/// buffer last observed, discarding any unflushed in-memory edits.
	/// Returns `true` if a reload happened, so the caller can decide
	/// whether to re-synchronize the server with a full-document `didChange`.
	pub fn reload_if_stale(&self) -> Result<bool> {
		let current_mtime = mtime_nanos(&self.path)?;
		if current_mtime <= self.disk_mtime_nanos.load(Ordering::SeqCst) {
			return Ok(false);
		}
		let contents = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
		*self.rope.write() = Rope::from_str(&contents);
		self.disk_mtime_nanos.store(current_mtime, Ordering::SeqCst);
		self.dirty.store(false, Ordering::SeqCst);
		self.version.fetch_add(1, Ordering::SeqCst);
		Ok(true)
	}
}

fn mtime_nanos(path: &Path) -> Result<i64> {
	let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
	let modified = metadata.modified().map_err(|e| Error::io(path, e))?;
	let duration = modified.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
	Ok(duration.as_nanos() as i64)
}

/// A refcounted handle onto one [`FileBuffer`]. Registry-visible state (flush
/// to disk, `textDocument/didClose`) is only mutated through
/// [`BufferHandle::close`] — `Drop` is a synchronous best-effort fallback for
/// a handle a caller forgot to close explicitly, since Rust has no async
/// `Drop` to run the notification in.
pub struct BufferHandle {
	pub(crate) buffer: std::sync::Arc<FileBuffer>,
	pub(crate) registry: RegistryRef,
	pub(crate) path: PathBuf,
	pub(crate) closed: bool,
}

impl BufferHandle {
	pub(crate) fn new(buffer: std::sync::Arc<FileBuffer>, registry: RegistryRef, path: PathBuf) -> Self {
		Self { buffer, registry, path, closed: false }
	}

	pub fn buffer(&self) -> &FileBuffer {
		&self.buffer
	}
}

impl Clone for BufferHandle {
	fn clone(&self) -> Self {
		self.buffer.refcount.fetch_add(1, Ordering::SeqCst);
		Self {
			buffer: self.buffer.clone(),
			registry: self.registry.clone(),
			path: self.path.clone(),
			closed: false,
		}
	}
}

impl Drop for BufferHandle {
	fn drop(&mut self) {
		if self.closed {
			return;
		}
		let remaining = self.buffer.refcount.fetch_sub(1, Ordering::SeqCst) - 1;
		if remaining == 0 {
			tracing::warn!(path = %self.path.display(), "buffer handle dropped without calling close(); skipping flush/didClose");
			if let Some(registry) = self.registry.upgrade() {
				registry.evict_if_unreferenced(&self.path);
			}
		}
	}
}
