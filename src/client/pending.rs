//! The pending-request table (spec §3 "Pending Request", §5 "Shared resources").
//!
//! Each in-flight request owns a `oneshot` channel; the reader task resolves
//! it by id when a response arrives, the writer task's caller awaits it
//! (the async equivalent of the "blocking caller thread + condvar" model
//! spec §4.1 describes — see spec §9 DESIGN NOTES).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::protocol::{AnyResponse, RequestId};

struct Entry {
	method: String,
	reply: oneshot::Sender<AnyResponse>,
}

/// Tracks requests awaiting a response from one language-server process.
pub struct PendingTable {
	next_id: AtomicU64,
	entries: Mutex<HashMap<u64, Entry>>,
}

impl Default for PendingTable {
	fn default() -> Self {
		Self::new()
	}
}

impl PendingTable {
	pub fn new() -> Self {
		Self {
			next_id: AtomicU64::new(1),
			entries: Mutex::new(HashMap::new()),
		}
	}

	/// Allocates the next request id (monotonically increasing, no gaps
	/// relative to caller observation order — spec §8 P2) and registers a
	/// pending entry, returning the id and a receiver for the eventual
	/// response.
	pub fn register(&self, method: impl Into<String>) -> (u64, oneshot::Receiver<AnyResponse>) {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.entries.lock().insert(
			id,
			Entry {
				method: method.into(),
				reply: tx,
			},
		);
		(id, rx)
	}

	/// Removes and returns the method name for a pending id, without
	/// resolving it. Used by the timeout path, which fails the single
	/// request and discards any late response that may still arrive.
	pub fn remove(&self, id: u64) -> Option<String> {
		self.entries.lock().remove(&id).map(|e| e.method)
	}

	/// Resolves a pending request by id with the response the server sent.
	/// Returns `false` (and logs) if no pending entry matches — the request
	/// already timed out, or the server echoed a stale/unknown id.
	pub fn resolve(&self, response: AnyResponse) -> bool {
		let Some(numeric_id) = response.id.as_u64() else {
			tracing::debug!(id = %response.id, "response id is not numeric, dropping");
			return false;
		};
		let entry = self.entries.lock().remove(&numeric_id);
		match entry {
			Some(entry) => {
				// The receiver may already be gone if the caller timed out
				// between the lookup above and this send; that's fine.
				let _ = entry.reply.send(response);
				true
			}
			None => {
				tracing::debug!(id = numeric_id, "late or unknown response, discarding");
				false
			}
		}
	}

	/// Drains every pending entry, failing each waiting caller with
	/// `ServerTerminated` (spec §8 P3). Returns the number drained.
	pub fn drain_on_death(&self, language: &str) -> usize {
		let drained: Vec<Entry> = self.entries.lock().drain().map(|(_, entry)| entry).collect();
		let count = drained.len();
		for entry in drained {
			// We can't send an Error through `oneshot::Sender<AnyResponse>`,
			// so termination is signaled out-of-band: dropping the sender
			// closes the channel, and `ClientHandle::request` distinguishes
			// "channel closed without a response" from "response received"
			// and maps the former to `ServerTerminated`.
			drop(entry);
		}
		tracing::info!(language, count, "drained pending requests on server termination");
		count
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub(crate) fn method_for(&self, id: u64) -> Option<String> {
		self.entries.lock().get(&id).map(|e| e.method.clone())
	}
}

/// Maps a closed, unresolved oneshot channel to the crate's termination
/// error kind.
pub(crate) fn terminated_error(language: &str) -> Error {
	Error::ServerTerminated {
		language: language.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_monotonic_with_no_gaps() {
		let table = PendingTable::new();
		let mut ids = Vec::new();
		for _ in 0..10 {
			let (id, _rx) = table.register("textDocument/hover");
			ids.push(id);
		}
		let mut sorted = ids.clone();
		sorted.sort_unstable();
		assert_eq!(ids, sorted);
		for window in sorted.windows(2) {
			assert_eq!(window[1] - window[0], 1);
		}
	}

	#[tokio::test]
	async fn resolve_delivers_response_to_waiting_receiver() {
		let table = PendingTable::new();
		let (id, rx) = table.register("initialize");
		let resp = AnyResponse::new_ok(RequestId::Number(id), serde_json::json!({"ok": true}));
		assert!(table.resolve(resp));
		let received = rx.await.unwrap();
		assert_eq!(received.id, RequestId::Number(id));
	}

	#[test]
	fn resolve_unknown_id_returns_false() {
		let table = PendingTable::new();
		let resp = AnyResponse::new_ok(RequestId::Number(999), serde_json::json!(null));
		assert!(!table.resolve(resp));
	}

	#[tokio::test]
	async fn drain_on_death_empties_table_and_closes_channels() {
		let table = PendingTable::new();
		let (_id1, rx1) = table.register("a");
		let (_id2, rx2) = table.register("b");
		assert_eq!(table.len(), 2);
		let drained = table.drain_on_death("rust");
		assert_eq!(drained, 2);
		assert!(table.is_empty());
		assert!(rx1.await.is_err());
		assert!(rx2.await.is_err());
	}

	#[test]
	fn remove_discards_without_resolving() {
		let table = PendingTable::new();
		let (id, _rx) = table.register("textDocument/definition");
		let method = table.remove(id);
		assert_eq!(method.as_deref(), Some("textDocument/definition"));
		assert!(table.is_empty());
	}
}
