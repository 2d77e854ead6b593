//! Process transport and the typed request/notification surface over it
//! (spec §4.1, §4.2 is in [`crate::dependency`], §6).

mod handle;
mod pending;
pub mod transport;

pub use handle::{ClientHandle, OffsetEncoding};
pub use pending::PendingTable;
pub use transport::{LspTransport, ServerConfig, StartedServer, StdioTransport, TransportEvent, TransportStatus};

use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies one running language-server process within a [`crate::manager::LanguageServerManager`].
///
/// `generation` distinguishes a restarted server for the same language from
/// its predecessor so stale handles fail fast instead of silently talking to
/// the wrong process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguageServerId {
	pub slot: u32,
	pub generation: u32,
}

impl LanguageServerId {
	pub const fn new(slot: u32, generation: u32) -> Self {
		Self { slot, generation }
	}
}

/// Monotonic, process-wide counter used to allocate [`LanguageServerId`] slots.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator(AtomicU32);

impl IdAllocator {
	pub(crate) fn next(&self) -> u32 {
		self.0.fetch_add(1, Ordering::Relaxed)
	}
}
