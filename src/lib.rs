//! LSP client and symbolic code-editing core.
//!
//! This crate speaks JSON-RPC over stdio to one or more language servers,
//! exposes their documents as a unified symbol tree, and lets a caller edit
//! source files by name path (`module/Class/method`) instead of raw byte
//! offsets.
//!
//! # Module layout
//!
//! * [`protocol`] — JSON-RPC message framing and shapes.
//! * [`client`] — process transport and the typed request/notification surface.
//! * [`adapter`] — per-language-server lifecycle and behavioral profiles.
//! * [`dependency`] — locating or installing a server binary.
//! * [`buffer`] — reference-counted open-file state kept in sync with a server.
//! * [`symbol`] — the unified symbol tree, name-path matching, and retrieval.
//! * [`manager`] — [`manager::LanguageServerManager`], routing files to servers.
//! * [`editor`] — [`editor::CodeEditor`], symbol-aware source edits.
//! * [`text`] — offset-encoding-aware rope/position conversions.
//! * [`pathutil`] — URI translation, containment checks, and managed paths.

pub mod adapter;
pub mod buffer;
pub mod client;
pub mod dependency;
pub mod editor;
pub mod error;
pub mod manager;
pub mod pathutil;
pub mod protocol;
pub mod symbol;
pub mod text;

pub use editor::CodeEditor;
pub use error::{Error, Result};
pub use manager::LanguageServerManager;
