//! Typed request/notification surface over one running language server
//! (spec §6 "Recognized LSP Methods").
//!
//! `ClientHandle` is a thin, `Clone`-able wrapper: all state lives behind
//! the transport, so handing a handle to a symbol-retrieval call or a
//! background task never requires cloning the server itself.

use std::sync::Arc;
use std::time::Duration;

use lsp_types::{
	CompletionParams, CompletionResponse, DocumentFormattingParams, DocumentSymbolParams,
	DocumentSymbolResponse, FormattingOptions, GotoDefinitionParams, GotoDefinitionResponse, Hover,
	HoverParams, InitializeParams, InitializeResult, Location, Position, PartialResultParams,
	ReferenceContext, ReferenceParams, RenameParams, TextDocumentIdentifier,
	TextDocumentPositionParams, TextEdit, Uri, WorkDoneProgressParams, WorkspaceEdit,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::LanguageServerId;
use super::transport::LspTransport;
use crate::error::{Error, Result};
use crate::protocol::{AnyNotification, AnyRequest, RequestId, ResponseError};

/// The offset encoding negotiated during `initialize` (spec §6, §9 OQ-1).
/// Every position this handle sends or receives is in this unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetEncoding {
	Utf8,
	Utf16,
	Utf32,
}

#[derive(Clone)]
pub struct ClientHandle {
	transport: Arc<dyn LspTransport>,
	server: LanguageServerId,
	language: Arc<str>,
	encoding: OffsetEncoding,
}

impl ClientHandle {
	pub fn new(transport: Arc<dyn LspTransport>, server: LanguageServerId, language: impl Into<Arc<str>>, encoding: OffsetEncoding) -> Self {
		Self {
			transport,
			server,
			language: language.into(),
			encoding,
		}
	}

	pub fn server_id(&self) -> LanguageServerId {
		self.server
	}

	pub fn language(&self) -> &str {
		&self.language
	}

	pub fn offset_encoding(&self) -> OffsetEncoding {
		self.encoding
	}

	async fn call<P: serde::Serialize, R: DeserializeOwned>(&self, method: &'static str, params: P, timeout: Option<Duration>) -> Result<R> {
		let req = AnyRequest {
			id: RequestId::Number(0), // overwritten by the transport's own id allocation
			method: method.to_string(),
			params: serde_json::to_value(params).map_err(|e| Error::Protocol(e.to_string()))?,
		};
		let response = self.transport.request(self.server, req, timeout).await?;
		let value = response.into_result().map_err(|err: ResponseError| Error::Lsp {
			method: method.to_string(),
			code: err.code,
			message: err.message,
			data: err.data,
		})?;
		serde_json::from_value(value).map_err(|e| Error::Protocol(format!("malformed {method} result: {e}")))
	}

	async fn notify<P: serde::Serialize>(&self, method: &'static str, params: P) -> Result<()> {
		let notif = AnyNotification {
			method: method.to_string(),
			params: serde_json::to_value(params).map_err(|e| Error::Protocol(e.to_string()))?,
		};
		self.transport.notify(self.server, notif).await
	}

	pub async fn initialize(&self, params: InitializeParams, timeout: Option<Duration>) -> Result<InitializeResult> {
		self.call("initialize", params, timeout).await
	}

	pub async fn initialized(&self) -> Result<()> {
		self.notify("initialized", lsp_types::InitializedParams {}).await
	}

	pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<()> {
		self.call::<_, Value>("shutdown", Value::Null, timeout).await?;
		Ok(())
	}

	pub async fn exit(&self) -> Result<()> {
		self.notify("exit", Value::Null).await
	}

	pub async fn did_open(&self, text_document: lsp_types::TextDocumentItem) -> Result<()> {
		self.notify("textDocument/didOpen", lsp_types::DidOpenTextDocumentParams { text_document }).await
	}

	pub async fn did_change(&self, params: lsp_types::DidChangeTextDocumentParams) -> Result<()> {
		self.notify("textDocument/didChange", params).await
	}

	pub async fn did_close(&self, uri: Uri) -> Result<()> {
		self.notify(
			"textDocument/didClose",
			lsp_types::DidCloseTextDocumentParams {
				text_document: TextDocumentIdentifier { uri },
			},
		)
		.await
	}

	pub async fn hover(&self, uri: Uri, position: Position) -> Result<Option<Hover>> {
		self.call(
			"textDocument/hover",
			HoverParams {
				text_document_position_params: TextDocumentPositionParams {
					text_document: TextDocumentIdentifier { uri },
					position,
				},
				work_done_progress_params: WorkDoneProgressParams::default(),
			},
			None,
		)
		.await
	}

	pub async fn completion(&self, uri: Uri, position: Position, context: Option<lsp_types::CompletionContext>) -> Result<Option<CompletionResponse>> {
		self.call(
			"textDocument/completion",
			CompletionParams {
				text_document_position: TextDocumentPositionParams {
					text_document: TextDocumentIdentifier { uri },
					position,
				},
				work_done_progress_params: WorkDoneProgressParams::default(),
				partial_result_params: PartialResultParams::default(),
				context,
			},
			None,
		)
		.await
	}

	pub async fn goto_definition(&self, uri: Uri, position: Position) -> Result<Option<GotoDefinitionResponse>> {
		self.call(
			"textDocument/definition",
			GotoDefinitionParams {
				text_document_position_params: TextDocumentPositionParams {
					text_document: TextDocumentIdentifier { uri },
					position,
				},
				work_done_progress_params: WorkDoneProgressParams::default(),
				partial_result_params: PartialResultParams::default(),
			},
			None,
		)
		.await
	}

	pub async fn references(&self, uri: Uri, position: Position, include_declaration: bool) -> Result<Option<Vec<Location>>> {
		self.call(
			"textDocument/references",
			ReferenceParams {
				text_document_position: TextDocumentPositionParams {
					text_document: TextDocumentIdentifier { uri },
					position,
				},
				work_done_progress_params: WorkDoneProgressParams::default(),
				partial_result_params: PartialResultParams::default(),
				context: ReferenceContext { include_declaration },
			},
			None,
		)
		.await
	}

	pub async fn document_symbol(&self, uri: Uri) -> Result<Option<DocumentSymbolResponse>> {
		self.call(
			"textDocument/documentSymbol",
			DocumentSymbolParams {
				text_document: TextDocumentIdentifier { uri },
				work_done_progress_params: WorkDoneProgressParams::default(),
				partial_result_params: PartialResultParams::default(),
			},
			None,
		)
		.await
	}

	pub async fn formatting(&self, uri: Uri, options: FormattingOptions) -> Result<Option<Vec<TextEdit>>> {
		self.call(
			"textDocument/formatting",
			DocumentFormattingParams {
				text_document: TextDocumentIdentifier { uri },
				options,
				work_done_progress_params: WorkDoneProgressParams::default(),
			},
			None,
		)
		.await
	}

	pub async fn rename(&self, uri: Uri, position: Position, new_name: String) -> Result<Option<WorkspaceEdit>> {
		self.call(
			"textDocument/rename",
			RenameParams {
				text_document_position: TextDocumentPositionParams {
					text_document: TextDocumentIdentifier { uri },
					position,
				},
				new_name,
				work_done_progress_params: WorkDoneProgressParams::default(),
			},
			None,
		)
		.await
	}

	pub async fn execute_command(&self, command: String, arguments: Vec<Value>) -> Result<Option<Value>> {
		self.call(
			"workspace/executeCommand",
			lsp_types::ExecuteCommandParams {
				command,
				arguments,
				work_done_progress_params: WorkDoneProgressParams::default(),
			},
			None,
		)
		.await
	}

	/// Replies to a server-initiated request (e.g. `workspace/configuration`).
	pub async fn reply(&self, id: RequestId, result: std::result::Result<Value, ResponseError>) -> Result<()> {
		self.transport.reply(self.server, id, result).await
	}

	/// Sends a notification with an arbitrary method/params pair verbatim,
	/// e.g. to forward a message observed on one server to a companion
	/// server (spec §4.3 "Companion servers").
	pub async fn notify_raw(&self, method: String, params: Value) -> Result<()> {
		self.transport.notify(self.server, AnyNotification { method, params }).await
	}
}
