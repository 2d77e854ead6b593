//! JSON-RPC 2.0 message shapes and the LSP `Content-Length` wire framing.
//!
//! This module knows nothing about processes or transports; it only knows
//! how to turn a [`Message`] into bytes and back (spec §6, §8 P1).

mod framing;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use framing::{FramedReader, encode_message};

/// A raw, untyped JSON value — used for payloads this crate only forwards
/// or pattern-matches a few fields of (spec §9: "dynamic JSON values").
pub type JsonValue = serde_json::Value;

/// JSON-RPC request/response identifier. The core always assigns `u64` ids
/// (spec §4.1) but must be able to *read back* a string id a server might
/// echo, so both representations are retained on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
	Number(u64),
	String(String),
}

impl RequestId {
	/// The numeric id, if this is one our own id generator produced.
	pub fn as_u64(&self) -> Option<u64> {
		match self {
			RequestId::Number(n) => Some(*n),
			RequestId::String(s) => s.parse().ok(),
		}
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RequestId::Number(n) => write!(f, "{n}"),
			RequestId::String(s) => write!(f, "{s}"),
		}
	}
}

impl From<u64> for RequestId {
	fn from(n: u64) -> Self {
		RequestId::Number(n)
	}
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<JsonValue>,
}

impl fmt::Display for ResponseError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)
	}
}

impl std::error::Error for ResponseError {}

/// An outgoing or incoming JSON-RPC request (method call expecting a reply).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyRequest {
	pub id: RequestId,
	pub method: String,
	#[serde(default = "JsonValue::default")]
	pub params: JsonValue,
}

/// A JSON-RPC notification (no reply expected, no id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyNotification {
	pub method: String,
	#[serde(default = "JsonValue::default")]
	pub params: JsonValue,
}

/// A JSON-RPC response: either a successful result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyResponse {
	pub id: RequestId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<JsonValue>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
}

impl AnyResponse {
	pub fn new_ok(id: RequestId, result: JsonValue) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn new_err(id: RequestId, error: ResponseError) -> Self {
		Self {
			id,
			result: None,
			error: Some(error),
		}
	}

	pub fn into_result(self) -> std::result::Result<JsonValue, ResponseError> {
		match (self.result, self.error) {
			(Some(result), None) => Ok(result),
			(None, Some(error)) => Err(error),
			_ => Err(ResponseError {
				code: -32603,
				message: "malformed response: neither result nor error set".into(),
				data: None,
			}),
		}
	}
}

/// Any one of the three JSON-RPC message shapes, as read off the wire.
///
/// Dispatch on receipt follows spec §4.1: `id` present + `method` present is
/// an incoming request, `method` only is a notification, `id` only is a
/// response to one of our own requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Request(AnyRequest),
	Notification(AnyNotification),
	Response(AnyResponse),
}

impl Message {
	pub(crate) fn classify(raw: &JsonValue) -> Option<MessageShape> {
		let has_id = raw.get("id").is_some();
		let has_method = raw.get("method").is_some();
		match (has_id, has_method) {
			(true, true) => Some(MessageShape::Request),
			(false, true) => Some(MessageShape::Notification),
			(true, false) => Some(MessageShape::Response),
			(false, false) => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageShape {
	Request,
	Notification,
	Response,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classify_request_has_id_and_method() {
		let raw = serde_json::json!({"id": 1, "method": "textDocument/hover", "params": {}});
		assert_eq!(Message::classify(&raw), Some(MessageShape::Request));
	}

	#[test]
	fn classify_notification_has_only_method() {
		let raw = serde_json::json!({"method": "textDocument/didOpen", "params": {}});
		assert_eq!(Message::classify(&raw), Some(MessageShape::Notification));
	}

	#[test]
	fn classify_response_has_only_id() {
		let raw = serde_json::json!({"id": 1, "result": null});
		assert_eq!(Message::classify(&raw), Some(MessageShape::Response));
	}

	#[test]
	fn response_into_result_ok() {
		let resp = AnyResponse::new_ok(RequestId::Number(1), serde_json::json!({"a": 1}));
		assert!(resp.into_result().is_ok());
	}

	#[test]
	fn response_into_result_err() {
		let resp = AnyResponse::new_err(
			RequestId::Number(1),
			ResponseError {
				code: -32600,
				message: "bad".into(),
				data: None,
			},
		);
		assert!(resp.into_result().is_err());
	}

	#[test]
	fn request_id_string_parses_numeric() {
		let id = RequestId::String("42".into());
		assert_eq!(id.as_u64(), Some(42));
	}
}
