//! `Content-Length: N\r\n\r\n<body>` framing over an async byte stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::{Message, MessageShape};
use crate::error::{Error, Result};

/// Serializes a [`Message`] into a length-framed wire payload.
///
/// The caller is responsible for writing the returned bytes atomically
/// (header and body together) under a single lock — interleaving two
/// concurrent writes corrupts the framing for every subsequent reader
/// (spec §4.1).
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
	let body = serde_json::to_vec(message).map_err(|e| Error::Protocol(e.to_string()))?;
	let mut framed = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
	framed.extend_from_slice(&body);
	Ok(framed)
}

/// Reads successive framed JSON-RPC messages off an async reader.
///
/// One `FramedReader` is driven by exactly one reader task; it has no
/// internal concurrency of its own (spec §4.1 "two reader threads").
pub struct FramedReader<R> {
	inner: R,
}

impl<R: AsyncBufRead + Unpin> FramedReader<R> {
	pub fn new(inner: R) -> Self {
		Self { inner }
	}

	/// Reads one framed message, or `Ok(None)` on clean EOF before any
	/// header bytes were read (the expected shutdown path). An EOF in the
	/// middle of a header or body is an error — the server died mid-message.
	pub async fn read_message(&mut self) -> Result<Option<Message>> {
		let Some(content_length) = self.read_headers().await? else {
			return Ok(None);
		};

		let mut body = vec![0u8; content_length];
		self.read_exact_or_terminated(&mut body).await?;

		let raw: serde_json::Value =
			serde_json::from_slice(&body).map_err(|e| Error::Protocol(format!("invalid JSON body: {e}")))?;

		match Message::classify(&raw) {
			Some(MessageShape::Request | MessageShape::Notification | MessageShape::Response) => {
				let message = serde_json::from_value(raw).map_err(|e| Error::Protocol(format!("malformed message: {e}")))?;
				Ok(Some(message))
			}
			None => Err(Error::Protocol(format!(
				"message has neither `id` nor `method`: {raw}"
			))),
		}
	}

	/// Reads `Content-Length: N\r\n` header lines up to the blank line that
	/// terminates the header block. Unknown headers (e.g. `Content-Type`)
	/// are tolerated and ignored.
	async fn read_headers(&mut self) -> Result<Option<usize>> {
		let mut content_length: Option<usize> = None;
		let mut saw_any_header_byte = false;
		loop {
			let mut line = String::new();
			let bytes_read = self
				.inner
				.read_line(&mut line)
				.await
				.map_err(Error::from_io_headers)?;
			if bytes_read == 0 {
				if saw_any_header_byte {
					return Err(Error::Protocol(
						"server closed connection mid-header".into(),
					));
				}
				return Ok(None);
			}
			saw_any_header_byte = true;
			let trimmed = line.trim_end_matches(['\r', '\n']);
			if trimmed.is_empty() {
				break;
			}
			if let Some((name, value)) = trimmed.split_once(':') {
				if name.trim().eq_ignore_ascii_case("content-length") {
					content_length = Some(
						value
							.trim()
							.parse()
							.map_err(|_| Error::Protocol(format!("invalid Content-Length: {value}")))?,
					);
				}
			}
		}
		content_length
			.map(Some)
			.ok_or_else(|| Error::Protocol("message header is missing Content-Length".into()))
	}

	async fn read_exact_or_terminated(&mut self, buf: &mut [u8]) -> Result<()> {
		self.inner.read_exact(buf).await.map_err(|e| {
			if e.kind() == std::io::ErrorKind::UnexpectedEof {
				Error::Protocol("server closed connection mid-body".into())
			} else {
				Error::Protocol(format!("io error reading body: {e}"))
			}
		})
	}
}

impl Error {
	fn from_io_headers(e: std::io::Error) -> Error {
		Error::Protocol(format!("io error reading headers: {e}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::{AnyNotification, AnyRequest, AnyResponse, RequestId};

	#[tokio::test]
	async fn request_round_trips() {
		let message = Message::Request(AnyRequest {
			id: RequestId::Number(7),
			method: "textDocument/hover".into(),
			params: serde_json::json!({"x": 1}),
		});
		let bytes = encode_message(&message).unwrap();
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(bytes)));
		let decoded = reader.read_message().await.unwrap().unwrap();
		match decoded {
			Message::Request(req) => {
				assert_eq!(req.id, RequestId::Number(7));
				assert_eq!(req.method, "textDocument/hover");
			}
			other => panic!("expected request, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn notification_round_trips() {
		let message = Message::Notification(AnyNotification {
			method: "textDocument/didOpen".into(),
			params: serde_json::json!({}),
		});
		let bytes = encode_message(&message).unwrap();
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(bytes)));
		let decoded = reader.read_message().await.unwrap().unwrap();
		assert!(matches!(decoded, Message::Notification(_)));
	}

	#[tokio::test]
	async fn response_round_trips() {
		let message = Message::Response(AnyResponse::new_ok(RequestId::Number(3), serde_json::json!(null)));
		let bytes = encode_message(&message).unwrap();
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(bytes)));
		let decoded = reader.read_message().await.unwrap().unwrap();
		assert!(matches!(decoded, Message::Response(_)));
	}

	#[tokio::test]
	async fn clean_eof_before_any_bytes_returns_none() {
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(Vec::<u8>::new())));
		assert!(reader.read_message().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn eof_mid_header_is_an_error() {
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(b"Content-Length: 10".to_vec())));
		assert!(reader.read_message().await.is_err());
	}

	#[tokio::test]
	async fn eof_mid_body_is_an_error() {
		let header = b"Content-Length: 100\r\n\r\n{\"id\":1".to_vec();
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(header)));
		assert!(reader.read_message().await.is_err());
	}

	#[tokio::test]
	async fn two_messages_back_to_back() {
		let a = Message::Notification(AnyNotification {
			method: "a".into(),
			params: serde_json::json!({}),
		});
		let b = Message::Notification(AnyNotification {
			method: "b".into(),
			params: serde_json::json!({}),
		});
		let mut bytes = encode_message(&a).unwrap();
		bytes.extend(encode_message(&b).unwrap());
		let mut reader = FramedReader::new(tokio::io::BufReader::new(std::io::Cursor::new(bytes)));
		let first = reader.read_message().await.unwrap().unwrap();
		let second = reader.read_message().await.unwrap().unwrap();
		match (first, second) {
			(Message::Notification(a), Message::Notification(b)) => {
				assert_eq!(a.method, "a");
				assert_eq!(b.method, "b");
			}
			_ => panic!("expected two notifications"),
		}
	}
}
