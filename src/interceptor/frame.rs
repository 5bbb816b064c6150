//! Wire shapes of the kernel messages the interceptor reads and writes.

// crates.io
use serde_json::{Map, Value};
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::AuthType,
	interceptor::ChannelError,
};

/// `header.msg_type` of kernel-initiated requests.
pub const REQUEST_MSG_TYPE: &str = "colab_request";
/// `metadata.colab_request_type` of authorization requests.
pub const REQUEST_AUTH: &str = "request_auth";
/// `header.msg_type` of replies.
pub const REPLY_MSG_TYPE: &str = "input_reply";
/// `content.value.type` of replies.
pub const REPLY_VALUE_TYPE: &str = "colab_reply";
/// Messaging protocol version stamped on replies.
pub const PROTOCOL_VERSION: &str = "5.0";
/// Username stamped on replies.
pub const REPLY_USERNAME: &str = "username";
/// Channel replies are written on.
pub const REPLY_CHANNEL: &str = "stdin";

const EXECUTE_REQUEST: &str = "execute_request";
const DRIVE_MOUNT_CALL: &str = "drive.mount(";

/// Authorization request lifted off the inbound stream.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthRequest {
	/// `metadata.colab_msg_id`, echoed verbatim in the reply.
	pub correlation_id: Value,
	/// Requested authorization kind.
	pub auth_type: AuthType,
}
impl AuthRequest {
	/// Recognizes an authorization request; `None` for every other message.
	///
	/// A request without `colab_msg_id` cannot be answered and is not recognized. Neither is one
	/// whose `authType` names a kind the broker does not relay; the host keeps handling those.
	pub fn parse(text: &str) -> Option<Self> {
		let envelope = serde_json::from_str::<Envelope>(text).ok()?;

		if envelope.header.msg_type.as_deref() != Some(REQUEST_MSG_TYPE)
			|| envelope.metadata.colab_request_type.as_deref() != Some(REQUEST_AUTH)
		{
			return None;
		}

		let Some(correlation_id) = envelope.metadata.colab_msg_id else {
			tracing::warn!("Authorization request without colab_msg_id passed through.");

			return None;
		};
		let raw_auth_type =
			envelope.content.pointer("/request/authType").and_then(Value::as_str).unwrap_or_default();
		let auth_type = match raw_auth_type.parse::<AuthType>() {
			Ok(auth_type) => auth_type,
			Err(e) => {
				tracing::debug!(%correlation_id, error = %e, "Authorization request passed through.");

				return None;
			},
		};

		Some(Self { correlation_id, auth_type })
	}
}

/// Facts the interceptor needs from an outbound message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboundSummary {
	/// `header.session`, if present.
	pub session: Option<String>,
	/// True for an `execute_request` whose code calls `drive.mount(`.
	pub mounts_drive: bool,
}
impl OutboundSummary {
	/// Summarizes one outbound text frame; `None` when it is not a JSON message.
	pub fn parse(text: &str) -> Option<Self> {
		let envelope = serde_json::from_str::<Envelope>(text).ok()?;
		let mounts_drive = envelope.header.msg_type.as_deref() == Some(EXECUTE_REQUEST)
			&& envelope
				.content
				.get("code")
				.and_then(Value::as_str)
				.is_some_and(|code| code.contains(DRIVE_MOUNT_CALL));

		Some(Self { session: envelope.header.session.filter(|s| !s.is_empty()), mounts_drive })
	}
}

/// Reply to one [`AuthRequest`].
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
	/// Correlation id copied from the request.
	pub correlation_id: Value,
	/// Session id stamped in the reply header.
	pub session: String,
	/// Failure sentence; absent on success.
	pub error: Option<String>,
}
impl Reply {
	/// Encodes the reply with a fresh `msg_id` and the current UTC time.
	pub fn encode(&self) -> Result<String, ChannelError> {
		let msg_id = Uuid::new_v4().to_string();
		let wire = WireReply {
			header: WireHeader {
				msg_id: &msg_id,
				msg_type: REPLY_MSG_TYPE,
				session: &self.session,
				username: REPLY_USERNAME,
				date: OffsetDateTime::now_utc(),
				version: PROTOCOL_VERSION,
			},
			parent_header: Map::new(),
			metadata: Map::new(),
			content: WireContent {
				value: WireValue {
					kind: REPLY_VALUE_TYPE,
					colab_msg_id: &self.correlation_id,
					error: self.error.as_deref(),
				},
			},
			channel: REPLY_CHANNEL,
			buffers: &[],
		};

		serde_json::to_string(&wire).map_err(|source| ChannelError::Encode { source })
	}
}

#[derive(Deserialize)]
struct Envelope {
	#[serde(default)]
	header: EnvelopeHeader,
	#[serde(default)]
	metadata: EnvelopeMetadata,
	#[serde(default)]
	content: Value,
}

#[derive(Default, Deserialize)]
struct EnvelopeHeader {
	msg_type: Option<String>,
	session: Option<String>,
}

#[derive(Default, Deserialize)]
struct EnvelopeMetadata {
	colab_request_type: Option<String>,
	colab_msg_id: Option<Value>,
}

#[derive(Serialize)]
struct WireReply<'a> {
	header: WireHeader<'a>,
	parent_header: Map<String, Value>,
	metadata: Map<String, Value>,
	content: WireContent<'a>,
	channel: &'static str,
	buffers: &'a [Value],
}

#[derive(Serialize)]
struct WireHeader<'a> {
	msg_id: &'a str,
	msg_type: &'static str,
	session: &'a str,
	username: &'static str,
	#[serde(with = "time::serde::rfc3339")]
	date: OffsetDateTime,
	version: &'static str,
}

#[derive(Serialize)]
struct WireContent<'a> {
	value: WireValue<'a>,
}

#[derive(Serialize)]
struct WireValue<'a> {
	#[serde(rename = "type")]
	kind: &'static str,
	colab_msg_id: &'a Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<&'a str>,
}
