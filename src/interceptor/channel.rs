//! Duplex channel capability the interceptor writes through.

// self
use crate::_prelude::*;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`Channel`] operations.
pub type ChannelFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ChannelError>> + 'a + Send>>;

/// One message on the kernel channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
	/// UTF-8 text frame, normally a JSON message.
	Text(String),
	/// Opaque binary frame.
	Binary(Vec<u8>),
}
impl Frame {
	/// Text payload, if this is a text frame.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Frame::Text(text) => Some(text),
			Frame::Binary(_) => None,
		}
	}
}

/// Already-connected duplex channel to the kernel.
///
/// The connection lifecycle belongs to the caller; the interceptor only writes frames and closes
/// the channel on [`close`](crate::interceptor::MessageInterceptor::close).
pub trait Channel
where
	Self: Send + Sync,
{
	/// Writes one frame.
	fn send(&self, frame: Frame) -> ChannelFuture<'_>;

	/// Closes the channel.
	fn close(&self) -> ChannelFuture<'_>;
}

/// Failures raised while writing to the kernel channel.
#[derive(Debug, ThisError)]
pub enum ChannelError {
	/// The channel or the interceptor is already closed.
	#[error("Kernel channel is closed.")]
	Closed,
	/// The transport refused the frame.
	#[error("Failed to write to the kernel channel.")]
	Send {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// A reply frame could not be encoded.
	#[error("Failed to encode a reply frame.")]
	Encode {
		/// Serialization failure.
		#[source]
		source: serde_json::Error,
	},
}
impl ChannelError {
	/// Wraps a transport-specific write failure.
	pub fn send(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Send { source: Box::new(src) }
	}
}
