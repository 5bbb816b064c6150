//! Protocol-message interceptor on the kernel channel.
//!
//! The interceptor wraps an already-connected [`Channel`] by composition. The host's reader loop
//! hands every inbound frame to [`MessageInterceptor::on_inbound`] in arrival order and forwards
//! whatever comes back; authorization requests are swallowed and answered with exactly one reply
//! frame once their orchestration settles. Outbound traffic goes through
//! [`MessageInterceptor::send`], which also remembers the kernel session and raises the
//! `drive.mount(` advisory once.

pub mod advisory;
pub mod channel;
pub mod frame;

pub use advisory::*;
pub use channel::*;
pub use frame::*;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio_util::task::TaskTracker;
use uuid::Uuid;
// self
use crate::{_prelude::*, consent::Authorize};

/// Where the `session` of reply headers comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySessionMode {
	/// Mint a fresh session id for every reply.
	Generated,
	/// Reuse the session of the first outbound message, minting one until such a message is seen.
	#[default]
	Outbound,
}

/// Interceptor that answers kernel authorization requests on the kernel's own channel.
///
/// Cloning is cheap and every clone drives the same channel.
#[derive(Clone)]
pub struct MessageInterceptor {
	shared: Arc<Shared>,
}
impl MessageInterceptor {
	/// Wraps `channel`, answering authorization requests through `authorizer`.
	pub fn new(channel: Arc<dyn Channel>, authorizer: Arc<dyn Authorize>) -> Self {
		Self::with_options(channel, authorizer, ReplySessionMode::default(), Arc::new(LogAdvisory))
	}

	/// Same as [`new`](Self::new) with an explicit session mode and advisory sink.
	pub fn with_options(
		channel: Arc<dyn Channel>,
		authorizer: Arc<dyn Authorize>,
		session_mode: ReplySessionMode,
		advisory: Arc<dyn Advisory>,
	) -> Self {
		Self {
			shared: Arc::new(Shared {
				channel,
				authorizer,
				advisory,
				session_mode,
				session: Mutex::new(None),
				advised: AtomicBool::new(false),
				closed: Mutex::new(false),
				writes: AsyncMutex::new(()),
				tasks: TaskTracker::new(),
				cancel: CancellationToken::new(),
			}),
		}
	}

	/// Handles one inbound frame; returns the frame to forward, or `None` when it was consumed.
	///
	/// Must be called from within a Tokio runtime.
	pub fn on_inbound(&self, frame: Frame) -> Option<Frame> {
		let Some(request) = frame.as_text().and_then(AuthRequest::parse) else {
			return Some(frame);
		};

		// Held across the spawn so `close` either sees this task in the tracker or refuses it.
		let closed = self.shared.closed.lock();

		if *closed {
			tracing::warn!(
				correlation_id = %request.correlation_id,
				"Dropped an authorization request received after close."
			);

			return None;
		}

		tracing::debug!(
			correlation_id = %request.correlation_id,
			auth_type = %request.auth_type,
			"Intercepted an authorization request."
		);

		let shared = self.shared.clone();
		let cancel = shared.cancel.child_token();

		self.shared.tasks.spawn(async move { shared.answer(request, cancel).await });

		None
	}

	/// Writes an outbound frame after inspecting it.
	pub async fn send(&self, frame: Frame) -> Result<(), ChannelError> {
		if let Some(summary) = frame.as_text().and_then(OutboundSummary::parse) {
			self.shared.observe(summary);
		}

		self.shared.write(frame).await
	}

	/// Cancels in-flight orchestrations, waits for their replies, then closes the channel.
	///
	/// Later calls return immediately.
	pub async fn close(&self) -> Result<(), ChannelError> {
		{
			let mut closed = self.shared.closed.lock();

			if *closed {
				return Ok(());
			}

			*closed = true;

			self.shared.cancel.cancel();
			self.shared.tasks.close();
		}

		self.shared.tasks.wait().await;

		let _guard = self.shared.writes.lock().await;

		tracing::debug!("Closing the kernel channel.");

		self.shared.channel.close().await
	}

	/// Number of orchestrations still running.
	pub fn in_flight(&self) -> usize {
		self.shared.tasks.len()
	}

	/// Session captured from outbound traffic, if any.
	pub fn session(&self) -> Option<String> {
		self.shared.session.lock().clone()
	}

	/// Returns true once [`close`](Self::close) has been called.
	pub fn is_closed(&self) -> bool {
		*self.shared.closed.lock()
	}
}
impl Debug for MessageInterceptor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MessageInterceptor")
			.field("session_mode", &self.shared.session_mode)
			.field("in_flight", &self.shared.tasks.len())
			.field("closed", &self.is_closed())
			.finish()
	}
}

struct Shared {
	channel: Arc<dyn Channel>,
	authorizer: Arc<dyn Authorize>,
	advisory: Arc<dyn Advisory>,
	session_mode: ReplySessionMode,
	session: Mutex<Option<String>>,
	advised: AtomicBool,
	closed: Mutex<bool>,
	// Serializes writes so frames never interleave on the channel.
	writes: AsyncMutex<()>,
	tasks: TaskTracker,
	cancel: CancellationToken,
}
impl Shared {
	async fn answer(&self, request: AuthRequest, cancel: CancellationToken) {
		let outcome = self.authorizer.authorize(request.auth_type, cancel).await;
		let reply = Reply {
			correlation_id: request.correlation_id,
			session: self.reply_session(),
			error: outcome.err().map(|e| e.to_string()),
		};
		let written = match reply.encode() {
			Ok(text) => self.send_raw(Frame::Text(text)).await,
			Err(e) => Err(e),
		};

		match written {
			Ok(()) => tracing::debug!(
				correlation_id = %reply.correlation_id,
				failed = reply.error.is_some(),
				"Replied to an authorization request."
			),
			Err(e) => tracing::error!(
				correlation_id = %reply.correlation_id,
				error = %e,
				"Failed to reply to an authorization request."
			),
		}
	}

	fn reply_session(&self) -> String {
		let captured = match self.session_mode {
			ReplySessionMode::Generated => None,
			ReplySessionMode::Outbound => self.session.lock().clone(),
		};

		captured.unwrap_or_else(|| Uuid::new_v4().to_string())
	}

	fn observe(&self, summary: OutboundSummary) {
		if let Some(session) = summary.session {
			self.session.lock().get_or_insert(session);
		}
		if summary.mounts_drive && !self.advised.swap(true, Ordering::AcqRel) {
			self.advisory.raise(DRIVE_MOUNT_ADVISORY);
		}
	}

	async fn write(&self, frame: Frame) -> Result<(), ChannelError> {
		if *self.closed.lock() {
			return Err(ChannelError::Closed);
		}

		self.send_raw(frame).await
	}

	// Replies bypass the closed check: `close` waits for them before closing the channel.
	async fn send_raw(&self, frame: Frame) -> Result<(), ChannelError> {
		let _guard = self.writes.lock().await;

		self.channel.send(frame).await
	}
}
