//! Single-use loopback HTTP listener for providers that cannot redirect to a custom scheme.
//!
//! The listener binds `127.0.0.1` on an OS-assigned port, so concurrent flows never share a
//! port. It answers the provider callback with a `302` to the flow's logical redirect URI
//! (query forwarded verbatim), forwards the query to the sink, and shuts itself down after the
//! first request that settles a wait. Cancellation or drop also shut it down; shutdown is
//! idempotent.

// std
use std::net::{Ipv4Addr, SocketAddr};
// crates.io
use axum::{
	Router,
	extract::State,
	http::{HeaderMap, Method, StatusCode, Uri, header},
	response::{IntoResponse, Response},
};
use tokio::{net::TcpListener, sync::watch};
// self
use crate::{
	_prelude::*,
	auth::Scope,
	capture::{ArmedCapture, CaptureError, CaptureEvent, CaptureFuture, CaptureSink, RedirectCapture},
	error::{ConfigError, TransportError},
};

/// Icon served on `/favicon.ico` so the browser tab shows something while the flow runs.
pub const FAVICON: &[u8] = include_bytes!("../../assets/favicon.ico");

/// [`RedirectCapture`] that binds a fresh [`LoopbackCapture`] for every armed flow.
#[derive(Clone)]
pub struct LoopbackCaptureHost {
	logical_redirect: Url,
	sink: Arc<dyn CaptureSink>,
}
impl LoopbackCaptureHost {
	/// Creates a host that bounces callbacks to `logical_redirect`.
	pub fn new(logical_redirect: Url, sink: Arc<dyn CaptureSink>) -> Self {
		Self { logical_redirect, sink }
	}

	/// Logical redirect URI the browser is bounced to.
	pub fn logical_redirect(&self) -> &Url {
		&self.logical_redirect
	}
}
impl RedirectCapture for LoopbackCaptureHost {
	fn arm<'a>(
		&'a self,
		scope: &'a Scope,
		cancel: &'a CancellationToken,
	) -> CaptureFuture<'a, ArmedCapture> {
		Box::pin(async move {
			let listener = LoopbackCapture::bind(
				scope.clone(),
				self.logical_redirect.clone(),
				self.sink.clone(),
				cancel,
			)
			.await?;

			Ok(ArmedCapture::loopback(listener))
		})
	}
}
impl Debug for LoopbackCaptureHost {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoopbackCaptureHost")
			.field("logical_redirect", &self.logical_redirect.as_str())
			.finish()
	}
}

/// Bound loopback listener serving exactly one flow.
pub struct LoopbackCapture {
	local_addr: SocketAddr,
	redirect_uri: Url,
	shutdown: CancellationToken,
	failures: watch::Receiver<Option<CaptureError>>,
}
impl LoopbackCapture {
	/// Binds `127.0.0.1:0` and starts serving callbacks for `scope`.
	///
	/// The listener is a child of `cancel`: cancelling the flow tears it down.
	pub async fn bind(
		scope: Scope,
		logical_redirect: Url,
		sink: Arc<dyn CaptureSink>,
		cancel: &CancellationToken,
	) -> Result<Self> {
		let listener =
			TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.map_err(TransportError::from)?;
		let local_addr = listener.local_addr().map_err(TransportError::from)?;
		let redirect_uri = Url::parse(&format!("http://{local_addr}/"))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let shutdown = cancel.child_token();
		let (failures_tx, failures) = watch::channel(None);
		let state = Arc::new(ListenerState {
			scope,
			logical_redirect,
			sink,
			shutdown: shutdown.clone(),
			failures: failures_tx,
		});
		let router = Router::new().fallback(handle_request).with_state(state);
		let signal = shutdown.clone();

		tokio::spawn(async move {
			let served = axum::serve(listener, router)
				.with_graceful_shutdown(async move { signal.cancelled().await })
				.await;

			match served {
				Ok(()) => tracing::debug!(%local_addr, "Loopback capture listener closed."),
				Err(e) => tracing::error!(%local_addr, error = %e, "Loopback capture listener failed."),
			}
		});
		tracing::debug!(%local_addr, "Loopback capture listener bound.");

		Ok(Self { local_addr, redirect_uri, shutdown, failures })
	}

	/// Socket address the listener is bound to.
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// `http://127.0.0.1:<port>/`, the redirect target handed to the provider.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Stops accepting connections. Safe to call more than once.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}

	/// Returns true once shutdown has been requested.
	pub fn is_shut_down(&self) -> bool {
		self.shutdown.is_cancelled()
	}

	/// Resolves with the first malformed-request failure; pends forever if none occurs.
	pub async fn failure(&mut self) -> CaptureError {
		loop {
			if let Some(err) = self.failures.borrow_and_update().clone() {
				return err;
			}
			if self.failures.changed().await.is_err() {
				return std::future::pending().await;
			}
		}
	}
}
impl Drop for LoopbackCapture {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}
impl Debug for LoopbackCapture {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoopbackCapture")
			.field("local_addr", &self.local_addr)
			.field("shut_down", &self.is_shut_down())
			.finish()
	}
}

struct ListenerState {
	scope: Scope,
	logical_redirect: Url,
	sink: Arc<dyn CaptureSink>,
	shutdown: CancellationToken,
	failures: watch::Sender<Option<CaptureError>>,
}
impl ListenerState {
	fn fail(&self, err: CaptureError) {
		tracing::error!(scope = %self.scope, error = %err, "Loopback capture received a malformed request.");

		self.failures.send_if_modified(|slot| {
			if slot.is_some() {
				return false;
			}

			*slot = Some(err);

			true
		});
	}
}

async fn handle_request(
	State(state): State<Arc<ListenerState>>,
	method: Method,
	uri: Uri,
	headers: HeaderMap,
) -> Response {
	if method != Method::GET {
		return (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "GET")]).into_response();
	}
	if uri.path() == "/favicon.ico" {
		return ([(header::CONTENT_TYPE, "image/x-icon")], FAVICON).into_response();
	}
	if let Err(err) = validate_request(&uri, &headers) {
		let body = err.to_string();

		state.fail(err);

		return (StatusCode::BAD_REQUEST, body).into_response();
	}

	let query = uri.query().unwrap_or_default();
	let delivery = state.sink.deliver(&state.scope, CaptureEvent::from_query(query));
	let location = forward_target(&state.logical_redirect, query);

	tracing::debug!(scope = %state.scope, ?delivery, "Loopback capture forwarded a callback.");

	if delivery.is_correlated() {
		state.shutdown.cancel();
	}

	(StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn validate_request(uri: &Uri, headers: &HeaderMap) -> Result<(), CaptureError> {
	if uri.path_and_query().is_none_or(|target| target.as_str().is_empty()) {
		return Err(CaptureError::MissingUrl);
	}
	if !headers.contains_key(header::HOST) {
		return Err(CaptureError::MissingHost);
	}

	Ok(())
}

fn forward_target(logical_redirect: &Url, query: &str) -> Url {
	let mut target = logical_redirect.clone();

	target.set_query((!query.is_empty()).then_some(query));

	target
}
