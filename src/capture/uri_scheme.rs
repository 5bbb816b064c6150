//! Custom-URI capture: the host environment owns the routing, this type only parses and forwards.

// self
use crate::{
	_prelude::*,
	auth::Scope,
	capture::{
		ArmedCapture, CaptureError, CaptureEvent, CaptureFuture, CaptureSink, Delivery,
		RedirectCapture,
	},
};

/// Process-wide dispatch point for redirects addressed to a registered custom scheme.
#[derive(Clone)]
pub struct UriSchemeCapture {
	callback: Url,
	sink: Arc<dyn CaptureSink>,
}
impl UriSchemeCapture {
	/// Creates a dispatcher for redirects to `callback` (e.g. `vscode://google.colab`).
	pub fn new(callback: Url, sink: Arc<dyn CaptureSink>) -> Self {
		Self { callback, sink }
	}

	/// Redirect target registered with the host environment.
	pub fn callback(&self) -> &Url {
		&self.callback
	}

	/// Handles one routed URI, e.g. `vscode://google.colab?code=..&state=nonce%3D..&scope=..`.
	///
	/// The URI must use the registered scheme and name its scope; anything else is a broken
	/// request rather than an unmatched redirect and fails loudly.
	pub fn handle_uri(&self, uri: &Url) -> Result<Delivery, CaptureError> {
		if uri.scheme() != self.callback.scheme() {
			return Err(CaptureError::SchemeMismatch {
				expected: self.callback.scheme().to_owned(),
				actual: uri.scheme().to_owned(),
			});
		}

		let event = CaptureEvent::from_query(uri.query().unwrap_or_default());
		let raw_scope = event.scope.as_deref().ok_or(CaptureError::MissingScope)?;
		let scope = Scope::new(raw_scope)
			.map_err(|_| CaptureError::InvalidScope { value: raw_scope.to_owned() })?;
		let delivery = self.sink.deliver(&scope, event);

		tracing::debug!(%scope, ?delivery, "URI scheme capture dispatched a redirect.");

		Ok(delivery)
	}
}
impl RedirectCapture for UriSchemeCapture {
	fn arm<'a>(
		&'a self,
		_scope: &'a Scope,
		_cancel: &'a CancellationToken,
	) -> CaptureFuture<'a, ArmedCapture> {
		Box::pin(async move { Ok(ArmedCapture::new(self.callback.clone())) })
	}
}
impl Debug for UriSchemeCapture {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UriSchemeCapture").field("callback", &self.callback.as_str()).finish()
	}
}
