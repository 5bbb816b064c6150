//! Out-of-band redirect capture.
//!
//! A capture host receives the OAuth provider's redirect for one flow and forwards its query
//! parameters as a [`CaptureEvent`] to a [`CaptureSink`] (normally the
//! [`CodeCorrelator`](crate::correlator::CodeCorrelator)). Two hosts implement [`RedirectCapture`]:
//!
//! - [`UriSchemeCapture`]: the host environment routes `<scheme>://<app>?...` URIs to
//!   [`UriSchemeCapture::handle_uri`]; no listener is owned.
//! - [`LoopbackCaptureHost`]: binds a single-use [`LoopbackCapture`] HTTP listener on
//!   `127.0.0.1:<ephemeral>` per flow and bounces the browser to the logical redirect URI.
//!
//! Redirects carry the nonce inside `state` as a form-encoded `nonce=<value>` pair, e.g.
//! `http://127.0.0.1:<port>/?state=nonce%3D<nonce>&code=<code>&scope=<scope>`.

pub mod loopback;
pub mod uri_scheme;

pub use loopback::*;
pub use uri_scheme::*;

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{Nonce, Scope},
};

/// Boxed future returned by [`RedirectCapture::arm`].
pub type CaptureFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Query parameters lifted from one provider redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureEvent {
	/// Authorization code, when the provider granted access.
	pub code: Option<String>,
	/// Correlation nonce, read from `nonce` or from the `state` payload.
	pub nonce: Option<String>,
	/// Raw `state` value as returned by the provider.
	pub state: Option<String>,
	/// Scope echoed by the provider.
	pub scope: Option<String>,
}
impl CaptureEvent {
	/// Parses a raw (still percent-encoded) query string.
	///
	/// Empty values count as absent.
	pub fn from_query(query: &str) -> Self {
		let mut event = Self::default();

		for (key, value) in form_urlencoded::parse(query.as_bytes()) {
			if value.is_empty() {
				continue;
			}

			let slot = match key.as_ref() {
				"code" => &mut event.code,
				"nonce" => &mut event.nonce,
				"state" => &mut event.state,
				"scope" => &mut event.scope,
				_ => continue,
			};

			*slot = Some(value.into_owned());
		}

		if event.nonce.is_none() {
			event.nonce = event.state.as_deref().and_then(nonce_from_state);
		}

		event
	}
}

/// Result of handing a [`CaptureEvent`] to a [`CaptureSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
	/// Exactly one pending wait was resolved with the code.
	Resolved,
	/// Pending waits were rejected because the event was malformed.
	Rejected {
		/// Number of waits that were rejected.
		waits: usize,
	},
	/// The scope has pending waits but none matched the event.
	Ignored,
	/// Nothing is pending for the scope.
	Unsubscribed,
}
impl Delivery {
	/// Returns true when the event settled at least one wait.
	pub fn is_correlated(self) -> bool {
		matches!(self, Self::Resolved | Self::Rejected { .. })
	}
}

/// Destination for captured redirects.
pub trait CaptureSink
where
	Self: Send + Sync,
{
	/// Routes one event addressed to `scope`.
	fn deliver(&self, scope: &Scope, event: CaptureEvent) -> Delivery;
}

/// Capture mechanism that can be armed for a single authorization flow.
pub trait RedirectCapture
where
	Self: Send + Sync,
{
	/// Prepares a capture for `scope`; cancelling `cancel` tears it down.
	fn arm<'a>(
		&'a self,
		scope: &'a Scope,
		cancel: &'a CancellationToken,
	) -> CaptureFuture<'a, ArmedCapture>;
}

/// Failures raised by capture hosts.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CaptureError {
	/// The callback request carried no request target.
	#[error("Redirect capture received a request without a URL.")]
	MissingUrl,
	/// The callback request carried no `Host` header.
	#[error("Redirect capture received a request without a Host header.")]
	MissingHost,
	/// The redirect did not say which scope it belongs to.
	#[error("Redirect is missing its scope.")]
	MissingScope,
	/// The redirect named a scope that is not a valid identifier.
	#[error("Redirect carries an invalid scope `{value}`.")]
	InvalidScope {
		/// Offending scope value.
		value: String,
	},
	/// A URI was routed to a broker that captures redirects on a loopback listener.
	#[error("No URI scheme handler is configured.")]
	NoUriHandler,
	/// The URI was routed to a handler registered for another scheme.
	#[error("Redirect scheme `{actual}` does not match the registered `{expected}` scheme.")]
	SchemeMismatch {
		/// Scheme registered for the handler.
		expected: String,
		/// Scheme of the routed URI.
		actual: String,
	},
}

/// Capture armed for one flow.
///
/// Dropping the value tears down any listener it owns.
#[derive(Debug)]
pub struct ArmedCapture {
	redirect_uri: Url,
	listener: Option<LoopbackCapture>,
}
impl ArmedCapture {
	/// Wraps a capture that owns no listener (the host routes redirects itself).
	pub fn new(redirect_uri: Url) -> Self {
		Self { redirect_uri, listener: None }
	}

	/// Wraps a bound loopback listener.
	pub fn loopback(listener: LoopbackCapture) -> Self {
		Self { redirect_uri: listener.redirect_uri().clone(), listener: Some(listener) }
	}

	/// Redirect target the provider must send the browser to.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Loopback listener owned by this capture, if any.
	pub fn listener(&self) -> Option<&LoopbackCapture> {
		self.listener.as_ref()
	}

	/// Rewrites `consent` so the provider redirects to this capture and echoes `nonce` in `state`.
	///
	/// Existing `redirect_uri` and `state` parameters are replaced; every other parameter is kept
	/// in order.
	pub fn decorate(&self, consent: &Url, nonce: &Nonce) -> Url {
		let retained = consent
			.query_pairs()
			.filter(|(key, _)| key != "redirect_uri" && key != "state")
			.map(|(key, value)| (key.into_owned(), value.into_owned()))
			.collect::<Vec<_>>();
		let state = form_urlencoded::Serializer::new(String::new())
			.append_pair("nonce", nonce.as_ref())
			.finish();
		let mut url = consent.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.clear();
		pairs.extend_pairs(retained);
		pairs.append_pair("redirect_uri", self.redirect_uri.as_str());
		pairs.append_pair("state", &state);

		drop(pairs);

		url
	}

	/// Resolves with the first failure reported by the listener; pends forever otherwise.
	pub async fn failed(&mut self) -> CaptureError {
		match self.listener.as_mut() {
			Some(listener) => listener.failure().await,
			None => std::future::pending().await,
		}
	}
}

fn nonce_from_state(state: &str) -> Option<String> {
	form_urlencoded::parse(state.as_bytes())
		.find(|(key, value)| key == "nonce" && !value.is_empty())
		.map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn nonce_is_read_from_state_payload() {
		let event = CaptureEvent::from_query("state=nonce%3Dabc123&code=4%2F0Ab&scope=profile+email");

		assert_eq!(event.code.as_deref(), Some("4/0Ab"));
		assert_eq!(event.nonce.as_deref(), Some("abc123"));
		assert_eq!(event.state.as_deref(), Some("nonce=abc123"));
		assert_eq!(event.scope.as_deref(), Some("profile email"));
	}

	#[test]
	fn explicit_nonce_wins_and_empty_values_are_absent() {
		let event = CaptureEvent::from_query("code=&nonce=n1&state=nonce%3Dn2");

		assert_eq!(event.code, None);
		assert_eq!(event.nonce.as_deref(), Some("n1"));
	}

	#[test]
	fn state_without_nonce_yields_none() {
		let event = CaptureEvent::from_query("code=abc&state=opaque");

		assert_eq!(event.nonce, None);
		assert_eq!(event.state.as_deref(), Some("opaque"));
	}

	#[test]
	fn decorate_replaces_redirect_and_state() {
		let armed = ArmedCapture::new(
			Url::parse("http://127.0.0.1:4242/").expect("Redirect fixture should parse."),
		);
		let consent = Url::parse(
			"https://accounts.example.com/o/oauth2/auth?client_id=c&redirect_uri=https%3A%2F%2Fold&state=old&scope=drive",
		)
		.expect("Consent fixture should parse.");
		let nonce = Nonce::new("n-1").expect("Nonce fixture should be valid.");
		let decorated = armed.decorate(&consent, &nonce);
		let pairs = decorated.query_pairs().into_owned().collect::<Vec<_>>();

		assert_eq!(
			pairs,
			vec![
				("client_id".into(), "c".into()),
				("scope".into(), "drive".into()),
				("redirect_uri".into(), "http://127.0.0.1:4242/".into()),
				("state".into(), "nonce=n-1".into()),
			]
		);
		assert!(decorated.as_str().contains("state=nonce%3Dn-1"));
	}

	#[test]
	fn only_settling_deliveries_are_correlated() {
		assert!(Delivery::Resolved.is_correlated());
		assert!(Delivery::Rejected { waits: 2 }.is_correlated());
		assert!(!Delivery::Ignored.is_correlated());
		assert!(!Delivery::Unsubscribed.is_correlated());
	}
}
