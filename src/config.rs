//! Broker configuration.

pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{AuthType, Scope},
	correlator::MalformedEventPolicy,
	interceptor::ReplySessionMode,
};

/// How provider redirects reach the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureMode {
	/// The host environment routes `<scheme>://<app>?...` URIs to the broker.
	UriScheme {
		/// Registered callback, e.g. `vscode://google.colab`.
		callback: Url,
	},
	/// A loopback listener per flow bounces the browser to `logical_redirect`.
	Loopback {
		/// Page the browser lands on after the callback was captured.
		logical_redirect: Url,
	},
}

/// Validated broker configuration; build it with [`BrokerConfig::builder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// Redirect capture mechanism.
	pub capture: CaptureMode,
	/// Deadline for each code wait.
	pub code_timeout: Duration,
	/// Reach of malformed redirects.
	pub malformed_event_policy: MalformedEventPolicy,
	/// Source of reply session ids.
	pub reply_session: ReplySessionMode,
	/// Correlation scope overrides per authorization kind.
	pub scopes: HashMap<AuthType, Scope>,
}
impl BrokerConfig {
	/// Starts a builder for the given capture mechanism.
	pub fn builder(capture: CaptureMode) -> BrokerConfigBuilder {
		BrokerConfigBuilder::new(capture)
	}

	/// Scope override configured for `auth_type`, if any.
	pub fn scope_for(&self, auth_type: AuthType) -> Option<&Scope> {
		self.scopes.get(&auth_type)
	}
}
