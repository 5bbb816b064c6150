//! Validating builder for [`BrokerConfig`].

// self
use crate::{
	_prelude::*,
	auth::{AuthType, Scope},
	config::{BrokerConfig, CaptureMode},
	correlator::{DEFAULT_CODE_TIMEOUT, MalformedEventPolicy},
	interceptor::ReplySessionMode,
};

/// Errors raised while validating a [`BrokerConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BrokerConfigError {
	/// Waits need a positive deadline.
	#[error("Code timeout must be greater than zero.")]
	ZeroCodeTimeout,
	/// URI-scheme callbacks must use a custom scheme.
	#[error("URI scheme callback must use a custom scheme: {url}.")]
	CallbackNotCustomScheme {
		/// Offending callback.
		url: String,
	},
	/// URI-scheme callbacks must name the app they are routed to.
	#[error("URI scheme callback must name its app: {url}.")]
	CallbackWithoutApp {
		/// Offending callback.
		url: String,
	},
}

/// Builder for [`BrokerConfig`] values.
#[derive(Debug)]
pub struct BrokerConfigBuilder {
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
impl BrokerConfigBuilder {
	/// Creates a builder with the default timeout, policy, and session mode.
	pub fn new(capture: CaptureMode) -> Self {
		Self {
			capture,
			code_timeout: DEFAULT_CODE_TIMEOUT,
			malformed_event_policy: MalformedEventPolicy::default(),
			reply_session: ReplySessionMode::default(),
			scopes: HashMap::new(),
		}
	}

	/// Overrides the code wait deadline.
	pub fn code_timeout(mut self, timeout: Duration) -> Self {
		self.code_timeout = timeout;

		self
	}

	/// Overrides the malformed-event policy.
	pub fn malformed_event_policy(mut self, policy: MalformedEventPolicy) -> Self {
		self.malformed_event_policy = policy;

		self
	}

	/// Overrides the reply session mode.
	pub fn reply_session(mut self, mode: ReplySessionMode) -> Self {
		self.reply_session = mode;

		self
	}

	/// Overrides the correlation scope of one authorization kind.
	pub fn scope(mut self, auth_type: AuthType, scope: Scope) -> Self {
		self.scopes.insert(auth_type, scope);

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<BrokerConfig, BrokerConfigError> {
		if self.code_timeout.is_zero() {
			return Err(BrokerConfigError::ZeroCodeTimeout);
		}
		if let CaptureMode::UriScheme { callback } = &self.capture {
			validate_callback(callback)?;
		}

		Ok(BrokerConfig {
			capture: self.capture,
			code_timeout: self.code_timeout,
			malformed_event_policy: self.malformed_event_policy,
			reply_session: self.reply_session,
			scopes: self.scopes,
		})
	}
}

fn validate_callback(callback: &Url) -> Result<(), BrokerConfigError> {
	if matches!(callback.scheme(), "http" | "https" | "file") {
		return Err(BrokerConfigError::CallbackNotCustomScheme { url: callback.to_string() });
	}
	if callback.host_str().is_none_or(str::is_empty) {
		return Err(BrokerConfigError::CallbackWithoutApp { url: callback.to_string() });
	}

	Ok(())
}
