//! Broker-level error types shared across capture, correlation, consent, and the channel.

// self
use crate::{_prelude::*, auth::AuthType, capture::CaptureError, interceptor::ChannelError};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// Every variant renders a human-readable sentence; the interceptor copies that sentence verbatim
/// into the `error` field of the reply frame.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The consent dialog or the continue gate was declined or dismissed.
	#[error("User cancelled {} authorization.", auth_type.label())]
	UserDeclined {
		/// Authorization kind the user declined.
		auth_type: AuthType,
	},
	/// No matching redirect arrived before the correlation deadline.
	#[error("Timeout waiting for the authorization code after {} ms.", after.as_millis())]
	Timeout {
		/// Deadline that elapsed.
		after: Duration,
	},
	/// The caller cancelled the attempt.
	#[error("Authorization was cancelled.")]
	Cancelled,
	/// A redirect arrived without a `code` parameter.
	#[error("Missing code in the authorization redirect.")]
	MissingCode,
	/// A redirect arrived without a nonce.
	#[error("Missing nonce in the authorization redirect.")]
	MissingNonce,
	/// The backend answered with a response that breaks the propagation contract.
	#[error("Credential propagation protocol violation: {reason}.")]
	ProtocolViolation {
		/// What the response got wrong.
		reason: String,
	},
	/// The backend explicitly reported that propagation failed.
	#[error("Credential propagation for {} was unsuccessful.", auth_type.label())]
	PropagationUnsuccessful {
		/// Authorization kind whose propagation failed.
		auth_type: AuthType,
	},
	/// The correlator was disposed while the wait was pending.
	#[error("Authorization broker was disposed.")]
	Disposed,
	/// The consent page could not be opened in the browser.
	#[error("Failed to open the consent page in the browser.")]
	BrowserLaunch {
		/// Launcher failure.
		#[source]
		source: BoxError,
	},

	/// Redirect capture failure (malformed callback request, bind failure, ...).
	#[error(transparent)]
	Capture(#[from] CaptureError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure talking to the propagation endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Failure writing to the kernel channel.
	#[error(transparent)]
	Channel(#[from] ChannelError),
}
impl Error {
	/// Returns true when the failure was caused by the user or the caller rather than the system.
	pub fn is_cancellation(&self) -> bool {
		matches!(self, Self::UserDeclined { .. } | Self::Cancelled)
	}

	/// Wraps a browser launcher failure.
	pub fn browser_launch(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::BrowserLaunch { source: Box::new(src) }
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Broker configuration failed validation.
	#[error(transparent)]
	InvalidBrokerConfig(#[from] crate::config::BrokerConfigError),
	/// The propagation endpoint failed validation.
	#[error(transparent)]
	InvalidPropagationEndpoint(#[from] crate::propagation::PropagationEndpointError),
	/// A URL could not be built.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The same nonce is already pending on the scope.
	#[error("Nonce `{nonce}` is already pending for scope `{scope}`.")]
	DuplicateNonce {
		/// Scope the nonce was registered under.
		scope: String,
		/// Offending nonce.
		nonce: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures raised while talking to the propagation endpoint.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the propagation endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while serving or calling an endpoint.")]
	Io(#[from] std::io::Error),
	/// The endpoint answered with a non-success HTTP status.
	#[error("Propagation endpoint returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// The endpoint answered with JSON that does not match the expected shape.
	#[error("Propagation endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure naming the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
