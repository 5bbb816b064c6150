//! High-level facade that wires every component from one [`BrokerConfig`].

// self
use crate::{
	_prelude::*,
	auth::AuthType,
	capture::{
		CaptureError, CaptureSink, Delivery, LoopbackCaptureHost, RedirectCapture, UriSchemeCapture,
	},
	config::{BrokerConfig, CaptureMode},
	consent::{BrowserLauncher, ConsentOrchestrator, ConsentPrompt},
	correlator::CodeCorrelator,
	interceptor::{Advisory, Channel, LogAdvisory, MessageInterceptor},
	propagation::CredentialPropagation,
};
#[cfg(all(feature = "reqwest", feature = "browser"))]
use crate::{
	consent::SystemBrowser,
	propagation::{PropagationEndpoint, ReqwestPropagationClient},
};

/// Local authorization broker: one correlator, one capture host, one orchestrator.
///
/// Cloning is cheap and every clone shares the same pending waits.
#[derive(Clone)]
pub struct Broker {
	config: Arc<BrokerConfig>,
	correlator: CodeCorrelator,
	uri_scheme: Option<Arc<UriSchemeCapture>>,
	orchestrator: Arc<ConsentOrchestrator>,
}
impl Broker {
	/// Wires a broker around caller-supplied collaborators.
	pub fn new(
		config: BrokerConfig,
		propagation: Arc<dyn CredentialPropagation>,
		prompt: Arc<dyn ConsentPrompt>,
		browser: Arc<dyn BrowserLauncher>,
	) -> Self {
		let correlator = CodeCorrelator::new(config.code_timeout, config.malformed_event_policy);
		let sink: Arc<dyn CaptureSink> = Arc::new(correlator.clone());
		let (uri_scheme, capture) = match &config.capture {
			CaptureMode::UriScheme { callback } => {
				let handler = Arc::new(UriSchemeCapture::new(callback.clone(), sink));
				let capture: Arc<dyn RedirectCapture> = handler.clone();

				(Some(handler), capture)
			},
			CaptureMode::Loopback { logical_redirect } => {
				let capture: Arc<dyn RedirectCapture> =
					Arc::new(LoopbackCaptureHost::new(logical_redirect.clone(), sink));

				(None, capture)
			},
		};
		let orchestrator = config.scopes.iter().fold(
			ConsentOrchestrator::new(propagation, prompt, browser, capture, correlator.clone()),
			|orchestrator, (auth_type, scope)| orchestrator.with_scope(*auth_type, scope.clone()),
		);

		tracing::debug!(capture = ?config.capture, "Authorization broker ready.");

		Self { config: Arc::new(config), correlator, uri_scheme, orchestrator: Arc::new(orchestrator) }
	}

	/// Wires a broker that talks to the Colab REST endpoint and opens the system browser.
	#[cfg(all(feature = "reqwest", feature = "browser"))]
	pub fn with_defaults(
		config: BrokerConfig,
		endpoint: PropagationEndpoint,
		prompt: Arc<dyn ConsentPrompt>,
	) -> Result<Self> {
		let propagation = ReqwestPropagationClient::new(endpoint)?;

		Ok(Self::new(config, Arc::new(propagation), prompt, Arc::new(SystemBrowser)))
	}

	/// Validated configuration the broker was built from.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Shared correlator.
	pub fn correlator(&self) -> &CodeCorrelator {
		&self.correlator
	}

	/// Orchestrator that runs authorization attempts.
	pub fn orchestrator(&self) -> &Arc<ConsentOrchestrator> {
		&self.orchestrator
	}

	/// Routes a redirect the host delivered to the registered URI scheme.
	pub fn handle_uri(&self, uri: &Url) -> Result<Delivery> {
		let capture = self.uri_scheme.as_ref().ok_or(CaptureError::NoUriHandler)?;

		capture.handle_uri(uri).map_err(Into::into)
	}

	/// Runs one authorization attempt directly, outside any kernel channel.
	pub async fn authorize(&self, auth_type: AuthType, cancel: CancellationToken) -> Result<()> {
		self.orchestrator.authorize(auth_type, cancel).await
	}

	/// Starts intercepting `channel`, logging advisories.
	pub fn intercept(&self, channel: Arc<dyn Channel>) -> MessageInterceptor {
		self.intercept_with_advisory(channel, Arc::new(LogAdvisory))
	}

	/// Starts intercepting `channel` with a custom advisory sink.
	pub fn intercept_with_advisory(
		&self,
		channel: Arc<dyn Channel>,
		advisory: Arc<dyn Advisory>,
	) -> MessageInterceptor {
		MessageInterceptor::with_options(
			channel,
			self.orchestrator.clone(),
			self.config.reply_session,
			advisory,
		)
	}

	/// Rejects every pending wait and refuses new ones.
	pub fn dispose(&self) {
		self.correlator.dispose();
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("config", &self.config)
			.field("correlator", &self.correlator)
			.finish()
	}
}
