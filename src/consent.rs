//! Consent orchestration for one authorization attempt.
//!
//! ```text
//! DryRun ─┬─ success ──────────────────────────────────────────────────────────┐
//!         └─ needs consent ─ Consent ─ OpenBrowser ─ ContinueGate ─ AwaitCode ─┴─ Propagate
//! ```
//!
//! Declining either modal ends the attempt with [`Error::UserDeclined`] and the propagate call is
//! never issued. Cancelling the caller's token at any suspension point ends it with
//! [`Error::Cancelled`].

pub mod browser;
pub mod prompt;

pub use browser::*;
pub use prompt::*;

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{AuthType, Nonce, Scope},
	capture::{CaptureEvent, RedirectCapture},
	correlator::CodeCorrelator,
	error::ConfigError,
	obs::{self, FlowOutcome, FlowSpan, FlowStage},
	propagation::{CredentialPropagation, DryRunOutcome},
};

/// Boxed future returned by [`Authorize::authorize`].
pub type AuthorizeFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a + Send>>;

/// Anything that can run one authorization attempt to completion.
pub trait Authorize
where
	Self: Send + Sync,
{
	/// Runs the attempt for `auth_type`; cancelling `cancel` aborts it.
	fn authorize(&self, auth_type: AuthType, cancel: CancellationToken) -> AuthorizeFuture<'_>;
}

/// Sequences dry run, consent, browser hand-off, code wait, and propagation.
pub struct ConsentOrchestrator {
	propagation: Arc<dyn CredentialPropagation>,
	prompt: Arc<dyn ConsentPrompt>,
	browser: Arc<dyn BrowserLauncher>,
	capture: Arc<dyn RedirectCapture>,
	correlator: CodeCorrelator,
	scopes: HashMap<AuthType, Scope>,
}
impl ConsentOrchestrator {
	/// Wires the orchestrator's collaborators.
	///
	/// `capture` must deliver into `correlator`, otherwise no wait ever settles.
	pub fn new(
		propagation: Arc<dyn CredentialPropagation>,
		prompt: Arc<dyn ConsentPrompt>,
		browser: Arc<dyn BrowserLauncher>,
		capture: Arc<dyn RedirectCapture>,
		correlator: CodeCorrelator,
	) -> Self {
		Self { propagation, prompt, browser, capture, correlator, scopes: HashMap::new() }
	}

	/// Overrides the correlation scope used for `auth_type`.
	pub fn with_scope(mut self, auth_type: AuthType, scope: Scope) -> Self {
		self.scopes.insert(auth_type, scope);

		self
	}

	/// Correlation scope used for `auth_type`.
	pub fn scope_for(&self, auth_type: AuthType) -> Result<Scope> {
		match self.scopes.get(&auth_type) {
			Some(scope) => Ok(scope.clone()),
			None => Scope::new(auth_type.default_scope()).map_err(|e| ConfigError::from(e).into()),
		}
	}

	/// Correlation scope for an attempt that opens `consent_uri`.
	///
	/// The provider echoes the page's own `scope` parameter back with the code, so that value wins;
	/// [`scope_for`](Self::scope_for) only applies to pages that do not name one.
	pub fn consent_scope(&self, auth_type: AuthType, consent_uri: &Url) -> Result<Scope> {
		match CaptureEvent::from_query(consent_uri.query().unwrap_or_default()).scope {
			Some(requested) => Scope::new(&requested).map_err(|e| Error::ProtocolViolation {
				reason: format!("unauthorizedRedirectUri carries an unusable scope ({e})"),
			}),
			None => self.scope_for(auth_type),
		}
	}

	/// Correlator the orchestrator registers its waits with.
	pub fn correlator(&self) -> &CodeCorrelator {
		&self.correlator
	}

	/// Runs one authorization attempt for `auth_type`.
	pub async fn authorize(&self, auth_type: AuthType, cancel: CancellationToken) -> Result<()> {
		let started = Instant::now();
		let span = FlowSpan::new(auth_type, FlowStage::DryRun);

		obs::record_flow_outcome(auth_type, FlowOutcome::Attempt);

		let result = span.in_span(self.run(auth_type, &cancel, &span)).await;
		let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

		span.finish(outcome);
		obs::record_flow_outcome(auth_type, outcome);
		obs::record_flow_duration(auth_type, outcome, started.elapsed());

		match &result {
			Ok(()) => tracing::info!(%auth_type, "Credential propagated."),
			Err(e) if e.is_cancellation() =>
				tracing::info!(%auth_type, error = %e, "Authorization attempt cancelled."),
			Err(e) => tracing::warn!(%auth_type, error = %e, "Authorization attempt failed."),
		}

		result
	}

	async fn run(
		&self,
		auth_type: AuthType,
		cancel: &CancellationToken,
		span: &FlowSpan,
	) -> Result<()> {
		let dry_run = or_cancelled(cancel, self.propagation.dry_run(auth_type)).await?;
		let outcome = dry_run.into_outcome().inspect_err(|e| {
			tracing::error!(%auth_type, error = %e, "Dry run broke the propagation contract.");
		})?;

		if let DryRunOutcome::NeedsConsent { consent_uri } = outcome {
			self.obtain_consent(auth_type, &consent_uri, cancel, span).await?;
		}

		span.advance(FlowStage::Propagate);

		let propagated = or_cancelled(cancel, self.propagation.propagate(auth_type)).await?;

		if !propagated.success {
			return Err(Error::PropagationUnsuccessful { auth_type });
		}

		Ok(())
	}

	async fn obtain_consent(
		&self,
		auth_type: AuthType,
		consent_uri: &Url,
		cancel: &CancellationToken,
		span: &FlowSpan,
	) -> Result<()> {
		span.advance(FlowStage::Consent);
		self.confirm(Prompt::consent(auth_type), cancel).await?;
		span.advance(FlowStage::OpenBrowser);

		let scope = self.consent_scope(auth_type, consent_uri)?;
		let nonce = Nonce::generate();
		let mut armed = or_cancelled(cancel, self.capture.arm(&scope, cancel)).await?;
		// Registered before the browser opens so a fast redirect is never lost.
		let pending = self.correlator.register(scope, nonce.clone(), cancel.clone())?;

		self.open_browser(armed.decorate(consent_uri, &nonce)).await?;
		span.advance(FlowStage::ContinueGate);
		self.confirm(Prompt::continue_gate(auth_type), cancel).await?;
		span.advance(FlowStage::AwaitCode);

		let code = tokio::select! {
			settled = pending.wait() => settled?,
			failure = armed.failed() => return Err(failure.into()),
		};

		tracing::debug!(%auth_type, code_len = code.len(), "Authorization redirect correlated.");

		Ok(())
	}

	async fn confirm(&self, prompt: Prompt, cancel: &CancellationToken) -> Result<()> {
		let auth_type = prompt.auth_type;
		let accepted = or_cancelled(cancel, async { Ok(self.prompt.confirm(&prompt).await) }).await?;

		if accepted {
			Ok(())
		} else {
			tracing::debug!(%auth_type, kind = ?prompt.kind, "User declined the prompt.");

			Err(Error::UserDeclined { auth_type })
		}
	}

	async fn open_browser(&self, url: Url) -> Result<()> {
		let browser = self.browser.clone();

		tracing::debug!(host = url.host_str().unwrap_or_default(), "Opening the consent page.");

		tokio::task::spawn_blocking(move || browser.open(&url))
			.await
			.map_err(Error::browser_launch)?
	}
}
impl Authorize for ConsentOrchestrator {
	fn authorize(&self, auth_type: AuthType, cancel: CancellationToken) -> AuthorizeFuture<'_> {
		Box::pin(ConsentOrchestrator::authorize(self, auth_type, cancel))
	}
}
impl Debug for ConsentOrchestrator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConsentOrchestrator")
			.field("correlator", &self.correlator)
			.field("scopes", &self.scopes)
			.finish()
	}
}

async fn or_cancelled<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	tokio::select! {
		biased;

		_ = cancel.cancelled() => Err(Error::Cancelled),
		out = fut => out,
	}
}
