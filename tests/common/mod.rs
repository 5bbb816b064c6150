//! Test doubles shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;
// self
use colab_auth_broker::{
	auth::AuthType,
	capture::CaptureEvent,
	config::{BrokerConfig, CaptureMode},
	consent::{BrowserLauncher, ConsentPrompt, Prompt, PromptFuture, PromptKind},
	error::Result,
	interceptor::{Advisory, Channel, ChannelError, ChannelFuture, Frame},
	propagation::{CredentialPropagation, DryRunResult, PropagationFuture, PropagationResult},
};

pub const CALLBACK: &str = "vscode://google.colab";
pub const CONSENT_PAGE: &str =
	"https://accounts.example.com/o/oauth2/auth?client_id=colab&redirect_uri=placeholder";
pub const SCOPED_CONSENT_PAGE: &str = "https://accounts.example.com/o/oauth2/auth?client_id=colab\
	&scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive+https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdocs.test\
	&redirect_uri=placeholder";

/// Answer a [`ScriptedPrompt`] gives to one modal.
#[derive(Clone, Copy, Debug)]
pub enum Answer {
	Accept,
	Decline,
	/// Never answers; only cancellation ends the prompt.
	Hang,
}

/// Prompt that answers from a script and accepts once the script runs out.
#[derive(Default)]
pub struct ScriptedPrompt {
	answers: Mutex<VecDeque<Answer>>,
	shown: Mutex<Vec<(PromptKind, AuthType)>>,
}
impl ScriptedPrompt {
	pub fn new(answers: impl IntoIterator<Item = Answer>) -> Arc<Self> {
		Arc::new(Self { answers: Mutex::new(answers.into_iter().collect()), ..Default::default() })
	}

	pub fn accepting() -> Arc<Self> {
		Self::new([])
	}

	pub fn shown(&self) -> Vec<(PromptKind, AuthType)> {
		self.shown.lock().clone()
	}
}
impl ConsentPrompt for ScriptedPrompt {
	fn confirm<'a>(&'a self, prompt: &'a Prompt) -> PromptFuture<'a> {
		self.shown.lock().push((prompt.kind, prompt.auth_type));

		let answer = self.answers.lock().pop_front().unwrap_or(Answer::Accept);

		Box::pin(async move {
			match answer {
				Answer::Accept => true,
				Answer::Decline => false,
				Answer::Hang => std::future::pending().await,
			}
		})
	}
}

/// Propagation backend with a fixed dry-run answer.
pub struct StubPropagation {
	dry_run: Mutex<DryRunResult>,
	propagated: AtomicBool,
	dry_runs: AtomicUsize,
	propagations: AtomicUsize,
}
impl StubPropagation {
	pub fn authorized() -> Arc<Self> {
		Self::with(DryRunResult { success: true, unauthorized_redirect_uri: None })
	}

	pub fn needs_consent() -> Arc<Self> {
		Self::with(DryRunResult {
			success: false,
			unauthorized_redirect_uri: Some(CONSENT_PAGE.into()),
		})
	}

	pub fn with(dry_run: DryRunResult) -> Arc<Self> {
		Arc::new(Self {
			dry_run: Mutex::new(dry_run),
			propagated: AtomicBool::new(true),
			dry_runs: AtomicUsize::new(0),
			propagations: AtomicUsize::new(0),
		})
	}

	pub fn refuse_propagation(&self) {
		self.propagated.store(false, Ordering::SeqCst);
	}

	pub fn dry_runs(&self) -> usize {
		self.dry_runs.load(Ordering::SeqCst)
	}

	pub fn propagations(&self) -> usize {
		self.propagations.load(Ordering::SeqCst)
	}
}
impl CredentialPropagation for StubPropagation {
	fn dry_run(&self, _auth_type: AuthType) -> PropagationFuture<'_, DryRunResult> {
		self.dry_runs.fetch_add(1, Ordering::SeqCst);

		let result = self.dry_run.lock().clone();

		Box::pin(async move { Ok(result) })
	}

	fn propagate(&self, _auth_type: AuthType) -> PropagationFuture<'_, PropagationResult> {
		self.propagations.fetch_add(1, Ordering::SeqCst);

		let success = self.propagated.load(Ordering::SeqCst);

		Box::pin(async move { Ok(PropagationResult { success }) })
	}
}

/// Browser that hands every opened URL to the test.
pub struct ForwardingBrowser {
	opened: mpsc::UnboundedSender<Url>,
}
impl ForwardingBrowser {
	pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Url>) {
		let (opened, rx) = mpsc::unbounded_channel();

		(Arc::new(Self { opened }), rx)
	}
}
impl BrowserLauncher for ForwardingBrowser {
	fn open(&self, url: &Url) -> Result<()> {
		let _ = self.opened.send(url.clone());

		Ok(())
	}
}

/// Kernel channel backed by an unbounded queue.
pub struct MemoryChannel {
	frames: mpsc::UnboundedSender<Frame>,
	closed: AtomicBool,
}
impl MemoryChannel {
	pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
		let (frames, rx) = mpsc::unbounded_channel();

		(Arc::new(Self { frames, closed: AtomicBool::new(false) }), rx)
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}
impl Channel for MemoryChannel {
	fn send(&self, frame: Frame) -> ChannelFuture<'_> {
		let sent = if self.is_closed() {
			Err(ChannelError::Closed)
		} else {
			self.frames.send(frame).map_err(|_| ChannelError::Closed)
		};

		Box::pin(async move { sent })
	}

	fn close(&self) -> ChannelFuture<'_> {
		self.closed.store(true, Ordering::SeqCst);

		Box::pin(async { Ok(()) })
	}
}

/// Advisory sink that records every notice.
#[derive(Default)]
pub struct RecordingAdvisory(pub Mutex<Vec<String>>);
impl Advisory for RecordingAdvisory {
	fn raise(&self, message: &str) {
		self.0.lock().push(message.to_owned());
	}
}

pub fn uri_scheme_config() -> BrokerConfig {
	BrokerConfig::builder(CaptureMode::UriScheme {
		callback: Url::parse(CALLBACK).expect("Callback fixture should parse."),
	})
	.build()
	.expect("URI scheme config should be valid.")
}

/// Builds the redirect the provider would send for a decorated consent page.
///
/// The provider echoes the page's own `scope`; `fallback_scope` stands in when the page has none.
pub fn provider_redirect(consent: &Url, code: &str, fallback_scope: &str) -> Url {
	let event = CaptureEvent::from_query(consent.query().unwrap_or_default());
	let target = consent
		.query_pairs()
		.find(|(key, _)| key == "redirect_uri")
		.map(|(_, value)| value.into_owned())
		.expect("Consent page should carry a redirect_uri.");
	let mut redirect = Url::parse(&target).expect("Redirect target should parse.");

	redirect
		.query_pairs_mut()
		.append_pair("state", event.state.as_deref().expect("Consent page should carry a state."))
		.append_pair("code", code)
		.append_pair("scope", event.scope.as_deref().unwrap_or(fallback_scope));

	redirect
}
