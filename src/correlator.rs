//! Code correlation: matches asynchronously arriving redirects to the pending waits that caused
//! them.
//!
//! Waits are keyed by [`Scope`] and carry one [`Nonce`] each. The first wait on a scope opens
//! that scope's subscription and the last one to settle releases it; concurrent waits on the
//! same scope share the subscription but settle independently. Every incoming
//! [`CaptureEvent`] is classified into a [`Disposition`] before anything is touched, so an
//! event addressed to another scope or to an already settled nonce never disturbs unrelated
//! waits.

mod metrics;

pub use metrics::CorrelatorMetrics;

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{Nonce, Scope},
	capture::{CaptureEvent, CaptureSink, Delivery},
	error::ConfigError,
};

/// Deadline applied to every wait unless the correlator is built with another one.
pub const DEFAULT_CODE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// How far a malformed event (no code or no nonce) reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedEventPolicy {
	/// Reject every wait pending on the event's scope.
	#[default]
	RejectScope,
	/// Reject only the wait whose nonce the event names; unattributable events are ignored.
	RejectAddressed,
}

/// Why a malformed event rejected waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
	/// The redirect carried no `code`.
	MissingCode,
	/// The redirect carried no nonce.
	MissingNonce,
}
impl RejectReason {
	fn to_error(self) -> Error {
		match self {
			RejectReason::MissingCode => Error::MissingCode,
			RejectReason::MissingNonce => Error::MissingNonce,
		}
	}
}

/// Per-event decision taken against the scope's pending nonces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
	/// Resolve the wait registered for `nonce`.
	Resolve {
		/// Matched nonce.
		nonce: Nonce,
		/// Authorization code carried by the event.
		code: String,
	},
	/// Reject the wait for `nonce`, or every wait on the scope when `nonce` is `None`.
	Reject {
		/// Targeted nonce.
		nonce: Option<Nonce>,
		/// Rejection cause.
		reason: RejectReason,
	},
	/// Leave every wait untouched.
	Ignore,
}

/// Classifies `event` against the nonces currently pending on its scope.
pub fn classify(
	event: &CaptureEvent,
	pending: &[Nonce],
	policy: MalformedEventPolicy,
) -> Disposition {
	let addressed = event
		.nonce
		.as_deref()
		.and_then(|nonce| pending.iter().find(|candidate| candidate.as_ref() == nonce))
		.cloned();

	match (event.code.as_deref(), event.nonce.as_deref(), policy) {
		(None, _, MalformedEventPolicy::RejectScope) =>
			Disposition::Reject { nonce: None, reason: RejectReason::MissingCode },
		(None, _, MalformedEventPolicy::RejectAddressed) => match addressed {
			Some(nonce) =>
				Disposition::Reject { nonce: Some(nonce), reason: RejectReason::MissingCode },
			None => Disposition::Ignore,
		},
		(Some(_), None, MalformedEventPolicy::RejectScope) =>
			Disposition::Reject { nonce: None, reason: RejectReason::MissingNonce },
		(Some(_), None, MalformedEventPolicy::RejectAddressed) => Disposition::Ignore,
		(Some(code), Some(_), _) => match addressed {
			Some(nonce) => Disposition::Resolve { nonce, code: code.to_owned() },
			None => Disposition::Ignore,
		},
	}
}

/// Instance-owned table of pending authorization waits.
///
/// Cloning is cheap and every clone shares the same table.
#[derive(Clone)]
pub struct CodeCorrelator {
	inner: Arc<CorrelatorInner>,
}
impl CodeCorrelator {
	/// Creates a correlator with a custom deadline and malformed-event policy.
	pub fn new(timeout: Duration, policy: MalformedEventPolicy) -> Self {
		Self {
			inner: Arc::new(CorrelatorInner {
				table: Default::default(),
				timeout,
				policy,
				metrics: Default::default(),
			}),
		}
	}

	/// Deadline applied to each wait.
	pub fn timeout(&self) -> Duration {
		self.inner.timeout
	}

	/// Policy applied to malformed events.
	pub fn policy(&self) -> MalformedEventPolicy {
		self.inner.policy
	}

	/// Outcome counters.
	pub fn metrics(&self) -> &CorrelatorMetrics {
		&self.inner.metrics
	}

	/// Registers `nonce` under `scope` and returns the handle to await.
	///
	/// Registration is synchronous: a redirect delivered after this call returns but before the
	/// handle is awaited still settles it. Dropping the handle releases the nonce.
	pub fn register(
		&self,
		scope: Scope,
		nonce: Nonce,
		cancel: CancellationToken,
	) -> Result<PendingAuthWait> {
		let (settle, settled) = oneshot::channel();
		let created_at = OffsetDateTime::now_utc();

		{
			let mut table = self.inner.table.lock();

			if table.disposed {
				return Err(Error::Disposed);
			}

			let subscription = table.scopes.entry(scope.clone()).or_insert_with(|| {
				tracing::debug!(%scope, "Opened capture subscription.");

				Subscription::default()
			});

			if subscription.waits.iter().any(|slot| slot.nonce == nonce) {
				return Err(ConfigError::DuplicateNonce {
					scope: scope.to_string(),
					nonce: nonce.to_string(),
				}
				.into());
			}

			subscription.waits.push(WaitSlot { nonce: nonce.clone(), created_at, settle });
		}

		self.inner.metrics.record_registered();
		tracing::debug!(%scope, %nonce, "Registered authorization wait.");

		Ok(PendingAuthWait { inner: self.inner.clone(), scope, nonce, created_at, cancel, settled })
	}

	/// Waits for the code addressed to `nonce` on `scope`.
	///
	/// Settles with the first of: a matching event, the deadline ([`Error::Timeout`]), or
	/// `cancel` firing ([`Error::Cancelled`]).
	pub async fn wait_for_code(
		&self,
		scope: Scope,
		nonce: Nonce,
		cancel: CancellationToken,
	) -> Result<String> {
		self.register(scope, nonce, cancel)?.wait().await
	}

	/// Routes one captured redirect to the waits pending on `scope`.
	pub fn deliver(&self, scope: &Scope, event: CaptureEvent) -> Delivery {
		let metrics = &self.inner.metrics;
		let mut table = self.inner.table.lock();
		let Some(subscription) = table.scopes.get_mut(scope) else {
			metrics.record_ignored();
			tracing::debug!(%scope, "Dropped a redirect for a scope without pending waits.");

			return Delivery::Unsubscribed;
		};
		let pending = subscription.waits.iter().map(|slot| slot.nonce.clone()).collect::<Vec<_>>();
		let delivery = match classify(&event, &pending, self.inner.policy) {
			Disposition::Resolve { nonce, code } => {
				if let Some(slot) = subscription.take(&nonce) {
					tracing::debug!(
						%scope,
						%nonce,
						waited_ms = slot.waited_ms(),
						"Resolved authorization wait."
					);
					slot.settle(Ok(code));
				}

				metrics.record_resolved();

				Delivery::Resolved
			},
			Disposition::Reject { nonce, reason } => {
				let slots = match nonce {
					Some(nonce) => subscription.take(&nonce).into_iter().collect(),
					None => mem::take(&mut subscription.waits),
				};
				let waits = slots.len();

				tracing::warn!(%scope, ?reason, waits, "Rejected authorization waits on a malformed redirect.");

				for slot in slots {
					slot.settle(Err(reason.to_error()));
				}

				metrics.record_rejected(waits);

				Delivery::Rejected { waits }
			},
			Disposition::Ignore => {
				metrics.record_ignored();
				tracing::warn!(
					%scope,
					nonce = event.nonce.as_deref().unwrap_or_default(),
					"Ignored a redirect that matches no pending nonce."
				);

				Delivery::Ignored
			},
		};

		if subscription.waits.is_empty() {
			table.scopes.remove(scope);
			tracing::debug!(%scope, "Released capture subscription.");
		}

		delivery
	}

	/// Nonces currently pending on `scope`, in registration order.
	pub fn pending_nonces(&self, scope: &Scope) -> Vec<Nonce> {
		self.inner
			.table
			.lock()
			.scopes
			.get(scope)
			.map(|subscription| subscription.waits.iter().map(|slot| slot.nonce.clone()).collect())
			.unwrap_or_default()
	}

	/// Returns true while `scope` has at least one pending wait.
	pub fn is_subscribed(&self, scope: &Scope) -> bool {
		self.inner.table.lock().scopes.contains_key(scope)
	}

	/// Rejects every pending wait with [`Error::Disposed`] and refuses new registrations.
	pub fn dispose(&self) {
		let drained = {
			let mut table = self.inner.table.lock();

			table.disposed = true;

			mem::take(&mut table.scopes)
		};

		for (scope, subscription) in drained {
			for slot in subscription.waits {
				slot.settle(Err(Error::Disposed));
			}

			tracing::debug!(%scope, "Released capture subscription on dispose.");
		}
	}

	/// Returns true once [`dispose`](Self::dispose) has run.
	pub fn is_disposed(&self) -> bool {
		self.inner.table.lock().disposed
	}
}
impl Default for CodeCorrelator {
	fn default() -> Self {
		Self::new(DEFAULT_CODE_TIMEOUT, MalformedEventPolicy::default())
	}
}
impl CaptureSink for CodeCorrelator {
	fn deliver(&self, scope: &Scope, event: CaptureEvent) -> Delivery {
		CodeCorrelator::deliver(self, scope, event)
	}
}
impl Debug for CodeCorrelator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CodeCorrelator")
			.field("timeout", &self.inner.timeout)
			.field("policy", &self.inner.policy)
			.field("scopes", &self.inner.table.lock().scopes.len())
			.finish()
	}
}

/// Handle for one registered wait.
///
/// Await it with [`wait`](Self::wait); dropping it without waiting releases the nonce.
pub struct PendingAuthWait {
	inner: Arc<CorrelatorInner>,
	scope: Scope,
	nonce: Nonce,
	created_at: OffsetDateTime,
	cancel: CancellationToken,
	settled: oneshot::Receiver<Result<String>>,
}
impl PendingAuthWait {
	/// Scope the wait is registered under.
	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	/// Nonce the wait expects back.
	pub fn nonce(&self) -> &Nonce {
		&self.nonce
	}

	/// Registration instant.
	pub fn created_at(&self) -> OffsetDateTime {
		self.created_at
	}

	/// Cancellation signal bound to the wait.
	pub fn cancel_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Suspends until the wait settles.
	pub async fn wait(mut self) -> Result<String> {
		let timeout = self.inner.timeout;
		let cancel = self.cancel.clone();
		let outcome = tokio::select! {
			biased;

			settled = &mut self.settled => settled.unwrap_or(Err(Error::Disposed)),
			_ = cancel.cancelled() => Err(Error::Cancelled),
			_ = tokio::time::sleep(timeout) => Err(Error::Timeout { after: timeout }),
		};

		match &outcome {
			Err(Error::Cancelled) => self.inner.metrics.record_cancelled(),
			Err(Error::Timeout { .. }) => self.inner.metrics.record_timed_out(),
			_ => (),
		}

		tracing::debug!(
			scope = %self.scope,
			nonce = %self.nonce,
			ok = outcome.is_ok(),
			"Authorization wait settled."
		);

		outcome
	}
}
impl Drop for PendingAuthWait {
	fn drop(&mut self) {
		self.inner.release(&self.scope, &self.nonce);
	}
}
impl Debug for PendingAuthWait {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingAuthWait")
			.field("scope", &self.scope)
			.field("nonce", &self.nonce)
			.field("created_at", &self.created_at)
			.field("cancelled", &self.cancel.is_cancelled())
			.finish()
	}
}

struct CorrelatorInner {
	table: Mutex<Table>,
	timeout: Duration,
	policy: MalformedEventPolicy,
	metrics: CorrelatorMetrics,
}
impl CorrelatorInner {
	fn release(&self, scope: &Scope, nonce: &Nonce) {
		let mut table = self.table.lock();
		let Some(subscription) = table.scopes.get_mut(scope) else {
			return;
		};

		subscription.waits.retain(|slot| &slot.nonce != nonce);

		if subscription.waits.is_empty() {
			table.scopes.remove(scope);
			tracing::debug!(%scope, "Released capture subscription.");
		}
	}
}

#[derive(Default)]
struct Table {
	scopes: HashMap<Scope, Subscription>,
	disposed: bool,
}

#[derive(Default)]
struct Subscription {
	waits: Vec<WaitSlot>,
}
impl Subscription {
	fn take(&mut self, nonce: &Nonce) -> Option<WaitSlot> {
		let idx = self.waits.iter().position(|slot| &slot.nonce == nonce)?;

		Some(self.waits.remove(idx))
	}
}

struct WaitSlot {
	nonce: Nonce,
	created_at: OffsetDateTime,
	settle: oneshot::Sender<Result<String>>,
}
impl WaitSlot {
	fn waited_ms(&self) -> i128 {
		(OffsetDateTime::now_utc() - self.created_at).whole_milliseconds()
	}

	fn settle(self, outcome: Result<String>) {
		// The handle may already be gone (dropped without waiting).
		let _ = self.settle.send(outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn nonce(value: &str) -> Nonce {
		Nonce::new(value).expect("Nonce fixture should be valid.")
	}

	fn scope(value: &str) -> Scope {
		Scope::new(value).expect("Scope fixture should be valid.")
	}

	fn event(code: Option<&str>, nonce: Option<&str>) -> CaptureEvent {
		CaptureEvent {
			code: code.map(Into::into),
			nonce: nonce.map(Into::into),
			..Default::default()
		}
	}

	#[test]
	fn classify_resolves_only_pending_nonces() {
		let pending = [nonce("n1"), nonce("n2")];

		assert_eq!(
			classify(&event(Some("c"), Some("n2")), &pending, MalformedEventPolicy::RejectScope),
			Disposition::Resolve { nonce: nonce("n2"), code: "c".into() }
		);
		assert_eq!(
			classify(&event(Some("c"), Some("n3")), &pending, MalformedEventPolicy::RejectScope),
			Disposition::Ignore
		);
	}

	#[test]
	fn classify_scope_policy_rejects_everything_on_malformed_events() {
		let pending = [nonce("n1")];

		assert_eq!(
			classify(&event(None, Some("other")), &pending, MalformedEventPolicy::RejectScope),
			Disposition::Reject { nonce: None, reason: RejectReason::MissingCode }
		);
		assert_eq!(
			classify(&event(Some("c"), None), &pending, MalformedEventPolicy::RejectScope),
			Disposition::Reject { nonce: None, reason: RejectReason::MissingNonce }
		);
	}

	#[test]
	fn classify_addressed_policy_targets_the_named_nonce() {
		let pending = [nonce("n1"), nonce("n2")];
		let policy = MalformedEventPolicy::RejectAddressed;

		assert_eq!(
			classify(&event(None, Some("n1")), &pending, policy),
			Disposition::Reject { nonce: Some(nonce("n1")), reason: RejectReason::MissingCode }
		);
		assert_eq!(classify(&event(None, Some("zz")), &pending, policy), Disposition::Ignore);
		assert_eq!(classify(&event(Some("c"), None), &pending, policy), Disposition::Ignore);
	}

	#[test]
	fn duplicate_nonces_are_refused() {
		let correlator = CodeCorrelator::default();
		let _first = correlator
			.register(scope("drive"), nonce("n1"), CancellationToken::new())
			.expect("First registration should succeed.");
		let err = correlator
			.register(scope("drive"), nonce("n1"), CancellationToken::new())
			.expect_err("Duplicate nonce should be refused.");

		assert!(matches!(err, Error::Config(ConfigError::DuplicateNonce { .. })));
		assert_eq!(correlator.pending_nonces(&scope("drive")), vec![nonce("n1")]);
	}

	#[test]
	fn dropping_the_handle_releases_the_subscription() {
		let correlator = CodeCorrelator::default();
		let first = correlator
			.register(scope("drive"), nonce("n1"), CancellationToken::new())
			.expect("Registration should succeed.");
		let second = correlator
			.register(scope("drive"), nonce("n2"), CancellationToken::new())
			.expect("Registration should succeed.");

		assert_eq!(correlator.pending_nonces(&scope("drive")), vec![nonce("n1"), nonce("n2")]);

		drop(first);

		assert_eq!(correlator.pending_nonces(&scope("drive")), vec![nonce("n2")]);
		assert!(correlator.is_subscribed(&scope("drive")));

		drop(second);

		assert!(!correlator.is_subscribed(&scope("drive")));
	}

	#[test]
	fn events_without_subscription_are_dropped() {
		let correlator = CodeCorrelator::default();

		assert_eq!(
			correlator.deliver(&scope("drive"), event(Some("c"), Some("n1"))),
			Delivery::Unsubscribed
		);
		assert_eq!(correlator.metrics().ignored(), 1);
	}

	#[test]
	fn dispose_refuses_new_registrations() {
		let correlator = CodeCorrelator::default();

		correlator.dispose();

		assert!(correlator.is_disposed());
		assert!(matches!(
			correlator.register(scope("drive"), nonce("n1"), CancellationToken::new()),
			Err(Error::Disposed)
		));
	}
}
