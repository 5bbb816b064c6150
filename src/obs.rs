//! Observability helpers for consent flows.
//!
//! # Feature Flags
//!
//! - Spans are always emitted through `tracing`: one `colab_auth_broker.flow` span per attempt,
//!   carrying the `auth_type` and the current `stage`.
//! - Enable `metrics` to increment the `colab_auth_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `auth_type` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages a consent attempt moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowStage {
	/// Asking the backend whether the credential is already available.
	DryRun,
	/// Showing the consent dialog.
	Consent,
	/// Arming the capture and launching the consent page.
	OpenBrowser,
	/// Showing the "click Continue once done" gate.
	ContinueGate,
	/// Waiting for the correlated redirect.
	AwaitCode,
	/// Asking the backend to propagate the credential.
	Propagate,
}
impl FlowStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowStage::DryRun => "dry_run",
			FlowStage::Consent => "consent",
			FlowStage::OpenBrowser => "open_browser",
			FlowStage::ContinueGate => "continue_gate",
			FlowStage::AwaitCode => "await_code",
			FlowStage::Propagate => "propagate",
		}
	}
}
impl Display for FlowStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to the orchestrator.
	Attempt,
	/// Credential propagated.
	Success,
	/// Failure reported back to the kernel.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
