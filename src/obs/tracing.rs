// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{
	_prelude::*,
	auth::AuthType,
	obs::{self, FlowOutcome, FlowStage},
};

/// Span wrapper shared by every stage of one consent attempt.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
	auth_type: AuthType,
}
impl FlowSpan {
	/// Creates a new span tagged with the authorization kind, starting at `stage`.
	pub fn new(auth_type: AuthType, stage: FlowStage) -> Self {
		let span = tracing::info_span!(
			"colab_auth_broker.flow",
			auth_type = auth_type.as_str(),
			stage = stage.as_str(),
			outcome = tracing::field::Empty,
		);

		obs::record_flow_stage(auth_type, stage);

		Self { span, auth_type }
	}

	/// Moves the span to `stage`.
	pub fn advance(&self, stage: FlowStage) {
		self.span.record("stage", stage.as_str());
		obs::record_flow_stage(self.auth_type, stage);

		tracing::debug!(parent: &self.span, %stage, "Consent flow advanced.");
	}

	/// Stamps the final outcome on the span.
	pub fn finish(&self, outcome: FlowOutcome) {
		self.span.record("outcome", outcome.as_str());
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn in_span<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn in_span_wraps_future() {
		let span = FlowSpan::new(AuthType::AuthUserEphemeral, FlowStage::DryRun);

		span.advance(FlowStage::Propagate);
		span.finish(FlowOutcome::Success);

		assert_eq!(span.in_span(async { 42 }).await, 42);
	}
}
