//! Counters and timings for consent attempts, exported through the `metrics` facade.
//!
//! Without the `metrics` feature every recorder compiles down to nothing.

// self
use crate::{
	_prelude::*,
	auth::AuthType,
	obs::{FlowOutcome, FlowStage},
};

/// Attempts, successes and failures per authorization kind.
pub const FLOW_TOTAL: &str = "colab_auth_broker_flow_total";
/// Stage transitions per authorization kind; shows where users drop out of consent.
pub const FLOW_STAGE_TOTAL: &str = "colab_auth_broker_flow_stage_total";
/// Wall time of settled attempts, in seconds.
pub const FLOW_DURATION_SECONDS: &str = "colab_auth_broker_flow_duration_seconds";

/// Counts one attempt, success or failure for `auth_type`.
pub fn record_flow_outcome(auth_type: AuthType, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			FLOW_TOTAL,
			"auth_type" => auth_type.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (auth_type, outcome);
	}
}

/// Counts an attempt entering `stage`.
pub fn record_flow_stage(auth_type: AuthType, stage: FlowStage) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			FLOW_STAGE_TOTAL,
			"auth_type" => auth_type.as_str(),
			"stage" => stage.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (auth_type, stage);
	}
}

/// Records how long a settled attempt took, consent dialogs included.
pub fn record_flow_duration(auth_type: AuthType, outcome: FlowOutcome, elapsed: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(
			FLOW_DURATION_SECONDS,
			"auth_type" => auth_type.as_str(),
			"outcome" => outcome.as_str()
		)
		.record(elapsed.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (auth_type, outcome, elapsed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_safe_without_an_installed_recorder() {
		record_flow_outcome(AuthType::DfsEphemeral, FlowOutcome::Failure);
		record_flow_stage(AuthType::AuthUserEphemeral, FlowStage::ContinueGate);
		record_flow_duration(AuthType::DfsEphemeral, FlowOutcome::Success, Duration::from_millis(1));
	}
}
