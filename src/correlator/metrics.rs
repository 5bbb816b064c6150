// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for code-correlation outcomes.
#[derive(Debug, Default)]
pub struct CorrelatorMetrics {
	registered: AtomicU64,
	resolved: AtomicU64,
	rejected: AtomicU64,
	ignored: AtomicU64,
	timed_out: AtomicU64,
	cancelled: AtomicU64,
}
impl CorrelatorMetrics {
	/// Returns the number of waits registered.
	pub fn registered(&self) -> u64 {
		self.registered.load(Ordering::Relaxed)
	}

	/// Returns the number of waits resolved with a code.
	pub fn resolved(&self) -> u64 {
		self.resolved.load(Ordering::Relaxed)
	}

	/// Returns the number of waits rejected by malformed events.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Returns the number of events that matched no pending wait.
	pub fn ignored(&self) -> u64 {
		self.ignored.load(Ordering::Relaxed)
	}

	/// Returns the number of waits that hit the deadline.
	pub fn timed_out(&self) -> u64 {
		self.timed_out.load(Ordering::Relaxed)
	}

	/// Returns the number of waits cancelled by their caller.
	pub fn cancelled(&self) -> u64 {
		self.cancelled.load(Ordering::Relaxed)
	}

	pub(crate) fn record_registered(&self) {
		self.registered.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_resolved(&self) {
		self.resolved.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self, waits: usize) {
		self.rejected.fetch_add(waits as u64, Ordering::Relaxed);
	}

	pub(crate) fn record_ignored(&self) {
		self.ignored.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_timed_out(&self) {
		self.timed_out.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cancelled(&self) {
		self.cancelled.fetch_add(1, Ordering::Relaxed);
	}
}
