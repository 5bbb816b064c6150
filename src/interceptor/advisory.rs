//! One-shot advisories raised from outbound traffic.

/// Shown the first time a cell calls `drive.mount(`.
pub const DRIVE_MOUNT_ADVISORY: &str = "drive.mount() is not supported from this client; \
	mounted files will not be visible to the notebook editor.";

/// Notebook UI capability that surfaces a non-blocking notice.
pub trait Advisory
where
	Self: Send + Sync,
{
	/// Shows `message` once.
	fn raise(&self, message: &str);
}

/// [`Advisory`] that writes the notice to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAdvisory;
impl Advisory for LogAdvisory {
	fn raise(&self, message: &str) {
		tracing::warn!(advisory = message, "Raised a notebook advisory.");
	}
}
