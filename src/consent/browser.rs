//! Browser hand-off for the provider consent page.

// self
use crate::_prelude::*;

/// Opens a URL in the user's browser.
///
/// Implementations may block; the orchestrator calls them off the async executor.
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Opens `url`.
	fn open(&self, url: &Url) -> Result<()>;
}

/// Launches the operating system's default browser.
#[cfg(feature = "browser")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;
#[cfg(feature = "browser")]
impl BrowserLauncher for SystemBrowser {
	fn open(&self, url: &Url) -> Result<()> {
		webbrowser::open(url.as_str()).map_err(Error::browser_launch)
	}
}
