//! Modal prompts shown while a consent flow runs.

// self
use crate::{_prelude::*, auth::AuthType};

/// Boxed future returned by [`ConsentPrompt::confirm`].
pub type PromptFuture<'a> = Pin<Box<dyn Future<Output = bool> + 'a + Send>>;

/// Notebook UI capability that shows a modal and reports whether the user accepted it.
pub trait ConsentPrompt
where
	Self: Send + Sync,
{
	/// Shows `prompt`; resolves to `false` when the user declines or dismisses it.
	fn confirm<'a>(&'a self, prompt: &'a Prompt) -> PromptFuture<'a>;
}

/// Which modal is being shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PromptKind {
	/// Asks for permission before the consent page is opened.
	Consent,
	/// Manual "click Continue once done" confirmation after the browser hand-off.
	ContinueGate,
}

/// Content of one modal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
	/// Modal kind.
	pub kind: PromptKind,
	/// Authorization the modal is about.
	pub auth_type: AuthType,
	/// Headline.
	pub message: String,
	/// Body text.
	pub detail: String,
	/// Label of the accepting button.
	pub accept_label: String,
}
impl Prompt {
	/// Consent dialog for `auth_type`.
	pub fn consent(auth_type: AuthType) -> Self {
		let (message, detail, accept_label) = match auth_type {
			AuthType::DfsEphemeral => (
				"Permit this notebook to access your Google Drive files?",
				"This notebook is requesting access to your Google Drive files. Granting access \
				 to Google Drive will permit code executed in the notebook to modify files in your \
				 Google Drive. Make sure to review notebook code prior to allowing this access.",
				"Connect to Google Drive",
			),
			AuthType::AuthUserEphemeral => (
				"Allow this notebook to access your Google credentials?",
				"This will allow code executed in this notebook to access your Google Drive and \
				 Google Cloud data. Review the code in this notebook prior to allowing access.",
				"Allow",
			),
		};

		Self {
			kind: PromptKind::Consent,
			auth_type,
			message: message.into(),
			detail: detail.into(),
			accept_label: accept_label.into(),
		}
	}

	/// Gate shown after the consent page was opened.
	pub fn continue_gate(auth_type: AuthType) -> Self {
		Self {
			kind: PromptKind::ContinueGate,
			auth_type,
			message: format!("Complete the {} authorization in your browser.", auth_type.label()),
			detail: "The consent page was opened in your browser; click Continue once done.".into(),
			accept_label: "Continue".into(),
		}
	}
}
