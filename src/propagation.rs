//! Credential propagation contract against the remote backend.
//!
//! Every authorization attempt first asks the backend for a dry run (does the kernel already hold
//! the credential?) and, once the user consented, for the real propagation. The broker only
//! consumes the contract below; `ReqwestPropagationClient` is the bundled REST implementation.

#[cfg(feature = "reqwest")] mod rest;

#[cfg(feature = "reqwest")] pub use rest::*;

// self
use crate::{_prelude::*, auth::AuthType};

const PROPAGATION_PATH: [&str; 3] = ["tun", "m", "credentials-propagation"];

/// Boxed future returned by [`CredentialPropagation`] calls.
pub type PropagationFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Two-call propagation contract consumed by the consent orchestrator.
pub trait CredentialPropagation
where
	Self: Send + Sync,
{
	/// Checks whether `auth_type` is already authorized without granting anything.
	fn dry_run(&self, auth_type: AuthType) -> PropagationFuture<'_, DryRunResult>;

	/// Propagates the credential for `auth_type` to the kernel.
	fn propagate(&self, auth_type: AuthType) -> PropagationFuture<'_, PropagationResult>;
}

/// Response of the dry-run leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResult {
	/// True when the credential is already available.
	pub success: bool,
	/// Consent page to open when `success` is false.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unauthorized_redirect_uri: Option<String>,
}
impl DryRunResult {
	/// Validates the response and turns it into the next orchestration step.
	///
	/// An unsuccessful dry run without a parseable consent URI breaks the contract and is
	/// reported as [`Error::ProtocolViolation`].
	pub fn into_outcome(self) -> Result<DryRunOutcome> {
		if self.success {
			return Ok(DryRunOutcome::AlreadyAuthorized);
		}

		let raw = self.unauthorized_redirect_uri.ok_or_else(|| Error::ProtocolViolation {
			reason: "unsuccessful dry run did not include an unauthorizedRedirectUri".into(),
		})?;
		let consent_uri = Url::parse(&raw).map_err(|e| Error::ProtocolViolation {
			reason: format!("unauthorizedRedirectUri `{raw}` is not a valid URL ({e})"),
		})?;

		Ok(DryRunOutcome::NeedsConsent { consent_uri })
	}
}

/// Validated dry-run outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DryRunOutcome {
	/// The credential can be propagated without asking the user.
	AlreadyAuthorized,
	/// The user must grant access on `consent_uri` first.
	NeedsConsent {
		/// Provider consent page.
		consent_uri: Url,
	},
}

/// Response of the propagation leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationResult {
	/// False when the backend refused to propagate.
	pub success: bool,
}

/// Errors raised while building a [`PropagationEndpoint`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PropagationEndpointError {
	/// The backend base URL must use HTTPS unless it points at a loopback host.
	#[error("Propagation base URL must use HTTPS: {url}.")]
	InsecureBase {
		/// Offending base URL.
		url: String,
	},
	/// The base URL cannot carry a path.
	#[error("Propagation base URL cannot be a base: {url}.")]
	CannotBeABase {
		/// Offending base URL.
		url: String,
	},
	/// The endpoint identifier is empty or contains a path separator.
	#[error("Propagation endpoint identifier `{endpoint}` is invalid.")]
	InvalidEndpoint {
		/// Offending identifier.
		endpoint: String,
	},
}

/// Kernel-specific credential propagation URL,
/// `{base}/tun/m/credentials-propagation/{endpoint}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropagationEndpoint {
	url: Url,
}
impl PropagationEndpoint {
	/// Builds the propagation URL for the kernel `endpoint` served behind `base`.
	pub fn new(base: &Url, endpoint: &str) -> Result<Self, PropagationEndpointError> {
		validate_base(base)?;

		if endpoint.is_empty() || endpoint.contains('/') {
			return Err(PropagationEndpointError::InvalidEndpoint { endpoint: endpoint.to_owned() });
		}

		let mut url = base.clone();

		url.set_query(None);
		url.set_fragment(None);
		url.path_segments_mut()
			.map_err(|_| PropagationEndpointError::CannotBeABase { url: base.to_string() })?
			.pop_if_empty()
			.extend(PROPAGATION_PATH)
			.push(endpoint);

		Ok(Self { url })
	}

	/// Propagation URL without query parameters.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// URL for one call: `authtype`, `version=2`, `dryrun`, `propagate=true`, `record=false`.
	pub fn request_url(&self, auth_type: AuthType, dry_run: bool) -> Url {
		let mut url = self.url.clone();

		url.query_pairs_mut()
			.append_pair("authtype", auth_type.as_str())
			.append_pair("version", "2")
			.append_pair("dryrun", if dry_run { "true" } else { "false" })
			.append_pair("propagate", "true")
			.append_pair("record", "false");

		url
	}
}

fn validate_base(base: &Url) -> Result<(), PropagationEndpointError> {
	let loopback = matches!(base.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	match base.scheme() {
		"https" => Ok(()),
		"http" if loopback => Ok(()),
		_ => Err(PropagationEndpointError::InsecureBase { url: base.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn successful_dry_run_skips_consent() {
		let result = DryRunResult { success: true, unauthorized_redirect_uri: None };

		assert_eq!(
			result.into_outcome().expect("Successful dry run should be valid."),
			DryRunOutcome::AlreadyAuthorized
		);
	}

	#[test]
	fn unsuccessful_dry_run_requires_a_consent_uri() {
		let missing = DryRunResult { success: false, unauthorized_redirect_uri: None };
		let invalid =
			DryRunResult { success: false, unauthorized_redirect_uri: Some("not a url".into()) };

		assert!(matches!(missing.into_outcome(), Err(Error::ProtocolViolation { .. })));
		assert!(matches!(invalid.into_outcome(), Err(Error::ProtocolViolation { .. })));
	}

	#[test]
	fn endpoint_appends_propagation_path_and_query() {
		let base = Url::parse("https://colab.research.google.com/").expect("Base should parse.");
		let endpoint =
			PropagationEndpoint::new(&base, "m-s-abc123").expect("Endpoint should be valid.");

		assert_eq!(
			endpoint.url().as_str(),
			"https://colab.research.google.com/tun/m/credentials-propagation/m-s-abc123"
		);
		assert_eq!(
			endpoint.request_url(AuthType::DfsEphemeral, true).query(),
			Some("authtype=dfs_ephemeral&version=2&dryrun=true&propagate=true&record=false")
		);
	}

	#[test]
	fn endpoint_rejects_insecure_bases_and_bad_identifiers() {
		let insecure = Url::parse("http://colab.example.com/").expect("Base should parse.");
		let local = Url::parse("http://127.0.0.1:8080/").expect("Base should parse.");

		assert!(matches!(
			PropagationEndpoint::new(&insecure, "ep"),
			Err(PropagationEndpointError::InsecureBase { .. })
		));
		assert!(PropagationEndpoint::new(&local, "ep").is_ok());
		assert!(matches!(
			PropagationEndpoint::new(&local, "a/b"),
			Err(PropagationEndpointError::InvalidEndpoint { .. })
		));
	}

	#[test]
	fn dry_run_wire_format_is_camel_case() {
		let result: DryRunResult = serde_json::from_str(
			r#"{"success":false,"unauthorizedRedirectUri":"https://accounts.example.com/consent"}"#,
		)
		.expect("Dry run payload should deserialize.");

		assert_eq!(
			result.into_outcome().expect("Consent URI should be accepted."),
			DryRunOutcome::NeedsConsent {
				consent_uri: Url::parse("https://accounts.example.com/consent")
					.expect("Consent fixture should parse."),
			}
		);
	}
}
