//! REST client for the Colab credential propagation endpoint.
//!
//! Each leg is two HTTP calls against the same URL: a `GET` that returns an anti-XSRF token and a
//! `POST` carrying that token in [`XSRF_TOKEN_HEADER`]. Both bodies may carry the `)]}'` anti-XSSI
//! prefix, which is stripped before parsing.

// std
use std::ops::Deref;
// crates.io
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AuthType,
	error::TransportError,
	propagation::{
		CredentialPropagation, DryRunResult, PropagationEndpoint, PropagationFuture,
		PropagationResult,
	},
};

/// Header carrying the anti-XSRF token on the `POST` leg.
pub const XSRF_TOKEN_HEADER: &str = "X-Goog-Colab-Token";

const XSSI_PREFIX: &str = ")]}'";

/// [`CredentialPropagation`] implementation backed by a shared [`ReqwestClient`].
///
/// Propagation calls must not follow redirects; configure any custom client accordingly.
#[derive(Clone, Debug)]
pub struct ReqwestPropagationClient {
	client: ReqwestClient,
	endpoint: PropagationEndpoint,
}
impl ReqwestPropagationClient {
	/// Builds a client with reqwest defaults and redirects disabled.
	pub fn new(endpoint: PropagationEndpoint) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(Self::with_client(client, endpoint))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, endpoint: PropagationEndpoint) -> Self {
		Self { client, endpoint }
	}

	/// Endpoint this client talks to.
	pub fn endpoint(&self) -> &PropagationEndpoint {
		&self.endpoint
	}

	async fn call(&self, auth_type: AuthType, dry_run: bool) -> Result<DryRunResult> {
		let url = self.endpoint.request_url(auth_type, dry_run);

		tracing::debug!(%auth_type, dry_run, "Requesting credential propagation token.");

		let token: XsrfToken = read_json(self.client.get(url.clone())).await?;

		read_json(self.client.post(url).header(XSRF_TOKEN_HEADER, token.token)).await
	}
}
impl CredentialPropagation for ReqwestPropagationClient {
	fn dry_run(&self, auth_type: AuthType) -> PropagationFuture<'_, DryRunResult> {
		Box::pin(self.call(auth_type, true))
	}

	fn propagate(&self, auth_type: AuthType) -> PropagationFuture<'_, PropagationResult> {
		Box::pin(async move {
			let response = self.call(auth_type, false).await?;

			Ok(PropagationResult { success: response.success })
		})
	}
}
impl AsRef<ReqwestClient> for ReqwestPropagationClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
impl Deref for ReqwestPropagationClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}

#[derive(Deserialize)]
struct XsrfToken {
	token: String,
}

async fn read_json<T>(request: RequestBuilder) -> Result<T>
where
	T: DeserializeOwned,
{
	let response = request.send().await.map_err(TransportError::from)?;
	let status = response.status();

	if !status.is_success() {
		tracing::warn!(status = status.as_u16(), "Credential propagation endpoint rejected the call.");

		return Err(TransportError::Status { status: status.as_u16() }.into());
	}

	let body = response.text().await.map_err(TransportError::from)?;

	parse_body(&body)
}

fn parse_body<T>(body: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_str(strip_xssi(body));

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransportError::MalformedResponse { source }.into())
}

fn strip_xssi(body: &str) -> &str {
	body.strip_prefix(XSSI_PREFIX).map(str::trim_start).unwrap_or(body)
}
