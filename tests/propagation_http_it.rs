#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use url::Url;
// self
use colab_auth_broker::{
	auth::AuthType,
	error::{Error, TransportError},
	propagation::{
		CredentialPropagation, DryRunOutcome, PropagationEndpoint, ReqwestPropagationClient,
	},
};

const PATH: &str = "/tun/m/credentials-propagation/m-s-kernel";

fn client(server: &MockServer) -> ReqwestPropagationClient {
	let base = Url::parse(&server.base_url()).expect("Mock base URL should parse.");
	let endpoint =
		PropagationEndpoint::new(&base, "m-s-kernel").expect("Loopback endpoint should be valid.");
	let http = reqwest::Client::builder()
		.redirect(reqwest::redirect::Policy::none())
		.no_proxy()
		.build()
		.expect("Test HTTP client should build.");

	ReqwestPropagationClient::with_client(http, endpoint)
}

#[tokio::test]
async fn dry_run_fetches_a_token_then_posts_it() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(PATH)
				.query_param("authtype", "dfs_ephemeral")
				.query_param("version", "2")
				.query_param("dryrun", "true")
				.query_param("propagate", "true")
				.query_param("record", "false");
			then.status(200).body(")]}'\n{\"token\":\"xsrf-1\"}");
		})
		.await;
	let post = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(PATH)
				.query_param("dryrun", "true")
				.header("x-goog-colab-token", "xsrf-1");
			then.status(200).body(
				")]}'\n{\"success\":false,\"unauthorizedRedirectUri\":\"https://accounts.example.com/consent\"}",
			);
		})
		.await;
	let result = client(&server)
		.dry_run(AuthType::DfsEphemeral)
		.await
		.expect("Dry run should succeed.");

	token.assert_async().await;
	post.assert_async().await;

	assert_eq!(
		result.into_outcome().expect("Dry run should carry a consent page."),
		DryRunOutcome::NeedsConsent {
			consent_uri: Url::parse("https://accounts.example.com/consent")
				.expect("Consent fixture should parse."),
		}
	);
}

#[tokio::test]
async fn propagate_reports_the_backend_verdict() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(PATH).query_param("dryrun", "false");
			then.status(200).body("{\"token\":\"xsrf-2\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(PATH)
				.query_param("authtype", "auth_user_ephemeral")
				.header("x-goog-colab-token", "xsrf-2");
			then.status(200).body("{\"success\":true}");
		})
		.await;

	let result = client(&server)
		.propagate(AuthType::AuthUserEphemeral)
		.await
		.expect("Propagation should succeed.");

	assert!(result.success);
}

#[tokio::test]
async fn http_failures_surface_their_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(PATH);
			then.status(503);
		})
		.await;

	let err = client(&server)
		.dry_run(AuthType::DfsEphemeral)
		.await
		.expect_err("Unavailable backend should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 503 })));
}

#[tokio::test]
async fn malformed_tokens_name_the_missing_field() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(PATH);
			then.status(200).body("{\"xsrf\":\"oops\"}");
		})
		.await;

	let err = client(&server)
		.dry_run(AuthType::DfsEphemeral)
		.await
		.expect_err("Malformed token response should fail.");

	assert!(matches!(err, Error::Transport(TransportError::MalformedResponse { .. })));
}
