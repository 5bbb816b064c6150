#![cfg(feature = "reqwest")]

// crates.io
use reqwest::{StatusCode, header, redirect::Policy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use colab_auth_broker::{
	auth::{Nonce, Scope},
	capture::{CaptureError, FAVICON, LoopbackCapture},
	correlator::CodeCorrelator,
};

const LOGICAL_REDIRECT: &str = "vscode://google.colab/auth/done";

fn scope() -> Scope {
	Scope::new("profile email").expect("Scope fixture should be valid.")
}

fn client() -> reqwest::Client {
	reqwest::Client::builder()
		.redirect(Policy::none())
		.no_proxy()
		.build()
		.expect("Test HTTP client should build.")
}

async fn bind(correlator: &CodeCorrelator, cancel: &CancellationToken) -> LoopbackCapture {
	LoopbackCapture::bind(
		scope(),
		Url::parse(LOGICAL_REDIRECT).expect("Logical redirect should parse."),
		std::sync::Arc::new(correlator.clone()),
		cancel,
	)
	.await
	.expect("Loopback listener should bind.")
}

#[tokio::test]
async fn non_get_requests_are_refused() {
	let correlator = CodeCorrelator::default();
	let listener = bind(&correlator, &CancellationToken::new()).await;
	let response = client()
		.post(listener.redirect_uri().clone())
		.send()
		.await
		.expect("POST should reach the listener.");

	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
	assert_eq!(response.headers()[header::ALLOW], "GET");
}

#[tokio::test]
async fn favicon_is_served() {
	let correlator = CodeCorrelator::default();
	let listener = bind(&correlator, &CancellationToken::new()).await;
	let url = listener.redirect_uri().join("favicon.ico").expect("Favicon URL should build.");
	let response = client().get(url).send().await.expect("Favicon request should succeed.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(response.headers()[header::CONTENT_TYPE], "image/x-icon");
	assert_eq!(&response.bytes().await.expect("Favicon body should read.")[..], FAVICON);
}

#[tokio::test]
async fn callback_is_bounced_to_the_logical_redirect_and_settles_the_wait() {
	let correlator = CodeCorrelator::default();
	let cancel = CancellationToken::new();
	let listener = bind(&correlator, &cancel).await;
	let pending = correlator
		.register(scope(), Nonce::new("n1").expect("Nonce fixture should be valid."), cancel)
		.expect("Registration should succeed.");
	let mut callback = listener.redirect_uri().clone();

	callback.set_query(Some("state=nonce%3Dn1&code=4%2F0Acode&scope=profile+email"));

	let response = client().get(callback).send().await.expect("Callback should reach the listener.");

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(
		response.headers()[header::LOCATION],
		"vscode://google.colab/auth/done?state=nonce%3Dn1&code=4%2F0Acode&scope=profile+email"
	);
	assert_eq!(pending.wait().await.expect("Wait should resolve."), "4/0Acode");
	assert!(listener.is_shut_down());
}

#[tokio::test]
async fn request_without_host_fails_the_flow() {
	let correlator = CodeCorrelator::default();
	let mut listener = bind(&correlator, &CancellationToken::new()).await;
	let mut stream = tokio::net::TcpStream::connect(listener.local_addr())
		.await
		.expect("Raw connection should open.");

	stream
		.write_all(b"GET /?code=abc HTTP/1.0\r\n\r\n")
		.await
		.expect("Raw request should be written.");

	let mut response = String::new();

	stream.read_to_string(&mut response).await.expect("Raw response should be read.");

	assert!(response.starts_with("HTTP/1."));
	assert!(response.contains(" 400 "));
	assert_eq!(listener.failure().await, CaptureError::MissingHost);
}

#[tokio::test]
async fn cancellation_tears_the_listener_down() {
	let correlator = CodeCorrelator::default();
	let cancel = CancellationToken::new();
	let listener = bind(&correlator, &cancel).await;

	cancel.cancel();

	assert!(listener.is_shut_down());
}
