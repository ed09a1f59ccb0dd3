//! Shared test-request helper: every router-level test needs a `ConnectInfo` extension, normally
//! injected by `axum::serve`'s `IntoMakeServiceWithConnectInfo` wrapper rather than present on a
//! bare request driven through `tower::ServiceExt::oneshot`.

// std
use std::net::SocketAddr;
// crates.io
use axum::{body::Body, extract::ConnectInfo, http::Request};

pub fn get(uri: &str) -> Request<Body> {
	with_headers(uri, &[])
}

pub fn with_headers(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
	let mut builder = Request::builder().uri(uri);

	for (name, value) in headers {
		builder = builder.header(*name, *value);
	}

	let mut request = builder.body(Body::empty()).expect("well-formed request");
	request.extensions_mut().insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));

	request
}
