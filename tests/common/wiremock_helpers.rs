use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Minimal bytes that pass for a PDF statement.
pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% proptax test statement\n%%EOF\n";

/// Creates a mock statement server that serves `body` as a PDF at `url_path`.
pub async fn mock_statement_server(url_path: &str, body: &[u8]) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that returns the given status for every GET.
pub async fn mock_error_server(status_code: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code).set_body_string(body.to_string()))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
///
/// The server will wait for `delay_ms` milliseconds before responding with a 200 OK.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(FAKE_PDF.to_vec())
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}
