use sitebridge::config::FetchConfig;
use sitebridge::fetcher::{FetchError, HttpFetcher};
use sitebridge::progress::NullProgress;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"<html><body><ul>
    <li><a href="/t/1">First topic</a></li>
    <li><a href="/t/2">Second topic</a></li>
</ul></body></html>"#;

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(FetchConfig::default()).unwrap()
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_fetches_html_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(LISTING, "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let html = fetcher()
        .fetch(&url(&server, "/list"), &NullProgress)
        .await
        .unwrap();

    assert!(html.contains("Second topic"));
}

#[tokio::test]
async fn test_rejects_non_html_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&url(&server, "/data"), &NullProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::ContentTypeMismatch(ref ct) if ct == "application/json"));
}

#[tokio::test]
async fn test_rejects_oversized_body() {
    let server = MockServer::start().await;
    let body = format!("<html><body>{}</body></html>", "x".repeat(4096));
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let config = FetchConfig {
        max_response_bytes: 1024,
        ..FetchConfig::default()
    };
    let err = HttpFetcher::new(config)
        .unwrap()
        .fetch(&url(&server, "/big"), &NullProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::SizeExceeded(1024)));
}

#[tokio::test]
async fn test_reports_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&url(&server, "/missing"), &NullProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::UpstreamError(ref status) if status.contains("404")));
}

#[tokio::test]
async fn test_follows_same_host_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/list"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LISTING, "text/html"))
        .mount(&server)
        .await;

    let html = fetcher()
        .fetch(&url(&server, "/old"), &NullProgress)
        .await
        .unwrap();

    assert!(html.contains("First topic"));
}

#[tokio::test]
async fn test_blocks_off_host_redirect() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    let target = format!("{}/landing", elsewhere.uri());

    Mock::given(method("GET"))
        .and(path("/jump"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LISTING, "text/html"))
        .expect(0)
        .mount(&elsewhere)
        .await;

    let err = fetcher()
        .fetch(&url(&server, "/jump"), &NullProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::RedirectBlocked(ref to) if to.starts_with(&elsewhere.uri())));
}
