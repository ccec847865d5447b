use std::time::{Duration, Instant};

use scanner_core::ScanTarget;
use scanner_engine::{ContentFetcher, FailureKind, FetchSettings, ReqwestFetcher};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = "<html><body><h2>First</h2><p>skip</p><h2>Second</h2></body></html>";

async fn serve(route: &str, response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn fetcher_extracts_matching_elements() {
    let server = serve(
        "/news",
        ResponseTemplate::new(200).set_body_raw(PAGE, "text/html; charset=utf-8"),
    )
    .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let target = ScanTarget::new(format!("{}/news", server.uri()), "h2");

    let content = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .expect("fetch ok");
    assert_eq!(content, "<h2>First</h2>\n\n<h2>Second</h2>\n\n");
}

#[tokio::test]
async fn fetcher_returns_empty_when_nothing_matches() {
    let server = serve(
        "/news",
        ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"),
    )
    .await;

    let fetcher = ReqwestFetcher::default();
    let target = ScanTarget::new(format!("{}/news", server.uri()), "table");

    let content = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .expect("fetch ok");
    assert!(content.is_empty());
}

#[tokio::test]
async fn download_decodes_declared_charset() {
    let server = serve(
        "/latin1",
        ResponseTemplate::new(200).set_body_raw(
            b"<p>caf\xe9</p>".to_vec(),
            "text/html; charset=ISO-8859-1",
        ),
    )
    .await;

    let fetcher = ReqwestFetcher::default();
    let page = fetcher
        .download(&format!("{}/latin1", server.uri()))
        .await
        .expect("download ok");
    assert_eq!(page.html, "<p>café</p>");
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = serve("/missing", ResponseTemplate::new(404)).await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let target = ScanTarget::new(format!("{}/missing", server.uri()), "h2");

    let err = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_rejects_unsupported_content_type() {
    let server = serve(
        "/data",
        ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
    )
    .await;

    let fetcher = ReqwestFetcher::default();
    let target = ScanTarget::new(format!("{}/data", server.uri()), "h2");

    let err = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "application/json".to_string()
        }
    );
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = serve(
        "/slow",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_millis(250))
            .set_body_raw(PAGE, "text/html"),
    )
    .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let target = ScanTarget::new(format!("{}/slow", server.uri()), "h2");

    let err = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = serve(
        "/large",
        ResponseTemplate::new(200)
            .insert_header("Content-Type", "text/html")
            .insert_header("Content-Length", "11")
            .set_body_string("01234567890"),
    )
    .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let target = ScanTarget::new(format!("{}/large", server.uri()), "h2");

    let err = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_fetch() {
    let server = serve(
        "/slow",
        ResponseTemplate::new(200)
            .set_delay(Duration::from_secs(5))
            .set_body_raw(PAGE, "text/html"),
    )
    .await;

    let fetcher = ReqwestFetcher::default();
    let target = ScanTarget::new(format!("{}/slow", server.uri()), "h2");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = fetcher.fetch(&target, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn invalid_url_is_reported_before_any_request() {
    let fetcher = ReqwestFetcher::default();
    let target = ScanTarget::new("not a url", "h2");

    let err = fetcher
        .fetch(&target, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
