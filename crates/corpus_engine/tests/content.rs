use std::time::{Duration, Instant};

use corpus_core::{ContentReference, FetchedContent};
use corpus_engine::{
    BlobStoreFetcher, BlobStoreSettings, ContentSource, FailureKind, GraphQlClient, MetadataSource,
    StaticToken, TransportSession,
};
use futures_util::future::join_all;
use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OBJECT_PATH: &str = "/storage/v1/b/private/o/verdict-1.html";

fn reference() -> ContentReference {
    ContentReference {
        id: "file-1".into(),
        name: "verdict-1.html".into(),
        url: None,
    }
}

fn fetcher(server: &MockServer, max_bytes: u64) -> BlobStoreFetcher {
    fetcher_in(TransportSession::new(8).unwrap(), server, max_bytes)
}

fn fetcher_in(session: TransportSession, server: &MockServer, max_bytes: u64) -> BlobStoreFetcher {
    let settings = BlobStoreSettings {
        endpoint: server.uri(),
        bucket: "private".into(),
        token: Some("gcs-token".into()),
        max_bytes,
    };
    BlobStoreFetcher::new(session, settings)
}

async fn mount_object(server: &MockServer, content_type: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .and(query_param_is_missing("alt"))
        .and(header("authorization", "Bearer gcs-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "verdict-1.html",
            "contentType": content_type
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn html_object_is_decoded_as_text() {
    let server = MockServer::start().await;
    mount_object(&server, "text/html; charset=utf-8", "<p>Dom</p>".as_bytes()).await;

    let content = fetcher(&server, 1024)
        .fetch(&reference(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(content, FetchedContent::Text("<p>Dom</p>".into()));
}

#[tokio::test]
async fn pdf_object_stays_binary() {
    let server = MockServer::start().await;
    mount_object(&server, "application/pdf", &[0x25, 0x50, 0x44, 0x46, 0xff]).await;

    let content = fetcher(&server, 1024)
        .fetch(&reference(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(content, FetchedContent::Binary(vec![0x25, 0x50, 0x44, 0x46, 0xff]));
}

#[tokio::test]
async fn unknown_content_type_is_unsupported() {
    let server = MockServer::start().await;
    mount_object(&server, "image/png", b"png").await;

    let err = fetcher(&server, 1024)
        .fetch(&reference(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentKind {
            content_kind: "image/png".into()
        }
    );
}

#[tokio::test]
async fn missing_object_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fetcher(&server, 1024)
        .fetch(&reference(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn slow_download_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param_is_missing("alt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contentType": "text/plain" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("alt", "media"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_string("late"),
        )
        .mount(&server)
        .await;

    let err = fetcher(&server, 1024)
        .fetch(&reference(), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let server = MockServer::start().await;
    mount_object(&server, "text/plain", b"0123456789abcdef").await;

    let err = fetcher(&server, 10)
        .fetch(&reference(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(16)
        }
    );
}

fn named(name: &str) -> ContentReference {
    ContentReference {
        id: format!("file-{name}"),
        name: name.to_string(),
        url: None,
    }
}

/// Every object answers as text, each request taking `delay`.
async fn mount_slow_objects(server: &MockServer, name_pattern: &str, delay: Duration) {
    let object_path = format!("^/storage/v1/b/private/o/{name_pattern}$");
    Mock::given(method("GET"))
        .and(path_regex(object_path.as_str()))
        .and(query_param_is_missing("alt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(json!({ "contentType": "text/plain" })),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(object_path.as_str()))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_delay(delay).set_body_string("tekst"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn connection_limit_serializes_requests_across_fetches() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(150);
    mount_slow_objects(&server, "v-[0-9]+\\.html", delay).await;

    let session = TransportSession::new(1).unwrap();
    let blobs = fetcher_in(session.clone(), &server, 1024);
    let references: Vec<ContentReference> =
        (1..=3).map(|n| named(&format!("v-{n}.html"))).collect();

    let started = Instant::now();
    let fetches = join_all(
        references
            .iter()
            .map(|reference| blobs.fetch(reference, Duration::from_secs(10))),
    );
    let observe = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.available_connections()
    };
    let (results, free_mid_run) = tokio::join!(fetches, observe);

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(free_mid_run, 0);
    assert_eq!(session.available_connections(), 1);
    // Three fetches of two requests each, one request at a time.
    assert!(started.elapsed() >= delay * 6, "elapsed {:?}", started.elapsed());
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn metadata_queries_share_the_connection_limit() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(150);
    mount_slow_objects(&server, "v-1\\.html", delay).await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(json!({
                    "data": { "verdictsConnection": { "aggregate": { "count": 1 } } }
                })),
        )
        .mount(&server)
        .await;

    let session = TransportSession::new(1).unwrap();
    let blobs = fetcher_in(session.clone(), &server, 1024);
    let store = GraphQlClient::with_credentials(session, server.uri(), &StaticToken("tok".into()))
        .unwrap();
    let reference = named("v-1.html");

    let started = Instant::now();
    let (content, count) = tokio::join!(
        blobs.fetch(&reference, Duration::from_secs(10)),
        store.count("verdict", "")
    );

    assert_eq!(content.unwrap(), FetchedContent::Text("tekst".into()));
    assert_eq!(count.unwrap(), 1);
    assert!(started.elapsed() >= delay * 3, "elapsed {:?}", started.elapsed());
}

#[tokio::test]
async fn waiting_for_a_connection_counts_against_the_fetch_timeout() {
    let server = MockServer::start().await;
    mount_slow_objects(&server, "slow\\.html", Duration::from_millis(300)).await;
    mount_slow_objects(&server, "quick\\.html", Duration::ZERO).await;

    let session = TransportSession::new(1).unwrap();
    let blobs = fetcher_in(session, &server, 1024);
    let slow = named("slow.html");
    let quick = named("quick.html");

    let holder = blobs.fetch(&slow, Duration::from_secs(10));
    let waiter = async {
        // Let the slow fetch take the only connection first.
        tokio::time::sleep(Duration::from_millis(20)).await;
        blobs.fetch(&quick, Duration::from_millis(100)).await
    };
    let (held, waited) = tokio::join!(holder, waiter);

    assert!(held.is_ok());
    assert_eq!(waited.unwrap_err().kind, FailureKind::Timeout);
}
