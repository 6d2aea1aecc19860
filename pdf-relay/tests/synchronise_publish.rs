use pdf_relay::upload::MultipartPublisher;
use pdf_relay_core::config::SourceConfig;
use pdf_relay_core::contract::{StrategyOrigin, TransferStatus};
use pdf_relay_core::discovery::build_strategies;
use pdf_relay_core::fetch::HttpFetcher;
use pdf_relay_core::http::{build_client, HttpSettings};
use pdf_relay_core::synchronise::{synchronise, RunControl, RunOptions};
use pdf_relay_core::transfer::{TransferEngine, TransferSettings};
use tempfile::tempdir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sitemap discovery, streamed fetch and multipart upload against one local server. The upload
/// endpoint fails the first document with HTTP 500 and acknowledges the second.
#[tokio::test]
async fn upload_error_status_fails_one_document_and_the_run_publishes_the_next() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<urlset><url><loc>{base}/a.pdf</loc></url><url><loc>{base}/b.pdf</loc></url></urlset>"
        )))
        .mount(&server)
        .await;
    for name in ["a.pdf", "b.pdf"] {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 body".to_vec()))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains(r#"filename="a.pdf""#))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains(r#"filename="b.pdf""#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "success": true, "post_id": 31 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&HttpSettings::default()).unwrap();
    let mut source = SourceConfig::new(base.clone());
    source.strategies = vec![StrategyOrigin::Sitemap];
    let strategies = build_strategies(client.clone(), &source);

    let work = tempdir().unwrap();
    let engine = TransferEngine::new(
        HttpFetcher::new(client.clone(), 1024 * 1024),
        MultipartPublisher::new(client, format!("{base}/upload"), None),
        TransferSettings {
            work_dir: work.path().to_path_buf(),
            size_tolerance_bytes: 0,
        },
    );
    let options = RunOptions {
        workers: 1,
        ..RunOptions::default()
    };

    let report = synchronise(&strategies, &engine, &options, &RunControl::new())
        .await
        .expect("run completes");

    assert_eq!(report.total_count, 2);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.all_published());
    assert_eq!(report.failures[0].canonical_url, format!("{base}/a.pdf"));
    assert!(report.failures[0].reason.contains("500"));
    assert_eq!(report.transfers[1].status, TransferStatus::Published);
    assert_eq!(report.transfers[1].remote_id.as_deref(), Some("31"));
    assert!(std::fs::read_dir(work.path()).unwrap().next().is_none());
}
