//! Integration tests for the mirror
//!
//! These tests use wiremock to stand in for the origin and mirror servers
//! and run the full list/fetch/expand cycle end-to-end. Bodies that trickle
//! in byte by byte come from a bare TCP listener.

use mvn_mirror::config::{Config, ExcludeEntry, TraversalStrategy};
use mvn_mirror::crawler::{run_crawl, Coordinator};
use mvn_mirror::output::CrawlSummary;
use mvn_mirror::repo::RepoPath;
use mvn_mirror::storage::{open_store, Snapshot, SnapshotEntry, StateStore};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at a mock origin
fn create_test_config(origin: &str, root: &Path) -> Config {
    let mut config = Config::default();
    config.mirrors.origin = format!("{}/maven2/", origin);
    config.output.root = root.display().to_string();
    config.crawler.listing_workers = 2;
    config.crawler.fetch_workers = 2;
    config.crawler.poll_interval_ms = 10;
    config.crawler.listing_timeout_secs = 5;
    config.crawler.file_timeout_secs = 5;
    config.user_agent.crawler_name = "TestMirror".to_string();
    config
}

/// Renders an Apache-style directory index
fn listing(entries: &[&str]) -> String {
    let mut html = String::from("<html><body><h1>Index</h1><pre><a href=\"../\">../</a>\n");
    for entry in entries {
        html.push_str(&format!("<a href=\"{0}\">{0}</a>\n", entry));
    }
    html.push_str("</pre></body></html>");
    html
}

/// Descriptor declaring the given `(group, artifact, version)` dependencies
fn descriptor(deps: &[(&str, &str, Option<&str>)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <dependencies>
"#,
    );
    for (group, artifact, version) in deps {
        xml.push_str(&format!(
            "    <dependency><groupId>{}</groupId><artifactId>{}</artifactId>",
            group, artifact
        ));
        if let Some(version) = version {
            xml.push_str(&format!("<version>{}</version>", version));
        }
        xml.push_str("</dependency>\n");
    }
    xml.push_str("  </dependencies>\n</project>\n");
    xml
}

async fn serve(server: &MockServer, repo_path: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(format!("/maven2/{}", repo_path)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .mount(server)
        .await;
}

async fn serve_once(server: &MockServer, repo_path: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(format!("/maven2/{}", repo_path)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
        .expect(1)
        .mount(server)
        .await;
}

async fn never_requested(server: &MockServer, repo_path: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/maven2/{}", repo_path)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

/// Mounts the small repository used by most tests
///
/// ```text
/// com/acme/
///   a/ x.bin x.pom (+ checksums)      x.pom -> g:artifact:1.0
///   b/ (empty)
/// g/artifact/1.0/ artifact-1.0.jar artifact-1.0.pom (+ checksum)
/// ```
async fn mount_sample_repo(server: &MockServer) {
    serve(server, "com/acme/", listing(&["a/", "b/"])).await;
    serve(
        server,
        "com/acme/a/",
        listing(&["x.bin", "x.bin.sha1", "x.pom", "x.pom.md5"]),
    )
    .await;
    serve(server, "com/acme/b/", listing(&[])).await;
    serve_once(server, "com/acme/a/x.bin", "binary-payload").await;
    serve_once(
        server,
        "com/acme/a/x.pom",
        descriptor(&[("g", "artifact", Some("1.0"))]),
    )
    .await;
    never_requested(server, "com/acme/a/x.bin.sha1").await;
    never_requested(server, "com/acme/a/x.pom.md5").await;

    serve(
        server,
        "g/artifact/1.0/",
        listing(&["artifact-1.0.jar", "artifact-1.0.jar.sha1", "artifact-1.0.pom"]),
    )
    .await;
    serve_once(server, "g/artifact/1.0/artifact-1.0.jar", "jar-bytes").await;
    serve_once(server, "g/artifact/1.0/artifact-1.0.pom", descriptor(&[])).await;
    never_requested(server, "g/artifact/1.0/artifact-1.0.jar.sha1").await;
}

const SAMPLE_FILES: &[&str] = &[
    "com/acme/a/x.bin",
    "com/acme/a/x.pom",
    "g/artifact/1.0/artifact-1.0.jar",
    "g/artifact/1.0/artifact-1.0.pom",
];

/// Completed paths as recorded in the completion log, sorted
fn completed_log(root: &Path) -> Vec<String> {
    let store = open_store(root, ".mvn-mirror");
    let mut paths: Vec<String> = store
        .load_completed()
        .expect("Failed to read completion log")
        .into_iter()
        .map(|p| p.to_string())
        .collect();
    paths.sort();
    paths
}

fn seed(raw: &str) -> RepoPath {
    RepoPath::seed(raw).expect("valid seed")
}

#[tokio::test]
async fn test_sample_repository_mirrored() {
    let mock_server = MockServer::start().await;
    mount_sample_repo(&mock_server).await;
    let out = TempDir::new().unwrap();

    let config = create_test_config(&mock_server.uri(), out.path());
    let summary = run_crawl(config, seed("com/acme"))
        .await
        .expect("Crawl failed");

    assert_eq!(completed_log(out.path()), SAMPLE_FILES);
    assert_eq!(summary.files_fetched, 4);
    assert_eq!(summary.directories_listed, 4);
    assert_eq!(summary.dependencies_scheduled, 1);
    assert_eq!(summary.not_found, 0);
    assert_eq!(summary.pending, 0);
    assert!(!summary.interrupted);

    let bin = std::fs::read_to_string(out.path().join("com/acme/a/x.bin")).unwrap();
    assert_eq!(bin, "binary-payload");
    assert!(out.path().join("g/artifact/1.0/artifact-1.0.jar").is_file());
    assert!(!out.path().join("com/acme/a/x.bin.sha1").exists());
    assert!(!out.path().join("com/acme/a/x.bin.part").exists());

    // Completion leaves an empty snapshot behind
    let snapshot = open_store(out.path(), ".mvn-mirror")
        .load_snapshot()
        .unwrap()
        .expect("snapshot written");
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let mock_server = MockServer::start().await;
    mount_sample_repo(&mock_server).await;
    let out = TempDir::new().unwrap();

    let config = create_test_config(&mock_server.uri(), out.path());
    let first = run_crawl(config.clone(), seed("com/acme")).await.unwrap();
    assert_eq!(first.files_fetched, 4);
    let after_first = completed_log(out.path());

    // File mocks expect exactly one request across both runs
    let second = run_crawl(config, seed("com/acme")).await.unwrap();
    assert_eq!(second.files_fetched, 0);
    assert_eq!(completed_log(out.path()), after_first);
}

#[tokio::test]
async fn test_existing_file_on_disk_not_refetched() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "g/", listing(&["present.jar", "missing.jar"])).await;
    never_requested(&mock_server, "g/present.jar").await;
    serve_once(&mock_server, "g/missing.jar", "new").await;

    let out = TempDir::new().unwrap();
    std::fs::create_dir_all(out.path().join("g")).unwrap();
    std::fs::write(out.path().join("g/present.jar"), "old").unwrap();

    let config = create_test_config(&mock_server.uri(), out.path());
    let summary = run_crawl(config, seed("g")).await.unwrap();

    assert_eq!(summary.files_fetched, 1);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(completed_log(out.path()), vec!["g/missing.jar", "g/present.jar"]);
    assert_eq!(
        std::fs::read_to_string(out.path().join("g/present.jar")).unwrap(),
        "old"
    );
}

#[tokio::test]
async fn test_mirror_failure_falls_back_to_origin() {
    let origin = MockServer::start().await;
    let mirror = MockServer::start().await;

    serve(&origin, "g/", listing(&["x.jar"])).await;
    serve_once(&origin, "g/x.jar", "from-origin").await;

    Mock::given(method("GET"))
        .and(path("/repo/g/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mirror)
        .await;
    Mock::given(method("GET"))
        .and(path("/repo/g/x.jar"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mirror)
        .await;

    let out = TempDir::new().unwrap();
    let mut config = create_test_config(&origin.uri(), out.path());
    config.mirrors.index = vec![format!("{}/repo", mirror.uri())];
    config.mirrors.download = vec![format!("{}/repo/", mirror.uri())];

    let summary = run_crawl(config, seed("g")).await.unwrap();

    assert_eq!(summary.files_fetched, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.not_found, 0);
    assert_eq!(
        std::fs::read_to_string(out.path().join("g/x.jar")).unwrap(),
        "from-origin"
    );
}

#[tokio::test]
async fn test_racing_workers_download_once() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maven2/g/x.jar"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("payload")
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let file = RepoPath::parse("g/x.jar").unwrap();
    let snapshot = Snapshot {
        files: (0..8).map(|_| SnapshotEntry::new(&file, 0)).collect(),
        ..Default::default()
    };
    open_store(out.path(), ".mvn-mirror")
        .save_snapshot(&snapshot)
        .unwrap();

    let mut config = create_test_config(&mock_server.uri(), out.path());
    config.crawler.fetch_workers = 8;

    let mut coordinator = Coordinator::new(config, seed("g"), false, None).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.files_fetched, 1);
    assert_eq!(summary.files_skipped, 7);
    assert_eq!(completed_log(out.path()), vec!["g/x.jar"]);
}

#[tokio::test]
async fn test_interrupted_run_resumes_to_same_result() {
    let reference_server = MockServer::start().await;
    mount_sample_repo(&reference_server).await;
    let reference_out = TempDir::new().unwrap();
    let config = create_test_config(&reference_server.uri(), reference_out.path());
    run_crawl(config, seed("com/acme")).await.unwrap();
    let expected = completed_log(reference_out.path());

    // Same repository, but slow enough that the stop lands mid-run
    let mock_server = MockServer::start().await;
    serve(&mock_server, "com/acme/", listing(&["a/", "b/"])).await;
    serve(&mock_server, "com/acme/a/", listing(&["x.bin", "x.pom"])).await;
    serve(&mock_server, "com/acme/b/", listing(&[])).await;
    Mock::given(method("GET"))
        .and(path("/maven2/com/acme/a/x.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("binary-payload")
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&mock_server)
        .await;
    serve(
        &mock_server,
        "com/acme/a/x.pom",
        descriptor(&[("g", "artifact", Some("1.0"))]),
    )
    .await;
    serve(
        &mock_server,
        "g/artifact/1.0/",
        listing(&["artifact-1.0.jar", "artifact-1.0.pom"]),
    )
    .await;
    serve(&mock_server, "g/artifact/1.0/artifact-1.0.jar", "jar-bytes").await;
    serve(&mock_server, "g/artifact/1.0/artifact-1.0.pom", descriptor(&[])).await;

    let out = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), out.path());

    let mut first = Coordinator::new(config.clone(), seed("com/acme"), false, None).unwrap();
    let handle = first.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.stop();
    });
    let interrupted = first.run().await.unwrap();
    assert!(interrupted.interrupted);

    let mut second = Coordinator::new(config, seed("com/acme"), false, None).unwrap();
    let resumed = second.run().await.unwrap();
    assert!(!resumed.interrupted);
    assert_eq!(resumed.pending, 0);

    assert_eq!(completed_log(out.path()), expected);
    assert_eq!(expected, SAMPLE_FILES);
}

#[tokio::test]
async fn test_completed_descriptor_reindexed_on_resume() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "com/acme/a/", listing(&["x.bin", "x.pom"])).await;
    never_requested(&mock_server, "com/acme/a/x.bin").await;
    never_requested(&mock_server, "com/acme/a/x.pom").await;
    serve(
        &mock_server,
        "g/artifact/1.0/",
        listing(&["artifact-1.0.jar", "artifact-1.0.pom"]),
    )
    .await;
    serve_once(&mock_server, "g/artifact/1.0/artifact-1.0.jar", "jar-bytes").await;
    serve_once(&mock_server, "g/artifact/1.0/artifact-1.0.pom", descriptor(&[])).await;

    // Crashed after logging x.pom but before the next checkpoint
    let out = TempDir::new().unwrap();
    let dir = out.path().join("com/acme/a");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("x.bin"), "binary-payload").unwrap();
    std::fs::write(
        dir.join("x.pom"),
        descriptor(&[("g", "artifact", Some("1.0"))]),
    )
    .unwrap();

    let store = open_store(out.path(), ".mvn-mirror");
    store
        .append_completed(&RepoPath::parse("com/acme/a/x.bin").unwrap())
        .unwrap();
    store
        .append_completed(&RepoPath::parse("com/acme/a/x.pom").unwrap())
        .unwrap();
    let snapshot = Snapshot {
        directories: vec![SnapshotEntry::new(&seed("com/acme/a"), 0)],
        ..Default::default()
    };
    store.save_snapshot(&snapshot).unwrap();

    let config = create_test_config(&mock_server.uri(), out.path());
    let summary = run_crawl(config, seed("com/acme")).await.unwrap();

    assert_eq!(summary.dependencies_scheduled, 1);
    assert_eq!(summary.files_fetched, 2);
    assert_eq!(completed_log(out.path()), SAMPLE_FILES);
}

#[tokio::test]
async fn test_excluded_paths_never_requested() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "com/acme/", listing(&["a/", "b/"])).await;
    serve(&mock_server, "com/acme/a/", listing(&["x.pom"])).await;
    serve_once(
        &mock_server,
        "com/acme/a/x.pom",
        descriptor(&[("g", "artifact", Some("1.0"))]),
    )
    .await;
    never_requested(&mock_server, "com/acme/b/").await;
    never_requested(&mock_server, "g/artifact/1.0/").await;

    let out = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), out.path());
    config.exclude = vec![
        ExcludeEntry {
            pattern: "com.acme.b".to_string(),
        },
        ExcludeEntry {
            pattern: "g".to_string(),
        },
    ];

    let summary = run_crawl(config, seed("com/acme")).await.unwrap();

    assert_eq!(summary.excluded, 2);
    assert_eq!(summary.dependencies_scheduled, 0);
    assert_eq!(completed_log(out.path()), vec!["com/acme/a/x.pom"]);
}

#[tokio::test]
async fn test_slow_descriptor_keeps_workers_alive() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "q/", listing(&["lib.pom"])).await;
    Mock::given(method("GET"))
        .and(path("/maven2/q/lib.pom"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(descriptor(&[("d", "dep", None)]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;
    serve(&mock_server, "d/dep/", listing(&["dep.jar"])).await;
    serve_once(&mock_server, "d/dep/dep.jar", "dependency").await;

    let out = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), out.path());
    let summary = run_crawl(config, seed("q")).await.unwrap();

    assert_eq!(completed_log(out.path()), vec!["d/dep/dep.jar", "q/lib.pom"]);
    assert_eq!(summary.dependencies_scheduled, 1);
}

#[tokio::test]
async fn test_depth_bounded_defers_far_dependencies() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "root/", listing(&["root.pom"])).await;
    serve(&mock_server, "root/root.pom", descriptor(&[("one", "lib", Some("1"))])).await;
    serve(&mock_server, "one/lib/1/", listing(&["lib-1.pom"])).await;
    serve(
        &mock_server,
        "one/lib/1/lib-1.pom",
        descriptor(&[("two", "lib", Some("1"))]),
    )
    .await;
    never_requested(&mock_server, "two/lib/1/").await;

    let out = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), out.path());
    config.crawler.strategy = TraversalStrategy::DepthBounded;
    config.crawler.max_depth = 1;

    let summary = run_crawl(config, seed("root")).await.unwrap();

    assert_eq!(summary.dependencies_scheduled, 1);
    assert_eq!(summary.dependencies_deferred, 1);
    assert_eq!(
        completed_log(out.path()),
        vec!["one/lib/1/lib-1.pom", "root/root.pom"]
    );

    let snapshot = open_store(out.path(), ".mvn-mirror")
        .load_snapshot()
        .unwrap()
        .unwrap();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.deferred, vec!["two/lib/1/".to_string()]);
}

#[tokio::test]
async fn test_not_found_and_transient_failures() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "g/", listing(&["gone.jar", "flaky.jar"])).await;
    Mock::given(method("GET"))
        .and(path("/maven2/g/gone.jar"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    // One attempt plus two requeues
    Mock::given(method("GET"))
        .and(path("/maven2/g/flaky.jar"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let out = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), out.path());
    let summary = run_crawl(config, seed("g")).await.unwrap();

    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.requeued, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.files_fetched, 0);
    assert!(completed_log(out.path()).is_empty());
    assert!(!out.path().join("g/gone.jar").exists());
}

/// Serves every request with `body`, one byte per `gap`
///
/// `declared` is the Content-Length sent; a larger value leaves the body
/// hanging after the last byte. Returns the server's base URL.
async fn trickle_server(body: &'static [u8], declared: usize, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
                    declared
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for byte in body {
                    tokio::time::sleep(gap).await;
                    if socket.write_all(&[*byte]).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                }
                if declared > body.len() {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            });
        }
    });

    format!("http://{}", addr)
}

/// Resumes a run whose only pending work is `file`
async fn fetch_single_file(
    origin: &str,
    out: &Path,
    file: &str,
    timeout_secs: u64,
) -> CrawlSummary {
    let file = RepoPath::parse(file).unwrap();
    let snapshot = Snapshot {
        files: vec![SnapshotEntry::new(&file, 0)],
        ..Default::default()
    };
    open_store(out, ".mvn-mirror").save_snapshot(&snapshot).unwrap();

    let mut config = create_test_config(origin, out);
    config.crawler.file_timeout_secs = timeout_secs;
    let mut coordinator = Coordinator::new(config, seed("g"), false, None).unwrap();
    coordinator.run().await.unwrap()
}

#[tokio::test]
async fn test_slow_download_finishes_while_data_keeps_arriving() {
    // Three seconds in total, never more than half a second between bytes
    let origin = trickle_server(b"trickl", 6, Duration::from_millis(500)).await;
    let out = TempDir::new().unwrap();

    let summary = fetch_single_file(&origin, out.path(), "g/slow.jar", 2).await;

    assert_eq!(summary.files_fetched, 1);
    assert_eq!(summary.requeued, 0);
    assert_eq!(summary.failed, 0);
    let body = std::fs::read_to_string(out.path().join("g/slow.jar")).unwrap();
    assert_eq!(body, "trickl");
}

#[tokio::test]
async fn test_stalled_download_is_retried_then_dropped() {
    let origin = trickle_server(b"ab", 10, Duration::from_millis(10)).await;
    let out = TempDir::new().unwrap();

    let summary = fetch_single_file(&origin, out.path(), "g/stalled.jar", 1).await;

    assert_eq!(summary.files_fetched, 0);
    assert_eq!(summary.requeued, 2);
    assert_eq!(summary.failed, 1);
    assert!(!out.path().join("g/stalled.jar").exists());
    assert!(!out.path().join("g/stalled.jar.part").exists());
    assert!(completed_log(out.path()).is_empty());
}
